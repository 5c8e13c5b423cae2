//! In-memory credential storage.

use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::sync::{read, write};

/// An access/refresh token pair with optional expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<SystemTime>,
}

impl AuthTokens {
    /// Create a pair with no known expiry.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: None,
        }
    }

    /// Set the expiry to `lifetime` from now.
    #[must_use]
    pub fn expiring_in(mut self, lifetime: Duration) -> Self {
        self.expires_at = SystemTime::now().checked_add(lifetime);
        self
    }

    /// Returns `true` if the access token has expired as of `now`.
    ///
    /// Pairs without an expiry never expire.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

// Tokens are secrets; keep them out of logs.
impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Holds the current credential pair. Pure storage: no I/O, no transport
/// coupling, and absence is `None` rather than an error.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: RwLock<Option<AuthTokens>>,
}

impl TokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored pair.
    pub fn set_tokens(&self, tokens: AuthTokens) {
        *write(&self.tokens) = Some(tokens);
    }

    pub fn access_token(&self) -> Option<String> {
        read(&self.tokens).as_ref().map(|t| t.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        read(&self.tokens).as_ref().map(|t| t.refresh_token.clone())
    }

    /// A copy of the stored pair, if any.
    pub fn tokens(&self) -> Option<AuthTokens> {
        read(&self.tokens).clone()
    }

    pub fn has_tokens(&self) -> bool {
        read(&self.tokens).is_some()
    }

    /// Returns `true` if a pair is stored and its access token has expired.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        read(&self.tokens)
            .as_ref()
            .is_some_and(|t| t.is_expired_at(now))
    }

    /// Forget the stored pair.
    pub fn clear(&self) {
        *write(&self.tokens) = None;
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_returns_none() {
        let store = TokenStore::new();
        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
        assert!(!store.has_tokens());
        assert!(!store.is_expired_at(SystemTime::now()));
    }

    #[test]
    fn set_then_clear() {
        let store = TokenStore::new();
        store.set_tokens(AuthTokens::new("access", "refresh"));
        assert_eq!(store.access_token().as_deref(), Some("access"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));

        store.clear();
        assert!(store.tokens().is_none());
    }

    #[test]
    fn expiry() {
        let tokens = AuthTokens::new("a", "r").expiring_in(Duration::from_secs(60));
        let now = SystemTime::now();
        assert!(!tokens.is_expired_at(now));
        assert!(tokens.is_expired_at(now + Duration::from_secs(120)));
        assert!(!AuthTokens::new("a", "r").is_expired_at(now + Duration::from_secs(1_000_000)));
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", AuthTokens::new("secret-access", "secret-refresh"));
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("redacted"));
    }
}
