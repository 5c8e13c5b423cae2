//! Request/response collaborators consumed by the controllers.
//!
//! The HTTP client itself lives outside this crate. Controllers only see the
//! two traits below, which makes them easy to drive from tests and lets an
//! application plug in whatever client it already uses. Every call takes the
//! bearer access token explicitly; implementations must not cache it.
//!
//! Requests are abortable by dropping their future. The game controller
//! relies on that when it disposes a session guard.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::protocol::{
    GameId, InitialPayload, LocationId, OrderKind, PlayerId, RefreshPayload, UnitId,
};
use crate::tokens::AuthTokens;

/// Username/password pair submitted at login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The logged-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
}

/// Successful login result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub tokens: AuthTokens,
}

/// Parameters for a new game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGame {
    pub name: String,
    pub max_players: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_name: Option<String>,
}

/// A roster entry to add during setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlayer {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub is_ai: bool,
}

/// Map generation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MapSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_name: Option<String>,
    /// Deterministic generation seed; the server picks one if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// One order as submitted by the local player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub unit_id: UnitId,
    pub kind: OrderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<LocationId>,
}

/// Authentication endpoints.
#[async_trait]
pub trait AuthApi: Send + Sync + 'static {
    /// Exchange credentials for a token pair.
    ///
    /// # Errors
    ///
    /// [`ClientError::Request`] carrying the server's message on rejection.
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ClientError>;

    /// Invalidate `access_token` server-side.
    async fn logout(&self, access_token: &str) -> Result<(), ClientError>;

    /// Exchange a refresh token for a new pair.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, ClientError>;
}

/// Game endpoints.
#[async_trait]
pub trait GameApi: Send + Sync + 'static {
    /// Fetch a full snapshot of `game_id`.
    async fn load_game(&self, token: &str, game_id: GameId)
        -> Result<InitialPayload, ClientError>;

    /// Fetch only the refreshable state of `game_id`.
    async fn refresh_game(
        &self,
        token: &str,
        game_id: GameId,
    ) -> Result<RefreshPayload, ClientError>;

    /// Create a game and return its id.
    async fn create_game(&self, token: &str, game: &NewGame) -> Result<GameId, ClientError>;

    async fn add_player(
        &self,
        token: &str,
        game_id: GameId,
        player: &NewPlayer,
    ) -> Result<PlayerId, ClientError>;

    async fn generate_map(
        &self,
        token: &str,
        game_id: GameId,
        settings: &MapSettings,
    ) -> Result<(), ClientError>;

    async fn place_players(&self, token: &str, game_id: GameId) -> Result<(), ClientError>;

    async fn start_game(&self, token: &str, game_id: GameId) -> Result<(), ClientError>;

    async fn submit_orders(
        &self,
        token: &str,
        game_id: GameId,
        orders: &[OrderDraft],
    ) -> Result<(), ClientError>;
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
    use serde_json::json;

    #[test]
    fn credentials_debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("ada", "hunter2"));
        assert!(rendered.contains("ada"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn order_draft_wire_shape() {
        let draft = OrderDraft {
            unit_id: 4,
            kind: OrderKind::Move,
            target: Some(9),
        };
        assert_eq!(
            serde_json::to_value(&draft).unwrap(),
            json!({ "unitId": 4, "kind": "move", "target": 9 })
        );
    }

    #[test]
    fn apis_are_object_safe() {
        fn assert_object<T: ?Sized + Send + Sync>() {}
        assert_object::<dyn AuthApi>();
        assert_object::<dyn GameApi>();
    }
}
