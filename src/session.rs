//! Session/auth controller: login, logout, and the socket handshake.
//!
//! The server expects an `authenticate {token}` message on every freshly
//! established connection, including after an automatic reconnect. The
//! controller therefore never sends the handshake eagerly after login. It
//! registers a connection listener and sends the handshake whenever the
//! transport reports [`ConnectionState::Connected`].

use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info, warn};

use crate::api::{AuthApi, Credentials, LoginResponse, UserProfile};
use crate::connection::{ConnectionChange, ConnectionState, TransportManager};
use crate::error::{ClientError, Result};
use crate::event::{Screen, UiEvent, UiSink};
use crate::protocol::ClientEvent;
use crate::subscription::Subscription;
use crate::sync::lock;
use crate::tokens::{AuthTokens, TokenStore};

const CONNECTION_LOST_MESSAGE: &str =
    "Lost connection to the game server. Check your network and reconnect.";

struct SessionInner {
    tokens: Arc<TokenStore>,
    transport: TransportManager,
    api: Arc<dyn AuthApi>,
    ui: UiSink,
    connection_listener: Mutex<Option<Subscription>>,
    user: Mutex<Option<UserProfile>>,
}

impl SessionInner {
    fn on_connection_change(&self, change: &ConnectionChange) {
        self.ui.emit(UiEvent::ConnectionChanged {
            state: change.state,
            detail: change.detail.clone(),
        });
        match change.state {
            ConnectionState::Connected => self.authenticate(),
            ConnectionState::ConnectionFailed => self.ui.error(CONNECTION_LOST_MESSAGE),
            ConnectionState::Disconnected
            | ConnectionState::Connecting
            | ConnectionState::Reconnecting => {}
        }
    }

    /// Send the handshake with the current access token.
    fn authenticate(&self) {
        let Some(token) = self.tokens.access_token() else {
            warn!("connected without credentials; not authenticating");
            return;
        };
        let handshake = ClientEvent::Authenticate { token };
        let sent = handshake
            .payload()
            .and_then(|payload| self.transport.send(handshake.name(), payload));
        match sent {
            Ok(()) => debug!("authenticate sent"),
            Err(e) => warn!("authenticate not sent: {e}"),
        }
    }
}

/// Owns login state and the authentication handshake.
///
/// This is the only component that sends `authenticate`. Cloning is cheap
/// and shares the controller.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<SessionInner>,
}

impl SessionController {
    pub fn new(
        tokens: Arc<TokenStore>,
        transport: TransportManager,
        api: Arc<dyn AuthApi>,
        ui: UiSink,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                tokens,
                transport,
                api,
                ui,
                connection_listener: Mutex::new(None),
                user: Mutex::new(None),
            }),
        }
    }

    /// Log in, store the token pair and open the connection.
    ///
    /// # Errors
    ///
    /// Whatever [`AuthApi::login`] returns. The failure is also reported on
    /// the UI status channel, and nothing is connected.
    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile> {
        match self.inner.api.login(credentials).await {
            Ok(LoginResponse { user, tokens }) => {
                info!(user = %user.username, "logged in");
                *lock(&self.inner.user) = Some(user.clone());
                self.establish(tokens);
                Ok(user)
            }
            Err(e) => {
                warn!(user = %credentials.username, "login failed: {e}");
                self.inner.ui.report(&e);
                Err(e)
            }
        }
    }

    /// Adopt a token pair obtained earlier (for example, restored by the
    /// application from its own storage) and connect.
    pub fn resume(&self, tokens: AuthTokens) {
        info!("resuming session");
        self.establish(tokens);
    }

    fn establish(&self, tokens: AuthTokens) {
        self.inner.tokens.set_tokens(tokens);
        self.bind();
        self.inner.transport.connect();
        self.inner.ui.show_screen(Screen::Lobby);
    }

    /// (Re)register the connection listener. Any previous registration is
    /// dropped first.
    fn bind(&self) {
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        let subscription = self.inner.transport.on_connection_change(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.on_connection_change(change);
            }
        });
        *lock(&self.inner.connection_listener) = Some(subscription);
    }

    /// Log out: invalidate the token server-side (best effort), forget it,
    /// then close the connection.
    pub async fn logout(&self) {
        if let Some(token) = self.inner.tokens.access_token() {
            if let Err(e) = self.inner.api.logout(&token).await {
                warn!("server-side logout failed: {e}");
            }
        }
        self.inner.tokens.clear();
        *lock(&self.inner.user) = None;

        self.inner.transport.disconnect().await;
        lock(&self.inner.connection_listener).take();

        info!("logged out");
        self.inner.ui.show_screen(Screen::Entry);
    }

    /// Exchange the refresh token for a new pair. If connected, the handshake
    /// is re-sent with the new access token.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotAuthenticated`] without a stored pair, or whatever
    /// [`AuthApi::refresh`] returns (also reported on the UI status channel).
    pub async fn refresh_credentials(&self) -> Result<()> {
        let refresh_token = self
            .inner
            .tokens
            .refresh_token()
            .ok_or(ClientError::NotAuthenticated)?;

        let tokens = match self.inner.api.refresh(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("token refresh failed: {e}");
                self.inner.ui.report(&e);
                return Err(e);
            }
        };
        self.inner.tokens.set_tokens(tokens);
        debug!("credentials refreshed");

        if self.inner.transport.is_connected() {
            self.inner.authenticate();
        }
        Ok(())
    }

    /// The logged-in user, if [`login`](Self::login) succeeded.
    pub fn user(&self) -> Option<UserProfile> {
        lock(&self.inner.user).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.tokens.has_tokens()
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.inner.tokens
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("user", &self.user())
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
