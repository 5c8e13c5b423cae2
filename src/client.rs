//! Application root: builds and wires every component.
//!
//! [`GameClient`] owns one [`TransportManager`], one [`TokenStore`], one
//! [`GameStateCache`] and the two controllers. Components receive their
//! collaborators at construction, so there are no process-wide singletons;
//! tests can build as many independent clients as they like.
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = WebSocketConnector::new("wss://play.example.com/socket");
//! let (client, mut ui) = GameClient::new(connector, auth_api, game_api, ClientConfig::default());
//!
//! client.login(&Credentials::new("ada", "hunter2")).await?;
//! client.games().request_initial_load(42).await?;
//!
//! while let Some(event) = ui.recv().await {
//!     match event {
//!         UiEvent::GameRefreshed { turn, .. } => redraw_map(client.cache(), turn),
//!         UiEvent::ShowScreen(Screen::Entry) => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::{AuthApi, Credentials, GameApi, UserProfile};
use crate::cache::GameStateCache;
use crate::connection::{TransportConfig, TransportManager};
use crate::error::Result;
use crate::event::{UiEvent, UiSink};
use crate::game::GameController;
use crate::session::SessionController;
use crate::tokens::{AuthTokens, TokenStore};
use crate::transport::Connector;

/// Default capacity of the bounded UI event channel.
const DEFAULT_UI_CHANNEL_CAPACITY: usize = 256;

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`GameClient`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use strategos_client::client::ClientConfig;
/// use strategos_client::connection::TransportConfig;
///
/// let config = ClientConfig::default()
///     .with_ui_channel_capacity(64)
///     .with_transport(TransportConfig::default().with_reconnect_delay(Duration::from_millis(500)));
/// assert_eq!(config.ui_channel_capacity, 64);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Reconnection and shutdown settings for the transport.
    pub transport: TransportConfig,
    /// Capacity of the bounded UI event channel.
    ///
    /// When the UI cannot keep up, events are dropped with a warning rather
    /// than blocking the transport loop.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub ui_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            ui_channel_capacity: DEFAULT_UI_CHANNEL_CAPACITY,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Set the UI channel capacity. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_ui_channel_capacity(mut self, capacity: usize) -> Self {
        self.ui_channel_capacity = capacity.max(1);
        self
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// The wired-up client.
#[derive(Debug, Clone)]
pub struct GameClient {
    transport: TransportManager,
    tokens: Arc<TokenStore>,
    cache: Arc<GameStateCache>,
    session: SessionController,
    games: GameController,
}

impl GameClient {
    /// Build a client and return it with the receiving end of its UI channel.
    ///
    /// Nothing connects until [`login`](Self::login) or
    /// [`resume`](Self::resume).
    pub fn new(
        connector: impl Connector,
        auth: Arc<dyn AuthApi>,
        games: Arc<dyn GameApi>,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<UiEvent>) {
        let (ui, ui_rx) = UiSink::channel(config.ui_channel_capacity);
        let transport = TransportManager::new(connector, config.transport);
        let tokens = Arc::new(TokenStore::new());
        let cache = Arc::new(GameStateCache::new());

        let session = SessionController::new(
            Arc::clone(&tokens),
            transport.clone(),
            auth,
            ui.clone(),
        );
        let games = GameController::new(
            transport.clone(),
            Arc::clone(&cache),
            games,
            Arc::clone(&tokens),
            ui,
        );

        (
            Self {
                transport,
                tokens,
                cache,
                session,
                games,
            },
            ui_rx,
        )
    }

    /// Log in and connect.
    ///
    /// The session listener is registered before the game listener, so on
    /// every new connection the server sees `authenticate` before any
    /// `game:join`.
    ///
    /// # Errors
    ///
    /// See [`SessionController::login`].
    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile> {
        let user = self.session.login(credentials).await?;
        self.games.bind();
        Ok(user)
    }

    /// Connect with a previously obtained token pair.
    pub fn resume(&self, tokens: AuthTokens) {
        self.session.resume(tokens);
        self.games.bind();
    }

    /// Drop the game session, log out and disconnect.
    pub async fn logout(&self) {
        self.games.reset();
        self.session.logout().await;
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn games(&self) -> &GameController {
        &self.games
    }

    pub fn cache(&self) -> &Arc<GameStateCache> {
        &self.cache
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn transport(&self) -> &TransportManager {
        &self.transport
    }
}
