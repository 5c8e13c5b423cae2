//! Connection management: the live socket, its state machine, and raw fan-out.
//!
//! [`TransportManager`] is a cheap, cloneable handle. [`connect`] spawns a
//! background connection task that dials through the configured
//! [`Connector`], pumps outbound frames, decodes inbound [`Envelope`]s and
//! hands each one to every message listener. When the connection drops the
//! task retries on its own, up to [`TransportConfig::max_reconnect_attempts`]
//! times with a fixed delay, and then parks in
//! [`ConnectionState::ConnectionFailed`] until [`connect`] is called again.
//!
//! The manager knows nothing about sessions or games: it delivers every
//! inbound `(event, payload)` pair unfiltered.
//!
//! ```text
//! Disconnected ──connect()──→ Connecting ──ok──→ Connected
//!       ▲                        │                  │ lost
//!       │ disconnect()           │ failed           ▼
//!       └───────────────── Reconnecting ◀───────────┘
//!                                │ attempts exhausted
//!                                ▼
//!                         ConnectionFailed ──connect()──→ Connecting
//! ```
//!
//! [`connect`]: TransportManager::connect

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, Result};
use crate::protocol::Envelope;
use crate::subscription::{ListenerRegistry, Subscription};
use crate::sync::lock;
use crate::transport::{Connector, Transport};

/// Default number of automatic reconnect attempts.
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default delay before each reconnect attempt.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Default timeout for the graceful close on [`TransportManager::disconnect`].
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Reconnection and shutdown tuning for a [`TransportManager`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use strategos_client::connection::TransportConfig;
///
/// let config = TransportConfig::default()
///     .with_max_reconnect_attempts(3)
///     .with_reconnect_delay(Duration::from_millis(250));
/// assert_eq!(config.max_reconnect_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How many times to retry after a failed or lost connection before
    /// giving up with [`ConnectionState::ConnectionFailed`].
    ///
    /// Defaults to **5**.
    pub max_reconnect_attempts: u32,
    /// Fixed delay before every reconnect attempt.
    ///
    /// Defaults to **1000 ms**.
    pub reconnect_delay: Duration,
    /// How long [`TransportManager::disconnect`] waits for the connection task
    /// to close the transport before aborting it.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Set the reconnect attempt ceiling.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the delay before each reconnect attempt.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the graceful shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── State ───────────────────────────────────────────────────────────

/// Connection lifecycle as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Automatic reconnection gave up; only an explicit `connect()` leaves
    /// this state.
    ConnectionFailed,
}

/// A state transition delivered to connection listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionChange {
    pub state: ConnectionState,
    /// Human-readable context (failure reason, attempt number).
    pub detail: Option<String>,
}

struct Hub {
    state: Mutex<ConnectionState>,
    messages: ListenerRegistry<Envelope>,
    connection: ListenerRegistry<ConnectionChange>,
}

impl Hub {
    fn transition(&self, state: ConnectionState, detail: Option<String>) {
        *lock(&self.state) = state;
        debug!(?state, detail = detail.as_deref().unwrap_or(""), "connection state");
        self.connection.emit(&ConnectionChange { state, detail });
    }
}

/// One connection task and the channels that drive it.
struct Link {
    frames: mpsc::UnboundedSender<String>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

// ── Manager handle ──────────────────────────────────────────────────

/// Owns the connection to the game server.
///
/// Cloning is cheap; all clones drive the same connection. When the last
/// clone is dropped the connection task notices its channels closing and
/// shuts down.
#[derive(Clone)]
pub struct TransportManager {
    hub: Arc<Hub>,
    link: Arc<Mutex<Option<Link>>>,
    connector: Arc<dyn Connector>,
    config: TransportConfig,
}

impl TransportManager {
    /// Create a disconnected manager that dials through `connector`.
    pub fn new(connector: impl Connector, config: TransportConfig) -> Self {
        Self {
            hub: Arc::new(Hub {
                state: Mutex::new(ConnectionState::Disconnected),
                messages: ListenerRegistry::new(),
                connection: ListenerRegistry::new(),
            }),
            link: Arc::new(Mutex::new(None)),
            connector: Arc::new(connector),
            config,
        }
    }

    /// Start connecting.
    ///
    /// A no-op while a connection task is alive (connecting, connected or
    /// reconnecting). After [`ConnectionState::ConnectionFailed`] or
    /// [`disconnect`](Self::disconnect) this starts a fresh attempt cycle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut link = lock(&self.link);
        if link.as_ref().is_some_and(|l| !l.task.is_finished()) {
            debug!("connect() ignored: connection task already running");
            return;
        }

        let (frames_tx, frames_rx) = mpsc::unbounded_channel::<String>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        *lock(&self.hub.state) = ConnectionState::Connecting;

        let task = tokio::spawn(connection_task(
            Arc::clone(&self.hub),
            Arc::clone(&self.connector),
            self.config.clone(),
            frames_rx,
            shutdown_rx,
        ));

        *link = Some(Link {
            frames: frames_tx,
            shutdown: Some(shutdown_tx),
            task,
        });
    }

    /// Send one message.
    ///
    /// Only writes while [`ConnectionState::Connected`]; otherwise the message
    /// is logged and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the message was dropped, or
    /// [`ClientError::Serialization`] if the envelope cannot be encoded.
    pub fn send(&self, event: &str, payload: Value) -> Result<()> {
        let state = self.state();
        if state != ConnectionState::Connected {
            warn!(event, ?state, "dropping outbound message: not connected");
            return Err(ClientError::NotConnected);
        }

        let frame = serde_json::to_string(&Envelope::new(event, payload))?;
        let frames = lock(&self.link).as_ref().map(|l| l.frames.clone());
        match frames {
            Some(tx) => tx.send(frame).map_err(|_| ClientError::NotConnected),
            None => Err(ClientError::NotConnected),
        }
    }

    /// Tear down the connection and clear every registered listener.
    ///
    /// Connection listeners see a final [`ConnectionState::Disconnected`]
    /// notification before they are removed.
    pub async fn disconnect(&self) {
        let link = lock(&self.link).take();
        if let Some(mut link) = link {
            debug!("disconnect requested");
            if let Some(tx) = link.shutdown.take() {
                let _ = tx.send(());
            }
            match tokio::time::timeout(self.config.shutdown_timeout, &mut link.task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => warn!("connection task ended with join error: {join_err}"),
                Err(_) => {
                    warn!("connection task did not exit within timeout; aborting");
                    link.task.abort();
                }
            }
        }

        self.hub
            .transition(ConnectionState::Disconnected, Some("client disconnect".into()));
        self.hub.messages.clear();
        self.hub.connection.clear();
    }

    /// Register a listener for every inbound message.
    pub fn on_message(&self, listener: impl Fn(&Envelope) + Send + Sync + 'static) -> Subscription {
        self.hub.messages.subscribe(Arc::new(listener))
    }

    /// Register a listener for connection state transitions.
    pub fn on_connection_change(
        &self,
        listener: impl Fn(&ConnectionChange) + Send + Sync + 'static,
    ) -> Subscription {
        self.hub.connection.subscribe(Arc::new(listener))
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        *lock(&self.hub.state)
    }

    /// Returns `true` while [`ConnectionState::Connected`].
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Number of registered `(message, connection)` listeners.
    pub fn listener_counts(&self) -> (usize, usize) {
        (self.hub.messages.len(), self.hub.connection.len())
    }

    /// The reconnection settings in use.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl std::fmt::Debug for TransportManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportManager")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

// ── Connection task ─────────────────────────────────────────────────

enum SessionEnd {
    /// `disconnect()` was called or every manager handle was dropped.
    Shutdown,
    /// The connection broke; reconnect.
    Lost(String),
}

/// Dial, pump, and redial until shut down or out of attempts.
async fn connection_task(
    hub: Arc<Hub>,
    connector: Arc<dyn Connector>,
    config: TransportConfig,
    mut frames_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut failed_attempts: u32 = 0;
    hub.transition(ConnectionState::Connecting, None);

    loop {
        let dialed = tokio::select! {
            result = connector.connect() => result,
            _ = &mut shutdown_rx => {
                debug!("shutdown while dialing");
                return;
            }
        };

        match dialed {
            Ok(transport) => {
                failed_attempts = 0;
                info!("connected to game server");
                hub.transition(ConnectionState::Connected, None);
                match pump(&hub, transport, &mut frames_rx, &mut shutdown_rx).await {
                    SessionEnd::Shutdown => return,
                    SessionEnd::Lost(reason) => {
                        warn!(%reason, "connection lost");
                        discard_unsent(&mut frames_rx);
                    }
                }
            }
            Err(e) => warn!(attempt = failed_attempts, "connection attempt failed: {e}"),
        }

        if failed_attempts >= config.max_reconnect_attempts {
            let err = ClientError::ConnectionFailed {
                attempts: failed_attempts,
            };
            error!("{err}");
            hub.transition(ConnectionState::ConnectionFailed, Some(err.to_string()));
            return;
        }
        failed_attempts += 1;
        hub.transition(
            ConnectionState::Reconnecting,
            Some(format!(
                "attempt {failed_attempts} of {}",
                config.max_reconnect_attempts
            )),
        );

        tokio::select! {
            () = tokio::time::sleep(config.reconnect_delay) => {}
            _ = &mut shutdown_rx => {
                debug!("shutdown while waiting to reconnect");
                return;
            }
        }
    }
}

/// Multiplex outbound frames, shutdown, and inbound messages for one
/// established connection.
async fn pump(
    hub: &Hub,
    mut transport: Box<dyn Transport>,
    frames_rx: &mut mpsc::UnboundedReceiver<String>,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    loop {
        tokio::select! {
            frame = frames_rx.recv() => {
                match frame {
                    Some(text) => {
                        if let Err(e) = transport.send(text).await {
                            return SessionEnd::Lost(e.to_string());
                        }
                    }
                    // Every manager handle is gone.
                    None => {
                        let _ = transport.close().await;
                        return SessionEnd::Shutdown;
                    }
                }
            }

            _ = &mut *shutdown_rx => {
                debug!("closing transport");
                if let Err(e) = transport.close().await {
                    debug!("transport close failed: {e}");
                }
                return SessionEnd::Shutdown;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => match serde_json::from_str::<Envelope>(&text) {
                        Ok(envelope) => hub.messages.emit(&envelope),
                        Err(e) => warn!("skipping malformed frame: {e}; raw: {text}"),
                    },
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                    None => return SessionEnd::Lost("closed by server".into()),
                }
            }
        }
    }
}

/// Drop frames queued for a connection that no longer exists.
fn discard_unsent(frames_rx: &mut mpsc::UnboundedReceiver<String>) {
    let mut dropped = 0usize;
    while frames_rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        warn!(dropped, "discarded frames queued for the lost connection");
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
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A connector that never succeeds.
    struct Unreachable {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Connector for Unreachable {
        async fn connect(&self) -> Result<Box<dyn Transport>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )))
        }
    }

    #[test]
    fn config_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay, Duration::from_millis(1000));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn connection_state_serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionState::ConnectionFailed).unwrap();
        assert_eq!(json, "\"connection_failed\"");
    }

    #[tokio::test]
    async fn send_while_disconnected_is_dropped() {
        let manager = TransportManager::new(
            Unreachable {
                calls: Arc::new(AtomicU32::new(0)),
            },
            TransportConfig::default(),
        );
        let err = manager
            .send("game:join", serde_json::json!({ "gameId": 1 }))
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempt_budget_fails_after_first_dial() {
        let calls = Arc::new(AtomicU32::new(0));
        let manager = TransportManager::new(
            Unreachable {
                calls: Arc::clone(&calls),
            },
            TransportConfig::default().with_max_reconnect_attempts(0),
        );
        manager.connect();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), ConnectionState::ConnectionFailed);
    }

    #[tokio::test]
    async fn disconnect_without_connect_clears_listeners() {
        let manager = TransportManager::new(
            Unreachable {
                calls: Arc::new(AtomicU32::new(0)),
            },
            TransportConfig::default(),
        );
        let _m = manager.on_message(|_| {});
        let _c = manager.on_connection_change(|_| {});
        assert_eq!(manager.listener_counts(), (1, 1));

        manager.disconnect().await;
        assert_eq!(manager.listener_counts(), (0, 0));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
