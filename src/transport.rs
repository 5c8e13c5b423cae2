//! Transport abstraction for the Strategos push channel.
//!
//! A [`Transport`] carries whole JSON text frames (`{"event", "data"}`
//! envelopes) in both directions. Framing is the implementation's business:
//! WebSocket messages, newline-delimited TCP, an in-memory queue in tests.
//!
//! # Connection Setup
//!
//! A [`Transport`] is one live connection. Because the
//! [`TransportManager`](crate::connection::TransportManager) reconnects on its
//! own, it is handed a [`Connector`] instead: a factory that opens a fresh
//! transport for every connection attempt.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use strategos_client::error::ClientError;
//! use strategos_client::transport::{Connector, Transport};
//! use tokio::sync::mpsc;
//!
//! struct QueueTransport {
//!     outgoing: mpsc::UnboundedSender<String>,
//!     incoming: mpsc::UnboundedReceiver<String>,
//! }
//!
//! #[async_trait]
//! impl Transport for QueueTransport {
//!     async fn send(&mut self, message: String) -> Result<(), ClientError> {
//!         self.outgoing
//!             .send(message)
//!             .map_err(|e| ClientError::TransportSend(e.to_string()))
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, ClientError>> {
//!         self.incoming.recv().await.map(Ok)
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ClientError> {
//!         self.incoming.close();
//!         Ok(())
//!     }
//! }
//!
//! struct QueueConnector;
//!
//! #[async_trait]
//! impl Connector for QueueConnector {
//!     async fn connect(&self) -> Result<Box<dyn Transport>, ClientError> {
//!         let (outgoing, _server_rx) = mpsc::unbounded_channel();
//!         let (_server_tx, incoming) = mpsc::unbounded_channel();
//!         Ok(Box::new(QueueTransport { outgoing, incoming }))
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ClientError;

/// One live, bidirectional connection to the push server.
///
/// `send` writes exactly one frame and `recv` yields exactly one frame;
/// partial frames never cross this boundary.
///
/// # Object Safety
///
/// This trait is object-safe; the connection manager drives
/// `Box<dyn Transport>` values produced by a [`Connector`].
///
/// # Cancel Safety
///
/// The connection task races [`recv`](Transport::recv) against outbound
/// frames and shutdown in a `tokio::select!`, so a `recv` future dropped
/// mid-flight must not consume a frame. Receivers backed by a tokio channel
/// satisfy this for free.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Write one frame.
    ///
    /// # Errors
    ///
    /// [`ClientError::TransportSend`] when the frame cannot be written.
    async fn send(&mut self, message: String) -> Result<(), ClientError>;

    /// Wait for the next frame.
    ///
    /// `None` signals that the peer closed the connection; `Some(Err(_))`
    /// signals a broken one (typically [`ClientError::TransportReceive`]).
    /// Either ends the connection and starts the reconnect schedule.
    ///
    /// Must be cancel-safe.
    async fn recv(&mut self) -> Option<Result<String, ClientError>>;

    /// Shut the connection down.
    ///
    /// Called at most once, on
    /// [`disconnect`](crate::connection::TransportManager::disconnect) or when
    /// the last manager handle is dropped. The transport is dropped right
    /// after, whatever this returns.
    ///
    /// # Errors
    ///
    /// A failed close handshake. It is logged and otherwise ignored.
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Opens a new [`Transport`] for each connection attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Establish a new connection.
    ///
    /// # Errors
    ///
    /// Returns any error that prevents the connection from being established.
    /// The connection manager treats every error as a failed attempt and
    /// schedules the next one.
    async fn connect(&self) -> Result<Box<dyn Transport>, ClientError>;
}
