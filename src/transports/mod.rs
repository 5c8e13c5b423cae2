//! Concrete transports for the Strategos protocol.
//!
//! | Feature                | Transport              | Connector              |
//! |------------------------|------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] | [`WebSocketConnector`] |
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use strategos_client::{TransportConfig, TransportManager, WebSocketConnector};
//!
//! let connector = WebSocketConnector::new("wss://play.example.com/socket")
//!     .with_connect_timeout(Duration::from_secs(5));
//! let transport = TransportManager::new(connector, TransportConfig::default());
//! transport.connect();
//! ```

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnector, WebSocketTransport};
