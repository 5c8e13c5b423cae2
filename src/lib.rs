//! # Strategos Client
//!
//! Session and state synchronization core for the Strategos turn-based
//! strategy game client.
//!
//! This crate keeps one client's view of a remote game consistent while the
//! connection drops and comes back, the user switches between games, logs
//! in and out, or fires overlapping requests. Rendering, forms and the HTTP
//! client are left to the application.
//!
//! ## Features
//!
//! - **Reconnecting transport**: bounded automatic reconnects with a fixed
//!   delay, plus raw `(event, payload)` fan-out to listeners
//! - **Generation-token guards**: results from a superseded game or session
//!   are discarded, whatever order the server answers in
//! - **Atomic game cache**: full snapshots and partial refreshes are applied
//!   all-or-nothing, with a derived per-location overlay
//! - **Transport-agnostic**: implement [`Connector`] and [`Transport`] for any
//!   backend; the default `transport-websocket` feature provides
//!   [`WebSocketConnector`]
//!
//! ## Module Map
//!
//! | Module | Role |
//! |---|---|
//! | [`connection`] | [`TransportManager`], connection state machine |
//! | [`tokens`] | [`TokenStore`] |
//! | [`guard`] | [`SessionGuard`], [`CancellationEpoch`] |
//! | [`session`] | [`SessionController`] |
//! | [`game`] | [`GameController`] |
//! | [`cache`] | [`GameStateCache`] |
//! | [`client`] | [`GameClient`], wiring everything together |

pub mod api;
pub mod cache;
pub mod client;
pub mod connection;
pub mod error;
pub mod error_codes;
pub mod event;
pub mod game;
pub mod guard;
pub mod protocol;
pub mod session;
pub mod subscription;
mod sync;
pub mod tokens;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use api::{AuthApi, Credentials, GameApi};
pub use cache::{GameSnapshot, GameStateCache, MapLocation};
pub use client::{ClientConfig, GameClient};
pub use connection::{ConnectionChange, ConnectionState, TransportConfig, TransportManager};
pub use error::ClientError;
pub use error_codes::ErrorCode;
pub use event::{Screen, UiEvent};
pub use game::{GameAction, GameController, Outcome};
pub use guard::{CancellationEpoch, GenerationToken, Guarded, SessionGuard};
pub use protocol::{ClientEvent, Envelope, ServerEvent};
pub use session::SessionController;
pub use subscription::Subscription;
pub use tokens::{AuthTokens, TokenStore};
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
