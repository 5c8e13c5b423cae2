//! Events emitted to the UI layer.
//!
//! The controllers never render anything. They push [`UiEvent`]s into a
//! bounded channel owned by the application, which redraws screens, status
//! bars and the map in response. A full channel drops the event with a
//! warning rather than stalling the transport loop.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::connection::ConnectionState;
use crate::error::ClientError;
use crate::protocol::GameId;

/// Top-level screens the controllers navigate between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Login / registration.
    Entry,
    /// Game list and creation.
    Lobby,
    /// The loaded game.
    Game,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    ShowScreen(Screen),
    /// A one-line message for the status bar.
    Status { level: StatusLevel, message: String },
    /// The connection changed state.
    ConnectionChanged {
        state: ConnectionState,
        detail: Option<String>,
    },
    /// A game's full state is in the cache.
    GameLoaded { game_id: GameId },
    /// A game's refreshable state was replaced.
    GameRefreshed { game_id: GameId, turn: u32 },
    /// The server created a new game on our behalf.
    GameCreated { game_id: GameId },
}

impl UiEvent {
    /// Stable event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShowScreen(_) => "ui:showScreen",
            Self::Status { .. } => "ui:status",
            Self::ConnectionChanged { .. } => "ui:connection",
            Self::GameLoaded { .. } => "ui:gameLoaded",
            Self::GameRefreshed { .. } => "ui:gameRefreshed",
            Self::GameCreated { .. } => "ui:gameCreated",
        }
    }
}

/// Sending half of the UI channel, shared by every controller.
#[derive(Debug, Clone)]
pub struct UiSink {
    tx: mpsc::Sender<UiEvent>,
}

impl UiSink {
    pub fn new(tx: mpsc::Sender<UiEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink and its receiver. `capacity` is clamped to at least 1.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<UiEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Emit an event without waiting. Dropped with a warning if the channel
    /// is full.
    pub fn emit(&self, event: UiEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(event = dropped.name(), "ui channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("ui channel closed, receiver dropped");
            }
        }
    }

    pub fn show_screen(&self, screen: Screen) {
        self.emit(UiEvent::ShowScreen(screen));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(UiEvent::Status {
            level: StatusLevel::Info,
            message: message.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(UiEvent::Status {
            level: StatusLevel::Error,
            message: message.into(),
        });
    }

    /// Put a user-facing rendering of `err` on the status channel.
    pub fn report(&self, err: &ClientError) {
        self.error(err.user_message());
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
    fn names_are_stable() {
        assert_eq!(UiEvent::ShowScreen(Screen::Lobby).name(), "ui:showScreen");
        assert_eq!(
            UiEvent::GameRefreshed {
                game_id: 1,
                turn: 2
            }
            .name(),
            "ui:gameRefreshed"
        );
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (sink, mut rx) = UiSink::channel(1);
        sink.show_screen(Screen::Entry);
        sink.show_screen(Screen::Lobby);

        assert_eq!(rx.try_recv().unwrap(), UiEvent::ShowScreen(Screen::Entry));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (sink, rx) = UiSink::channel(4);
        drop(rx);
        sink.info("nobody is listening");
    }

    #[test]
    fn report_uses_server_message() {
        let (sink, mut rx) = UiSink::channel(4);
        sink.report(&ClientError::request("Game is full", None));
        assert_eq!(
            rx.try_recv().unwrap(),
            UiEvent::Status {
                level: StatusLevel::Error,
                message: "Game is full".into()
            }
        );
    }
}
