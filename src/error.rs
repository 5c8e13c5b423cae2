//! Error types for the Strategos client.

use thiserror::Error;

use crate::error_codes::ErrorCode;

/// Fallback status text when a failure carries no server-provided message.
const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors that can occur when using the Strategos client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Attempted an operation that requires an active connection, but the client is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// Automatic reconnection gave up after exhausting its attempt budget.
    #[error("connection failed after {attempts} reconnect attempts")]
    ConnectionFailed {
        /// Number of reconnect attempts made before giving up.
        attempts: u32,
    },

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A server payload lacked a required field or success indicator.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A server payload referenced data the client does not know about
    /// (for example an overlay record for an unknown location).
    #[error("consistency error: {0}")]
    Consistency(String),

    /// The operation needs a loaded game, but none is active.
    #[error("no game loaded")]
    NoGameLoaded,

    /// The operation needs credentials, but the token store is empty.
    #[error("not authenticated")]
    NotAuthenticated,

    /// An HTTP or server-side request failed.
    #[error("request failed: {message}")]
    Request {
        /// Human-readable message from the server (may be empty).
        message: String,
        /// Structured error code, if provided by the server.
        code: Option<ErrorCode>,
    },

    /// A spawned request task failed without producing a result.
    #[error("task failed: {0}")]
    Task(String),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Build a [`ClientError::Request`] from a server message and optional code.
    pub fn request(message: impl Into<String>, code: Option<ErrorCode>) -> Self {
        Self::Request {
            message: message.into(),
            code,
        }
    }

    /// Returns `true` for payload contract violations between server and client.
    ///
    /// These are fatal to the operation that hit them and are always logged at
    /// error level.
    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload(_) | Self::Consistency(_) | Self::Serialization(_)
        )
    }

    /// Text suitable for the user-visible status channel.
    ///
    /// Prefers the server-provided message, then the error code description,
    /// then a generic sentence.
    pub fn user_message(&self) -> String {
        match self {
            Self::Request { message, code } => {
                if !message.trim().is_empty() {
                    message.clone()
                } else if let Some(code) = code {
                    code.description().to_string()
                } else {
                    GENERIC_FAILURE_MESSAGE.to_string()
                }
            }
            Self::NotAuthenticated => ErrorCode::AuthenticationRequired.description().to_string(),
            Self::NotConnected | Self::TransportClosed => {
                "Not connected to the game server.".to_string()
            }
            Self::ConnectionFailed { .. } => {
                "Lost connection to the game server. Reconnect to continue.".to_string()
            }
            Self::Timeout => "The request timed out. Please try again.".to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// A specialized [`Result`] type for Strategos client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

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
    fn user_message_prefers_server_text() {
        let err = ClientError::request("Game is full", Some(ErrorCode::GameFull));
        assert_eq!(err.user_message(), "Game is full");
    }

    #[test]
    fn user_message_falls_back_to_code_description() {
        let err = ClientError::request("  ", Some(ErrorCode::GameNotFound));
        assert_eq!(err.user_message(), ErrorCode::GameNotFound.description());
    }

    #[test]
    fn user_message_generic_without_details() {
        let err = ClientError::request("", None);
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
        assert_eq!(
            ClientError::Task("join error".into()).user_message(),
            GENERIC_FAILURE_MESSAGE
        );
    }

    #[test]
    fn consistency_classification() {
        assert!(ClientError::Consistency("unknown location 7".into()).is_consistency());
        assert!(ClientError::MalformedPayload("missing turn".into()).is_consistency());
        assert!(!ClientError::NotConnected.is_consistency());
        assert!(!ClientError::request("nope", None).is_consistency());
    }
}
