//! Error codes for structured error handling in the Strategos API.
//!
//! These codes are wire-compatible with the server's rejection codes and
//! serialize using `SCREAMING_SNAKE_CASE` to match the server's JSON format.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error codes returned by the Strategos game server.
///
/// The server sends these as `"SCREAMING_SNAKE_CASE"` strings (e.g.,
/// `"GAME_NOT_FOUND"`), both in HTTP error bodies and in `error` push events.
///
/// Use [`description()`](ErrorCode::description) for a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication errors
    Unauthorized,
    InvalidCredentials,
    InvalidToken,
    TokenExpired,
    AuthenticationRequired,

    // Validation errors
    InvalidInput,
    InvalidGameName,
    InvalidPlayerName,
    InvalidMaxPlayers,
    InvalidOrder,

    // Game errors
    GameNotFound,
    GameFull,
    GameAlreadyStarted,
    GameNotStarted,
    GameFinished,
    NotAPlayer,
    NotGameOwner,
    NotYourTurn,
    MapNotGenerated,
    PlayersNotPlaced,
    NotEnoughPlayers,

    // Rate limiting
    RateLimitExceeded,

    // Server errors
    InternalError,
    StorageError,
    ServiceUnavailable,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    ///
    /// Used as the status-line text when the server rejects a request
    /// without a message of its own.
    pub fn description(&self) -> &'static str {
        match self {
            // Authentication errors
            Self::Unauthorized => {
                "Access denied. Authentication credentials are missing or invalid."
            }
            Self::InvalidCredentials => "The username or password is incorrect.",
            Self::InvalidToken => {
                "The session token is invalid or malformed. Please log in again."
            }
            Self::TokenExpired => "Your session has expired. Please log in again.",
            Self::AuthenticationRequired => "You need to be logged in to do that.",

            // Validation errors
            Self::InvalidInput => {
                "The provided input is invalid or malformed. Check your request parameters."
            }
            Self::InvalidGameName => {
                "The game name is invalid. Game names must be non-empty and follow naming requirements."
            }
            Self::InvalidPlayerName => {
                "The player name is invalid. Player names must be non-empty and meet length requirements."
            }
            Self::InvalidMaxPlayers => {
                "The maximum player count is invalid. It must be a positive number within allowed limits."
            }
            Self::InvalidOrder => "One or more orders are not valid for the current turn.",

            // Game errors
            Self::GameNotFound => {
                "The requested game could not be found. It may have been deleted."
            }
            Self::GameFull => "The game has reached its maximum number of players.",
            Self::GameAlreadyStarted => "The game has already started.",
            Self::GameNotStarted => "The game has not started yet.",
            Self::GameFinished => "The game is over. No further actions are possible.",
            Self::NotAPlayer => "You are not a player in this game.",
            Self::NotGameOwner => "Only the game's creator can do that.",
            Self::NotYourTurn => "Orders for this turn are closed. Wait for the next turn.",
            Self::MapNotGenerated => "Generate a map before placing players.",
            Self::PlayersNotPlaced => "Place players on the map before starting the game.",
            Self::NotEnoughPlayers => "More players are needed before the game can start.",

            // Rate limiting
            Self::RateLimitExceeded => {
                "Too many requests in a short time. Please slow down and try again later."
            }

            // Server errors
            Self::InternalError => {
                "An internal server error occurred. Please try again or contact support if the issue persists."
            }
            Self::StorageError => {
                "A storage error occurred while processing your request. Please try again later."
            }
            Self::ServiceUnavailable => {
                "The service is temporarily unavailable. Please try again in a few moments."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
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
    fn serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::GameNotFound).unwrap();
        assert_eq!(json, "\"GAME_NOT_FOUND\"");
        let back: ErrorCode = serde_json::from_str("\"NOT_YOUR_TURN\"").unwrap();
        assert_eq!(back, ErrorCode::NotYourTurn);
    }

    #[test]
    fn display_uses_description() {
        assert_eq!(
            ErrorCode::GameFull.to_string(),
            ErrorCode::GameFull.description()
        );
    }
}
