//! Wire-compatible protocol types for the Strategos game server.
//!
//! Every frame on the wire is a JSON text message with the envelope
//! `{"event": "<name>", "data": <payload>}`. The transport layer only ever
//! sees [`Envelope`]s; the typed [`ClientEvent`] and [`ServerEvent`] enums
//! live on top of it and are what the controllers match on.
//!
//! Payload field names are camelCase to match the server's JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::error_codes::ErrorCode;

// ── Type aliases ────────────────────────────────────────────────────

/// Unique identifier for games.
pub type GameId = u64;

/// Unique identifier for players within a game.
pub type PlayerId = u64;

/// Unique identifier for map locations.
pub type LocationId = u64;

/// Unique identifier for mobile units.
pub type UnitId = u64;

/// Event names used on the wire.
pub mod events {
    /// Client → server: authentication handshake.
    pub const AUTHENTICATE: &str = "authenticate";
    /// Client → server: subscribe to a game's push events.
    pub const GAME_JOIN: &str = "game:join";
    /// Client → server: unsubscribe from a game's push events.
    pub const GAME_LEAVE: &str = "game:leave";
    /// Server → client: full game snapshot.
    pub const GAME_STATE: &str = "game:state";
    /// Server → client: refreshable state only.
    pub const GAME_UPDATE: &str = "game:update";
    /// Server → client: a turn finished resolving.
    pub const TURN_COMPLETE: &str = "game:turnComplete";
    /// Server → client: the roster changed.
    pub const PLAYER_JOINED: &str = "game:playerJoined";
    /// Server → client: the game left its setup phase.
    pub const GAME_STARTED: &str = "game:started";
    /// Server → client: an error not tied to a request.
    pub const ERROR: &str = "error";
}

// ── Envelope ────────────────────────────────────────────────────────

/// The raw `(event, payload)` frame shared by both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name, e.g. `"game:turnComplete"`.
    pub event: String,
    /// Event payload. Missing payloads decode as `null`.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Create a new envelope.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

// ── Enums ───────────────────────────────────────────────────────────

/// Terrain class of a map location.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    #[default]
    Land,
    Sea,
    Coast,
}

/// Lifecycle of a game on the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Players are being added and the map prepared.
    #[default]
    Setup,
    Active,
    Finished,
}

/// Phase within a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Orders,
    Resolution,
    Adjustment,
}

/// Mobile unit class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Army,
    Fleet,
}

/// Order class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Hold,
    Move,
    Support,
}

// ── Entities ────────────────────────────────────────────────────────

/// A static map location (part of the topology).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    #[serde(default)]
    pub kind: LocationKind,
    #[serde(default)]
    pub neighbors: Vec<LocationId>,
    /// Whether holding this location counts toward the economy.
    #[serde(default)]
    pub supply_center: bool,
}

/// A player in the game roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Display color, e.g. `"#c0392b"`.
    pub color: String,
    #[serde(default)]
    pub is_ai: bool,
}

/// Descriptive game metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameMetadata {
    pub name: String,
    #[serde(default)]
    pub status: GameStatus,
    #[serde(default)]
    pub map_name: Option<String>,
    #[serde(default)]
    pub max_players: u8,
}

/// The current turn descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TurnInfo {
    pub number: u32,
    #[serde(default)]
    pub phase: TurnPhase,
    /// ISO 8601 order deadline, if the game uses one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
}

/// Economic output of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Economy {
    pub production: u32,
    pub population: u32,
}

/// Per-location ownership/economy record (refreshable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationState {
    pub location_id: LocationId,
    /// `None` means the location is unowned.
    #[serde(default)]
    pub owner_id: Option<PlayerId>,
    #[serde(default)]
    pub economy: Economy,
}

/// A mobile unit on the map (refreshable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: UnitId,
    pub owner_id: PlayerId,
    pub kind: UnitKind,
    pub location_id: LocationId,
}

/// A pending order (refreshable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: u64,
    pub player_id: PlayerId,
    pub unit_id: UnitId,
    pub kind: OrderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<LocationId>,
}

/// An entry in the game's event log (refreshable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    pub turn: u32,
    pub message: String,
}

// ── Payloads ────────────────────────────────────────────────────────

/// Full game snapshot: `game:state` push or the body of a load request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialPayload {
    /// Server-side success indicator. `false` makes the payload unusable.
    pub success: bool,
    /// Server message accompanying an unsuccessful payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub game_id: GameId,
    #[serde(default)]
    pub game: GameMetadata,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub players: Vec<Player>,
    /// The roster entry that belongs to the logged-in user, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub your_player_id: Option<PlayerId>,
    pub turn: TurnInfo,
    #[serde(default)]
    pub location_states: Vec<LocationState>,
    #[serde(default)]
    pub units: Vec<Unit>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub events: Vec<GameEvent>,
}

/// Partial refresh: `game:update` push or the body of a refresh request.
///
/// Every refreshable field is optional on the wire so that a payload missing
/// one of them can be detected and rejected instead of failing to decode.
/// Use [`RefreshPayload::validate`] to obtain a [`RefreshData`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPayload {
    pub game_id: GameId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<TurnInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_states: Option<Vec<LocationState>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Vec<Unit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<Vec<Order>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<GameEvent>>,
}

/// A refresh payload with every refreshable field present.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshData {
    pub game_id: GameId,
    pub turn: TurnInfo,
    pub location_states: Vec<LocationState>,
    pub units: Vec<Unit>,
    pub orders: Vec<Order>,
    pub events: Vec<GameEvent>,
}

impl RefreshPayload {
    /// Check that all five refreshable fields are present.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MalformedPayload`] naming the first missing field.
    pub fn validate(self) -> Result<RefreshData> {
        fn require<T>(field: Option<T>, name: &str) -> Result<T> {
            field.ok_or_else(|| {
                ClientError::MalformedPayload(format!("refresh payload is missing `{name}`"))
            })
        }

        Ok(RefreshData {
            game_id: self.game_id,
            turn: require(self.turn, "turn")?,
            location_states: require(self.location_states, "locationStates")?,
            units: require(self.units, "units")?,
            orders: require(self.orders, "orders")?,
            events: require(self.events, "events")?,
        })
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Authentication handshake; sent once per established connection.
    Authenticate { token: String },
    /// Subscribe to push events for a game.
    JoinGame {
        game_id: GameId,
        player_id: Option<PlayerId>,
    },
    /// Unsubscribe from a game's push events.
    LeaveGame { game_id: GameId },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinGameData {
    game_id: GameId,
    #[serde(skip_serializing_if = "Option::is_none")]
    player_id: Option<PlayerId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaveGameData {
    game_id: GameId,
}

impl ClientEvent {
    /// The wire event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => events::AUTHENTICATE,
            Self::JoinGame { .. } => events::GAME_JOIN,
            Self::LeaveGame { .. } => events::GAME_LEAVE,
        }
    }

    /// Serialize the event's payload.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serialization`] if the payload cannot be encoded.
    pub fn payload(&self) -> Result<Value> {
        let value = match self {
            Self::Authenticate { token } => serde_json::json!({ "token": token }),
            Self::JoinGame { game_id, player_id } => serde_json::to_value(JoinGameData {
                game_id: *game_id,
                player_id: *player_id,
            })?,
            Self::LeaveGame { game_id } => {
                serde_json::to_value(LeaveGameData { game_id: *game_id })?
            }
        };
        Ok(value)
    }

    /// Convert into a wire [`Envelope`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serialization`] if the payload cannot be encoded.
    pub fn to_envelope(&self) -> Result<Envelope> {
        Ok(Envelope::new(self.name(), self.payload()?))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TurnCompleteData {
    game_id: GameId,
    #[serde(default)]
    turn: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerJoinedData {
    game_id: GameId,
    player_id: PlayerId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameStartedData {
    game_id: GameId,
}

#[derive(Deserialize)]
struct ErrorData {
    message: String,
    #[serde(default)]
    code: Option<ErrorCode>,
}

/// Messages pushed from server to client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Full snapshot of a game (boxed to reduce enum size).
    GameState(Box<InitialPayload>),
    /// Refreshable state of a game (boxed to reduce enum size).
    GameUpdate(Box<RefreshPayload>),
    /// A turn finished resolving; the client should refresh.
    TurnComplete {
        game_id: GameId,
        turn: Option<u32>,
    },
    /// A player joined the game's roster.
    PlayerJoined {
        game_id: GameId,
        player_id: PlayerId,
    },
    /// The game left its setup phase.
    GameStarted { game_id: GameId },
    /// Server-side error not tied to a specific request.
    Error {
        message: String,
        code: Option<ErrorCode>,
    },
    /// An event this client does not handle.
    Other { name: String },
}

impl ServerEvent {
    /// Decode a typed event from a raw `(event, payload)` pair.
    ///
    /// Unknown event names decode to [`ServerEvent::Other`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serialization`] if a known event carries a
    /// payload of the wrong shape.
    pub fn decode(name: &str, data: &Value) -> Result<Self> {
        let event = match name {
            events::GAME_STATE => Self::GameState(Box::new(InitialPayload::deserialize(data)?)),
            events::GAME_UPDATE => Self::GameUpdate(Box::new(RefreshPayload::deserialize(data)?)),
            events::TURN_COMPLETE => {
                let d = TurnCompleteData::deserialize(data)?;
                Self::TurnComplete {
                    game_id: d.game_id,
                    turn: d.turn,
                }
            }
            events::PLAYER_JOINED => {
                let d = PlayerJoinedData::deserialize(data)?;
                Self::PlayerJoined {
                    game_id: d.game_id,
                    player_id: d.player_id,
                }
            }
            events::GAME_STARTED => Self::GameStarted {
                game_id: GameStartedData::deserialize(data)?.game_id,
            },
            events::ERROR => {
                let d = ErrorData::deserialize(data)?;
                Self::Error {
                    message: d.message,
                    code: d.code,
                }
            }
            other => Self::Other {
                name: other.to_string(),
            },
        };
        Ok(event)
    }

    /// Decode from an [`Envelope`].
    ///
    /// # Errors
    ///
    /// See [`ServerEvent::decode`].
    pub fn from_envelope(envelope: &Envelope) -> Result<Self> {
        Self::decode(&envelope.event, &envelope.data)
    }

    /// The game this event belongs to, if it is game-scoped.
    pub fn game_id(&self) -> Option<GameId> {
        match self {
            Self::GameState(payload) => Some(payload.game_id),
            Self::GameUpdate(payload) => Some(payload.game_id),
            Self::TurnComplete { game_id, .. }
            | Self::PlayerJoined { game_id, .. }
            | Self::GameStarted { game_id } => Some(*game_id),
            Self::Error { .. } | Self::Other { .. } => None,
        }
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
    use serde_json::json;

    #[test]
    fn join_game_envelope_matches_wire_contract() {
        let envelope = ClientEvent::JoinGame {
            game_id: 12,
            player_id: Some(3),
        }
        .to_envelope()
        .unwrap();
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({ "event": "game:join", "data": { "gameId": 12, "playerId": 3 } })
        );
    }

    #[test]
    fn authenticate_envelope_carries_token() {
        let envelope = ClientEvent::Authenticate {
            token: "abc".into(),
        }
        .to_envelope()
        .unwrap();
        assert_eq!(envelope.event, "authenticate");
        assert_eq!(envelope.data, json!({ "token": "abc" }));
    }

    #[test]
    fn envelope_without_data_decodes_as_null() {
        let envelope: Envelope = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(envelope.data, Value::Null);
    }

    #[test]
    fn decode_turn_complete() {
        let event =
            ServerEvent::decode("game:turnComplete", &json!({ "gameId": 5, "turn": 9 })).unwrap();
        assert_eq!(
            event,
            ServerEvent::TurnComplete {
                game_id: 5,
                turn: Some(9)
            }
        );
        assert_eq!(event.game_id(), Some(5));
    }

    #[test]
    fn decode_unknown_event_is_other() {
        let event = ServerEvent::decode("chat:message", &json!({ "text": "hi" })).unwrap();
        assert_eq!(
            event,
            ServerEvent::Other {
                name: "chat:message".into()
            }
        );
        assert_eq!(event.game_id(), None);
    }

    #[test]
    fn decode_known_event_with_bad_payload_fails() {
        let err = ServerEvent::decode("game:turnComplete", &json!({ "turn": 1 })).unwrap_err();
        assert!(matches!(err, ClientError::Serialization(_)));
    }

    #[test]
    fn decode_error_event_with_code() {
        let event = ServerEvent::decode(
            "error",
            &json!({ "message": "slow down", "code": "RATE_LIMIT_EXCEEDED" }),
        )
        .unwrap();
        assert_eq!(
            event,
            ServerEvent::Error {
                message: "slow down".into(),
                code: Some(ErrorCode::RateLimitExceeded)
            }
        );
    }

    #[test]
    fn refresh_validate_reports_missing_field() {
        let payload = RefreshPayload {
            game_id: 1,
            turn: Some(TurnInfo::default()),
            location_states: Some(vec![]),
            units: None,
            orders: Some(vec![]),
            events: Some(vec![]),
        };
        let err = payload.validate().unwrap_err();
        match err {
            ClientError::MalformedPayload(msg) => assert!(msg.contains("units")),
            other => panic!("expected MalformedPayload, got {other:?}"),
        }
    }

    #[test]
    fn refresh_null_field_counts_as_missing() {
        let payload: RefreshPayload = serde_json::from_value(json!({
            "gameId": 1,
            "turn": { "number": 2 },
            "locationStates": [],
            "units": [],
            "orders": null,
            "events": []
        }))
        .unwrap();
        assert!(payload.validate().is_err());
    }
}
