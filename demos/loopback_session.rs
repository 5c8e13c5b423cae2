//! # Loopback Session Demo
//!
//! Runs a complete client session against an in-process fake server:
//! login, the authentication handshake, loading a game, and the refresh
//! that follows a `game:turnComplete` push.
//!
//! The push channel is a pair of in-memory queues behind a custom
//! [`Connector`], and the HTTP side is a canned [`AuthApi`] + [`GameApi`].
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback_session
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use strategos_client::api::{LoginResponse, MapSettings, NewGame, NewPlayer, OrderDraft, UserProfile};
use strategos_client::protocol::{
    Economy, GameId, GameMetadata, InitialPayload, Location, LocationKind, LocationState, Player,
    PlayerId, RefreshPayload, TurnInfo, Unit, UnitKind,
};
use strategos_client::{
    AuthApi, AuthTokens, ClientConfig, ClientError, Connector, Credentials, Envelope, GameApi,
    GameClient, Transport, UiEvent,
};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: An in-memory push channel
// ─────────────────────────────────────────────────────────────────────

/// Client half of the loopback.
struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

/// Server half of the loopback.
struct LoopbackServer {
    rx: mpsc::UnboundedReceiver<String>,
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        self.tx
            .send(message)
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Opens a fresh loopback per connection attempt and hands the server half
/// to the fake server task.
struct LoopbackConnector {
    accepted: mpsc::UnboundedSender<LoopbackServer>,
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, ClientError> {
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        self.accepted
            .send(LoopbackServer {
                rx: server_rx,
                tx: server_tx,
            })
            .map_err(|_| ClientError::TransportClosed)?;
        Ok(Box::new(LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        }))
    }
}

/// Answer `game:join` with a finished turn so the client refreshes.
async fn fake_push_server(mut accepted: mpsc::UnboundedReceiver<LoopbackServer>) {
    while let Some(mut conn) = accepted.recv().await {
        while let Some(frame) = conn.rx.recv().await {
            let Ok(envelope) = serde_json::from_str::<Envelope>(&frame) else {
                continue;
            };
            tracing::info!(event = %envelope.event, data = %envelope.data, "server received");
            if envelope.event == "game:join" {
                let push = Envelope::new(
                    "game:turnComplete",
                    json!({ "gameId": envelope.data["gameId"], "turn": 1 }),
                );
                if let Ok(text) = serde_json::to_string(&push) {
                    let _ = conn.tx.send(text);
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Canned HTTP endpoints
// ─────────────────────────────────────────────────────────────────────

struct CannedApi;

fn state(location_id: u64, owner: PlayerId) -> LocationState {
    LocationState {
        location_id,
        owner_id: Some(owner),
        economy: Economy {
            production: 1,
            population: 4,
        },
    }
}

fn army(id: u64, owner_id: PlayerId, location_id: u64) -> Unit {
    Unit {
        id,
        owner_id,
        kind: UnitKind::Army,
        location_id,
    }
}

#[async_trait]
impl AuthApi for CannedApi {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ClientError> {
        Ok(LoginResponse {
            user: UserProfile {
                id: 1,
                username: credentials.username.clone(),
            },
            tokens: AuthTokens::new("demo-access", "demo-refresh"),
        })
    }

    async fn logout(&self, _access_token: &str) -> Result<(), ClientError> {
        Ok(())
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<AuthTokens, ClientError> {
        Ok(AuthTokens::new("demo-access-2", "demo-refresh-2"))
    }
}

#[async_trait]
impl GameApi for CannedApi {
    async fn load_game(&self, _token: &str, game_id: GameId) -> Result<InitialPayload, ClientError> {
        let location = |id, name: &str, neighbors: Vec<u64>| Location {
            id,
            name: name.into(),
            kind: LocationKind::Land,
            neighbors,
            supply_center: true,
        };
        Ok(InitialPayload {
            success: true,
            error: None,
            game_id,
            game: GameMetadata {
                name: "Demo".into(),
                max_players: 2,
                ..GameMetadata::default()
            },
            locations: vec![
                location(1, "Vienna", vec![2]),
                location(2, "Budapest", vec![1, 3]),
                location(3, "Trieste", vec![2]),
            ],
            players: vec![
                Player {
                    id: 10,
                    name: "Austria".into(),
                    color: "#c0392b".into(),
                    is_ai: false,
                },
                Player {
                    id: 20,
                    name: "Italy".into(),
                    color: "#27ae60".into(),
                    is_ai: true,
                },
            ],
            your_player_id: Some(10),
            turn: TurnInfo {
                number: 1,
                ..TurnInfo::default()
            },
            location_states: vec![state(1, 10), state(2, 10), state(3, 20)],
            units: vec![army(100, 10, 1), army(200, 20, 3)],
            orders: vec![],
            events: vec![],
        })
    }

    async fn refresh_game(&self, _token: &str, game_id: GameId) -> Result<RefreshPayload, ClientError> {
        Ok(RefreshPayload {
            game_id,
            turn: Some(TurnInfo {
                number: 2,
                ..TurnInfo::default()
            }),
            location_states: Some(vec![state(1, 10), state(2, 10), state(3, 10)]),
            units: Some(vec![army(100, 10, 3)]),
            orders: Some(vec![]),
            events: Some(vec![]),
        })
    }

    async fn create_game(&self, _token: &str, _game: &NewGame) -> Result<GameId, ClientError> {
        Ok(1)
    }

    async fn add_player(
        &self,
        _token: &str,
        _game_id: GameId,
        _player: &NewPlayer,
    ) -> Result<PlayerId, ClientError> {
        Ok(30)
    }

    async fn generate_map(
        &self,
        _token: &str,
        _game_id: GameId,
        _settings: &MapSettings,
    ) -> Result<(), ClientError> {
        Ok(())
    }

    async fn place_players(&self, _token: &str, _game_id: GameId) -> Result<(), ClientError> {
        Ok(())
    }

    async fn start_game(&self, _token: &str, _game_id: GameId) -> Result<(), ClientError> {
        Ok(())
    }

    async fn submit_orders(
        &self,
        _token: &str,
        _game_id: GameId,
        _orders: &[OrderDraft],
    ) -> Result<(), ClientError> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Drive a session
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
    tokio::spawn(fake_push_server(accepted_rx));

    let api = std::sync::Arc::new(CannedApi);
    let (client, mut ui) = GameClient::new(
        LoopbackConnector {
            accepted: accepted_tx,
        },
        api.clone(),
        api,
        ClientConfig::default(),
    );

    let user = client.login(&Credentials::new("ada", "hunter2")).await?;
    tracing::info!(username = %user.username, "logged in");

    // Wait for the authenticated connection before loading.
    while !client.transport().is_connected() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    client.games().request_initial_load(1).await?;

    // ── Watch the UI channel until the post-turn refresh lands ──────
    let refreshed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = ui.recv().await {
            tracing::info!(name = event.name(), ?event, "ui event");
            if matches!(event, UiEvent::GameRefreshed { turn: 2, .. }) {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    for location in client.cache().locations() {
        tracing::info!(
            location = %location.location.name,
            owner = ?location.owner,
            color = ?location.color,
            units = ?location.units,
            "map"
        );
    }

    client.logout().await;
    tracing::info!(refreshed, "done");
    Ok(())
}
