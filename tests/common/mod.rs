#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Strategos client integration tests.
//!
//! Provides an in-memory [`LoopbackTransport`] whose server half is handed to
//! the test by a [`ScriptedConnector`], mock [`AuthApi`]/[`GameApi`]
//! implementations whose replies the test controls, and payload fixtures.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use strategos_client::api::{
    AuthApi, Credentials, GameApi, LoginResponse, MapSettings, NewGame, NewPlayer, OrderDraft,
    UserProfile,
};
use strategos_client::protocol::{
    Economy, Envelope, GameEvent, GameId, GameMetadata, InitialPayload, Location, LocationKind,
    LocationState, Player, PlayerId, RefreshPayload, TurnInfo, Unit, UnitKind,
};
use strategos_client::{AuthTokens, ClientError, Connector, ErrorCode, Transport, UiEvent};
use tokio::sync::{mpsc, oneshot};

/// How long helpers wait for something before failing the test.
pub const WAIT: Duration = Duration::from_secs(5);

/// Install a `tracing` subscriber honoring `RUST_LOG`. Safe to call from
/// every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Let spawned tasks on the current-thread runtime make progress.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Poll `condition` until it holds, failing the test after [`WAIT`].
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

// ── LoopbackTransport ───────────────────────────────────────────────

/// Client half of an in-memory connection.
pub struct LoopbackTransport {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::TransportClosed);
        }
        self.outbound
            .send(message)
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Server half of an in-memory connection. Dropping it (or calling
/// [`hang_up`](Self::hang_up)) closes the connection from the server side.
pub struct ServerEnd {
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl ServerEnd {
    /// Push an event to the client.
    pub fn push(&self, event: &str, data: Value) {
        let frame = serde_json::to_string(&Envelope::new(event, data)).unwrap();
        self.push_raw(frame);
    }

    /// Push an arbitrary text frame.
    pub fn push_raw(&self, frame: impl Into<String>) {
        self.to_client.send(frame.into()).unwrap();
    }

    /// Wait for the next envelope the client sends.
    pub async fn next_sent(&mut self) -> Envelope {
        let text = tokio::time::timeout(WAIT, self.from_client.recv())
            .await
            .expect("timed out waiting for a client message")
            .expect("client side closed");
        serde_json::from_str(&text).unwrap()
    }

    /// Everything the client has sent so far.
    pub fn drain_sent(&mut self) -> Vec<Envelope> {
        let mut sent = Vec::new();
        while let Ok(text) = self.from_client.try_recv() {
            sent.push(serde_json::from_str(&text).unwrap());
        }
        sent
    }

    /// Returns `true` if the client closed its half.
    pub fn client_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn hang_up(self) {}
}

/// Create a connected client/server pair.
pub fn loopback() -> (LoopbackTransport, ServerEnd) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    (
        LoopbackTransport {
            inbound,
            outbound,
            closed: Arc::clone(&closed),
        },
        ServerEnd {
            to_client,
            from_client,
            closed,
        },
    )
}

// ── ScriptedConnector ───────────────────────────────────────────────

/// A [`Connector`] that either refuses or opens a loopback connection whose
/// server half is delivered to the paired [`Dialer`].
pub struct ScriptedConnector {
    servers: mpsc::UnboundedSender<ServerEnd>,
    dials: Arc<AtomicU32>,
    refuse: Arc<AtomicBool>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, ClientError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "scripted refusal",
            )));
        }
        let (client, server) = loopback();
        self.servers
            .send(server)
            .map_err(|_| ClientError::TransportClosed)?;
        Ok(Box::new(client))
    }
}

/// Test-side handle of a [`ScriptedConnector`].
pub struct Dialer {
    servers: mpsc::UnboundedReceiver<ServerEnd>,
    dials: Arc<AtomicU32>,
    refuse: Arc<AtomicBool>,
}

impl Dialer {
    /// Number of connection attempts made so far.
    pub fn dials(&self) -> u32 {
        self.dials.load(Ordering::SeqCst)
    }

    /// Make subsequent attempts fail (`true`) or succeed (`false`).
    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Wait for the client to open a connection.
    pub async fn accept(&mut self) -> ServerEnd {
        tokio::time::timeout(WAIT, self.servers.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }
}

/// A connector that accepts every attempt.
pub fn connector() -> (ScriptedConnector, Dialer) {
    let (servers_tx, servers_rx) = mpsc::unbounded_channel();
    let dials = Arc::new(AtomicU32::new(0));
    let refuse = Arc::new(AtomicBool::new(false));
    (
        ScriptedConnector {
            servers: servers_tx,
            dials: Arc::clone(&dials),
            refuse: Arc::clone(&refuse),
        },
        Dialer {
            servers: servers_rx,
            dials,
            refuse,
        },
    )
}

// ── MockAuthApi ─────────────────────────────────────────────────────

/// Accepts any credentials unless told otherwise.
#[derive(Default)]
pub struct MockAuthApi {
    /// When set, `login` fails with this server message.
    pub reject_login: StdMutex<Option<String>>,
    /// When set, `logout` fails.
    pub fail_logout: AtomicBool,
    /// Access tokens passed to `logout`.
    pub logouts: StdMutex<Vec<String>>,
    refreshes: AtomicU32,
}

impl MockAuthApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting(message: &str) -> Arc<Self> {
        let api = Self::default();
        *api.reject_login.lock().unwrap() = Some(message.to_string());
        Arc::new(api)
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ClientError> {
        if let Some(message) = self.reject_login.lock().unwrap().clone() {
            return Err(ClientError::request(
                message,
                Some(ErrorCode::InvalidCredentials),
            ));
        }
        Ok(LoginResponse {
            user: UserProfile {
                id: 1,
                username: credentials.username.clone(),
            },
            tokens: AuthTokens::new("access-1", "refresh-1"),
        })
    }

    async fn logout(&self, access_token: &str) -> Result<(), ClientError> {
        self.logouts.lock().unwrap().push(access_token.to_string());
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(ClientError::request("logout unavailable", None));
        }
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, ClientError> {
        if !refresh_token.starts_with("refresh-") {
            return Err(ClientError::request(
                "refresh token rejected",
                Some(ErrorCode::InvalidToken),
            ));
        }
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 2;
        Ok(AuthTokens::new(format!("access-{n}"), format!("refresh-{n}")))
    }
}

// ── MockGameApi ─────────────────────────────────────────────────────

/// A request made through [`MockGameApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Load(GameId),
    Refresh(GameId),
    Create(String),
    AddPlayer(GameId, String),
    GenerateMap(GameId),
    PlacePlayers(GameId),
    Start(GameId),
    SubmitOrders(GameId, usize),
}

/// The test's answer to a [`Call`].
#[derive(Debug)]
pub enum Reply {
    Initial(InitialPayload),
    Refresh(RefreshPayload),
    Created(GameId),
    Player(PlayerId),
    Done,
    Fail(String),
}

/// A call waiting for its reply.
pub struct Pending {
    pub call: Call,
    reply: oneshot::Sender<Reply>,
    /// Bearer token the call was made with.
    pub token: String,
}

impl Pending {
    /// Answer the call. Ignored if the caller has gone away (aborted).
    pub fn reply(self, reply: Reply) {
        let _ = self.reply.send(reply);
    }

    /// Returns `true` if the caller stopped waiting (the request was aborted).
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }
}

/// A [`GameApi`] whose every call blocks until the test answers it through
/// the paired [`GameServer`].
pub struct MockGameApi {
    calls: mpsc::UnboundedSender<Pending>,
}

/// Test-side handle of a [`MockGameApi`].
pub struct GameServer {
    calls: mpsc::UnboundedReceiver<Pending>,
    backlog: VecDeque<Pending>,
}

impl GameServer {
    /// Wait for the next call.
    pub async fn next(&mut self) -> Pending {
        if let Some(pending) = self.backlog.pop_front() {
            return pending;
        }
        tokio::time::timeout(WAIT, self.calls.recv())
            .await
            .expect("timed out waiting for an API call")
            .expect("api dropped")
    }

    /// Wait for a call matching `call`, keeping others for later.
    pub async fn expect(&mut self, call: Call) -> Pending {
        if let Some(pos) = self.backlog.iter().position(|p| p.call == call) {
            return self.backlog.remove(pos).unwrap();
        }
        loop {
            let pending = tokio::time::timeout(WAIT, self.calls.recv())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {call:?}"))
                .expect("api dropped");
            if pending.call == call {
                return pending;
            }
            self.backlog.push_back(pending);
        }
    }

    /// Returns `true` if no call is waiting.
    pub fn is_idle(&mut self) -> bool {
        while let Ok(pending) = self.calls.try_recv() {
            self.backlog.push_back(pending);
        }
        self.backlog.is_empty()
    }
}

pub fn game_api() -> (Arc<MockGameApi>, GameServer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Arc::new(MockGameApi { calls: tx }),
        GameServer {
            calls: rx,
            backlog: VecDeque::new(),
        },
    )
}

impl MockGameApi {
    async fn ask(&self, token: &str, call: Call) -> Result<Reply, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.calls
            .send(Pending {
                call,
                reply: tx,
                token: token.to_string(),
            })
            .map_err(|_| ClientError::Task("game server handle dropped".into()))?;
        match rx.await {
            Ok(Reply::Fail(message)) => Err(ClientError::request(message, None)),
            Ok(reply) => Ok(reply),
            Err(_) => Err(ClientError::Task("reply dropped".into())),
        }
    }
}

fn unexpected(reply: Reply) -> ClientError {
    ClientError::Task(format!("unexpected reply {reply:?}"))
}

#[async_trait]
impl GameApi for MockGameApi {
    async fn load_game(&self, token: &str, game_id: GameId) -> Result<InitialPayload, ClientError> {
        match self.ask(token, Call::Load(game_id)).await? {
            Reply::Initial(payload) => Ok(payload),
            other => Err(unexpected(other)),
        }
    }

    async fn refresh_game(
        &self,
        token: &str,
        game_id: GameId,
    ) -> Result<RefreshPayload, ClientError> {
        match self.ask(token, Call::Refresh(game_id)).await? {
            Reply::Refresh(payload) => Ok(payload),
            other => Err(unexpected(other)),
        }
    }

    async fn create_game(&self, token: &str, game: &NewGame) -> Result<GameId, ClientError> {
        match self.ask(token, Call::Create(game.name.clone())).await? {
            Reply::Created(id) => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    async fn add_player(
        &self,
        token: &str,
        game_id: GameId,
        player: &NewPlayer,
    ) -> Result<PlayerId, ClientError> {
        match self
            .ask(token, Call::AddPlayer(game_id, player.name.clone()))
            .await?
        {
            Reply::Player(id) => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    async fn generate_map(
        &self,
        token: &str,
        game_id: GameId,
        _settings: &MapSettings,
    ) -> Result<(), ClientError> {
        match self.ask(token, Call::GenerateMap(game_id)).await? {
            Reply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn place_players(&self, token: &str, game_id: GameId) -> Result<(), ClientError> {
        match self.ask(token, Call::PlacePlayers(game_id)).await? {
            Reply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn start_game(&self, token: &str, game_id: GameId) -> Result<(), ClientError> {
        match self.ask(token, Call::Start(game_id)).await? {
            Reply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn submit_orders(
        &self,
        token: &str,
        game_id: GameId,
        orders: &[OrderDraft],
    ) -> Result<(), ClientError> {
        match self
            .ask(token, Call::SubmitOrders(game_id, orders.len()))
            .await?
        {
            Reply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

/// A three-location, two-player game. Player 10 belongs to the local user.
pub fn initial_payload(game_id: GameId) -> InitialPayload {
    let location = |id, name: &str| Location {
        id,
        name: name.into(),
        kind: LocationKind::Land,
        neighbors: vec![],
        supply_center: true,
    };
    let player = |id, color: &str| Player {
        id,
        name: format!("player-{id}"),
        color: color.into(),
        is_ai: false,
    };
    InitialPayload {
        success: true,
        error: None,
        game_id,
        game: GameMetadata {
            name: format!("game-{game_id}"),
            ..GameMetadata::default()
        },
        locations: vec![location(1, "Alba"), location(2, "Brest"), location(3, "Corfu")],
        players: vec![player(10, "#c0392b"), player(20, "#2980b9")],
        your_player_id: Some(10),
        turn: TurnInfo {
            number: 1,
            ..TurnInfo::default()
        },
        location_states: vec![owned(1, 10), owned(2, 20)],
        units: vec![army(100, 10, 1), army(101, 20, 2)],
        orders: vec![],
        events: vec![],
    }
}

/// A refresh that hands Alba to player 20 and moves unit 101 there.
pub fn refresh_payload(game_id: GameId, turn: u32) -> RefreshPayload {
    RefreshPayload {
        game_id,
        turn: Some(TurnInfo {
            number: turn,
            ..TurnInfo::default()
        }),
        location_states: Some(vec![owned(1, 20), owned(2, 20)]),
        units: Some(vec![army(100, 10, 3), army(101, 20, 1)]),
        orders: Some(vec![]),
        events: Some(vec![GameEvent {
            turn,
            message: "Alba changed hands".into(),
        }]),
    }
}

pub fn owned(location_id: u64, owner: PlayerId) -> LocationState {
    LocationState {
        location_id,
        owner_id: Some(owner),
        economy: Economy {
            production: 2,
            population: 5,
        },
    }
}

pub fn army(id: u64, owner_id: PlayerId, location_id: u64) -> Unit {
    Unit {
        id,
        owner_id,
        kind: UnitKind::Army,
        location_id,
    }
}

/// Everything currently waiting on the UI channel.
pub fn drain_ui(rx: &mut mpsc::Receiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
