//! Game controller: loads games, routes game events, dispatches actions.
//!
//! Every piece of game-scoped work runs under the active [`SessionGuard`].
//! Loading a game disposes the previous guard first, so whatever the old
//! game still has in flight completes into a stale token and is dropped.
//! This is what keeps "latest requested game wins" true even when the
//! server answers out of order.
//!
//! ```text
//!   no game ──request_initial_load──→ loading ──applied──→ loaded
//!      ▲                                 │                    │
//!      └──── leave_game / reset ─────────┴──── dispose ───────┘
//! ```
//!
//! While loading, refresh pushes and outbound game messages are queued on
//! the guard and released in order once the initial snapshot is applied.

use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, error, info, warn};

use crate::api::{GameApi, MapSettings, NewGame, NewPlayer, OrderDraft};
use crate::cache::GameStateCache;
use crate::connection::{ConnectionChange, ConnectionState, TransportManager};
use crate::error::{ClientError, Result};
use crate::event::{Screen, UiEvent, UiSink};
use crate::guard::{
    CancellationEpoch, GenerationToken, Guarded, InboundDisposition, OutboundDisposition,
    SessionGuard,
};
use crate::protocol::{
    events, ClientEvent, Envelope, GameId, InitialPayload, RefreshPayload, ServerEvent,
};
use crate::subscription::Subscription;
use crate::sync::lock;
use crate::tokens::TokenStore;

// ── Actions ─────────────────────────────────────────────────────────

/// How an action is executed relative to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Runs immediately, only if the guard is valid.
    Sync,
    /// Runs a request, then validates the guard before applying the result.
    Async,
}

/// User-initiated game actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameAction {
    /// Create a new game and load it.
    CreateGame(NewGame),
    /// Subscribe to the current game's push events.
    JoinGame,
    AddPlayer(NewPlayer),
    GenerateMap(MapSettings),
    PlacePlayers,
    StartGame,
    SubmitOrders(Vec<OrderDraft>),
}

impl GameAction {
    pub fn mode(&self) -> DispatchMode {
        match self {
            Self::JoinGame => DispatchMode::Sync,
            Self::CreateGame(_)
            | Self::AddPlayer(_)
            | Self::GenerateMap(_)
            | Self::PlacePlayers
            | Self::StartGame
            | Self::SubmitOrders(_) => DispatchMode::Async,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateGame(_) => "create_game",
            Self::JoinGame => "join_game",
            Self::AddPlayer(_) => "add_player",
            Self::GenerateMap(_) => "generate_map",
            Self::PlacePlayers => "place_players",
            Self::StartGame => "start_game",
            Self::SubmitOrders(_) => "submit_orders",
        }
    }
}

/// What happened to a load, refresh or action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The result was applied (or the message sent).
    Applied,
    /// Held on the guard until the game finishes loading.
    Queued,
    /// Superseded by a newer session or game; nothing was changed.
    Discarded,
}

/// Follow-up after a successful setup action.
#[derive(Debug, Clone, Copy)]
enum FollowUp {
    Reload,
    Refresh,
}

// ── Controller ──────────────────────────────────────────────────────

struct GameInner {
    transport: TransportManager,
    cache: Arc<GameStateCache>,
    api: Arc<dyn GameApi>,
    tokens: Arc<TokenStore>,
    ui: UiSink,
    guard: Mutex<Option<SessionGuard>>,
    /// Advanced on logout; validates actions that are not tied to a game.
    session: CancellationEpoch,
    subscriptions: Mutex<Vec<Subscription>>,
}

/// Owns the active [`SessionGuard`] and is the only writer of the
/// [`GameStateCache`]. Cloning is cheap and shares the controller.
#[derive(Clone)]
pub struct GameController {
    inner: Arc<GameInner>,
}

impl GameController {
    pub fn new(
        transport: TransportManager,
        cache: Arc<GameStateCache>,
        api: Arc<dyn GameApi>,
        tokens: Arc<TokenStore>,
        ui: UiSink,
    ) -> Self {
        Self {
            inner: Arc::new(GameInner {
                transport,
                cache,
                api,
                tokens,
                ui,
                guard: Mutex::new(None),
                session: CancellationEpoch::new(),
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    fn from_weak(weak: &Weak<GameInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Register the controller's transport listeners.
    ///
    /// [`TransportManager::disconnect`] clears every listener, so this is
    /// called again after each login. Re-binding replaces the previous
    /// registration.
    pub fn bind(&self) {
        let weak = Arc::downgrade(&self.inner);
        let messages = self.inner.transport.on_message({
            let weak = weak.clone();
            move |envelope| {
                if let Some(this) = Self::from_weak(&weak) {
                    this.handle_envelope(envelope);
                }
            }
        });
        let connection = self.inner.transport.on_connection_change(move |change| {
            if let Some(this) = Self::from_weak(&weak) {
                this.handle_connection_change(change);
            }
        });

        let mut subscriptions = lock(&self.inner.subscriptions);
        subscriptions.clear();
        subscriptions.push(messages);
        subscriptions.push(connection);
    }

    /// The shared cache this controller writes to.
    pub fn cache(&self) -> &Arc<GameStateCache> {
        &self.inner.cache
    }

    /// The game of the active guard, loaded or still loading.
    pub fn active_game(&self) -> Option<GameId> {
        self.active_guard().map(|g| g.game_id())
    }

    /// Returns `true` if the active game has finished loading.
    pub fn is_loaded(&self) -> bool {
        self.active_guard().is_some_and(|g| g.is_loaded())
    }

    /// The active guard, if any.
    pub fn active_guard(&self) -> Option<SessionGuard> {
        lock(&self.inner.guard).clone()
    }

    // ── Loading ─────────────────────────────────────────────────────

    /// Load `game_id`, replacing whatever game was active.
    ///
    /// Returns [`Outcome::Discarded`] if another load (or a leave/logout)
    /// superseded this one before it finished. A failed request is still
    /// reported even when superseded; an aborted one produces nothing.
    ///
    /// # Errors
    ///
    /// Request failures and payload consistency failures. Both are also
    /// reported on the UI status channel.
    pub async fn request_initial_load(&self, game_id: GameId) -> Result<Outcome> {
        let token = self.access_token()?;
        let guard = self.begin_load(game_id);
        let generation = guard.token();
        info!(game_id, "loading game");

        let api = Arc::clone(&self.inner.api);
        let fetched = guard
            .spawn_validated(async move { api.load_game(&token, game_id).await })
            .await;

        match fetched {
            Guarded::Current(Ok(payload)) => self.complete_initial_load(&guard, generation, payload),
            Guarded::Current(Err(e)) => {
                self.report_failure("initial load", &e);
                self.abandon(&guard);
                Err(e)
            }
            Guarded::Stale(Err(e)) => {
                self.report_failure("initial load", &e);
                Err(e)
            }
            Guarded::Stale(Ok(_)) | Guarded::Cancelled => {
                debug!(game_id, "initial load superseded");
                Ok(Outcome::Discarded)
            }
        }
    }

    /// Re-fetch the refreshable state of the active game.
    ///
    /// A game that is still loading is not refreshed; its initial snapshot
    /// is already fresh.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoGameLoaded`] without an active game, otherwise as
    /// [`request_initial_load`](Self::request_initial_load).
    pub async fn request_refresh(&self) -> Result<Outcome> {
        let guard = self.active_guard().ok_or(ClientError::NoGameLoaded)?;
        if !guard.is_loaded() {
            debug!(game_id = guard.game_id(), "refresh skipped: still loading");
            return Ok(Outcome::Discarded);
        }
        let token = self.access_token()?;
        let generation = guard.token();
        let game_id = guard.game_id();

        let api = Arc::clone(&self.inner.api);
        let fetched = guard
            .spawn_validated(async move { api.refresh_game(&token, game_id).await })
            .await;

        match fetched {
            Guarded::Current(Ok(payload)) => self.apply_refresh(&guard, generation, payload),
            Guarded::Current(Err(e)) | Guarded::Stale(Err(e)) => {
                self.report_failure("refresh", &e);
                Err(e)
            }
            Guarded::Stale(Ok(_)) | Guarded::Cancelled => {
                debug!(game_id, "refresh superseded");
                Ok(Outcome::Discarded)
            }
        }
    }

    /// Fetch a fresh full snapshot of the game `guard` already holds.
    ///
    /// Unlike a load, the guard stays live: its in-flight requests keep
    /// running and the cache keeps the old state until the new one lands.
    /// A failed reload is reported but leaves the game loaded.
    async fn reload(&self, guard: &SessionGuard) -> Result<Outcome> {
        let game_id = guard.game_id();
        if !guard.is_loaded() {
            debug!(game_id, "reload skipped: initial load still pending");
            return Ok(Outcome::Discarded);
        }
        let token = self.access_token()?;
        let generation = guard.token();

        let api = Arc::clone(&self.inner.api);
        let fetched = guard
            .spawn_validated(async move { api.load_game(&token, game_id).await })
            .await;

        let payload = match fetched {
            Guarded::Current(Ok(payload)) => payload,
            Guarded::Current(Err(e)) | Guarded::Stale(Err(e)) => {
                self.report_failure("reload", &e);
                return Err(e);
            }
            Guarded::Stale(Ok(_)) | Guarded::Cancelled => {
                debug!(game_id, "reload superseded");
                return Ok(Outcome::Discarded);
            }
        };
        if payload.game_id != game_id {
            let err = ClientError::Consistency(format!(
                "received state for game {} while reloading game {game_id}",
                payload.game_id
            ));
            self.report_failure("reload", &err);
            return Err(err);
        }

        let cache = &self.inner.cache;
        match guard.run_if_current(generation, || cache.apply_initial(payload)) {
            None => {
                debug!(game_id, "reload arrived for a disposed guard");
                Ok(Outcome::Discarded)
            }
            Some(Err(e)) => {
                self.report_failure("reload", &e);
                Err(e)
            }
            Some(Ok(())) => {
                info!(game_id, "game reloaded");
                self.inner.ui.emit(UiEvent::GameLoaded { game_id });
                Ok(Outcome::Applied)
            }
        }
    }

    fn begin_load(&self, game_id: GameId) -> SessionGuard {
        let guard = SessionGuard::new(game_id);
        let previous = lock(&self.inner.guard).replace(guard.clone());
        if let Some(previous) = previous {
            debug!(
                previous = previous.game_id(),
                next = game_id,
                "replacing active game"
            );
            previous.dispose();
        }
        self.inner.cache.clear();
        guard
    }

    /// Apply a full snapshot under `guard`, then release its backlog.
    fn complete_initial_load(
        &self,
        guard: &SessionGuard,
        generation: GenerationToken,
        payload: InitialPayload,
    ) -> Result<Outcome> {
        let game_id = guard.game_id();
        if payload.game_id != game_id {
            let err = ClientError::Consistency(format!(
                "received state for game {} while loading game {game_id}",
                payload.game_id
            ));
            self.report_failure("initial load", &err);
            self.abandon_if_loading(guard);
            return Err(err);
        }

        let cache = &self.inner.cache;
        match guard.run_if_current(generation, || cache.apply_initial(payload)) {
            None => {
                debug!(game_id, "initial state arrived for a disposed guard");
                return Ok(Outcome::Discarded);
            }
            Some(Err(e)) => {
                self.report_failure("initial load", &e);
                self.abandon_if_loading(guard);
                return Err(e);
            }
            Some(Ok(())) => {}
        }

        let Some(backlog) = guard.mark_loaded(generation) else {
            debug!(game_id, "guard disposed right after apply");
            return Ok(Outcome::Discarded);
        };

        info!(
            game_id,
            queued_in = backlog.inbound.len(),
            queued_out = backlog.outbound.len(),
            "game loaded"
        );
        if backlog.first_load {
            self.inner.ui.show_screen(Screen::Game);
            self.inner.ui.emit(UiEvent::GameLoaded { game_id });
            self.send_join(game_id);
        }
        for event in backlog.outbound {
            if backlog.first_load && matches!(event, ClientEvent::JoinGame { .. }) {
                continue;
            }
            if let Err(e) = self.send_event(&event) {
                debug!(event = event.name(), "queued message not sent: {e}");
            }
        }
        for event in backlog.inbound {
            self.process(guard, event);
        }
        Ok(Outcome::Applied)
    }

    fn apply_refresh(
        &self,
        guard: &SessionGuard,
        generation: GenerationToken,
        payload: RefreshPayload,
    ) -> Result<Outcome> {
        let game_id = payload.game_id;
        let cache = &self.inner.cache;
        let applied = guard.run_if_current(generation, || {
            cache
                .apply_refresh(payload)
                .map(|()| cache.turn().map_or(0, |t| t.number))
        });

        match applied {
            None => {
                debug!(game_id, "refresh arrived for a disposed guard");
                Ok(Outcome::Discarded)
            }
            Some(Ok(turn)) => {
                self.inner.ui.emit(UiEvent::GameRefreshed { game_id, turn });
                Ok(Outcome::Applied)
            }
            Some(Err(e)) => {
                self.report_failure("refresh", &e);
                Err(e)
            }
        }
    }

    // ── Inbound routing ─────────────────────────────────────────────

    fn handle_envelope(&self, envelope: &Envelope) {
        match ServerEvent::from_envelope(envelope) {
            Ok(event) => self.route(event),
            // A snapshot the cache cannot even parse leaves it out of step.
            Err(e) if matches!(envelope.event.as_str(), events::GAME_STATE | events::GAME_UPDATE) => {
                error!(event = %envelope.event, "undecodable game payload: {e}");
                self.inner.ui.report(&ClientError::MalformedPayload(format!(
                    "{}: {e}",
                    envelope.event
                )));
            }
            Err(e) => warn!(event = %envelope.event, "undecodable server event: {e}"),
        }
    }

    /// Filter an inbound event through the active guard.
    fn route(&self, event: ServerEvent) {
        let Some(event_game) = event.game_id() else {
            self.process_global(event);
            return;
        };
        let Some(guard) = self.active_guard() else {
            debug!(game_id = event_game, "no active game; discarding event");
            return;
        };
        if event_game != guard.game_id() {
            debug!(
                game_id = event_game,
                active = guard.game_id(),
                "discarding event for another game"
            );
            return;
        }

        // A full snapshot is the load itself, so it never waits for one.
        if let ServerEvent::GameState(payload) = event {
            let _ = self.complete_initial_load(&guard, guard.token(), *payload);
            return;
        }

        match guard.admit_inbound(event) {
            InboundDisposition::Process(event) => self.process(&guard, event),
            InboundDisposition::Queued => debug!(game_id = event_game, "event queued while loading"),
            InboundDisposition::Discarded => debug!(game_id = event_game, "event for disposed guard"),
        }
    }

    fn process(&self, guard: &SessionGuard, event: ServerEvent) {
        match event {
            ServerEvent::GameState(payload) => {
                let _ = self.complete_initial_load(guard, guard.token(), *payload);
            }
            ServerEvent::GameUpdate(payload) => {
                let _ = self.apply_refresh(guard, guard.token(), *payload);
            }
            ServerEvent::TurnComplete { game_id, turn } => {
                info!(game_id, ?turn, "turn complete");
                self.inner.ui.info(match turn {
                    Some(n) => format!("Turn {n} complete"),
                    None => "Turn complete".to_string(),
                });
                self.spawn_refresh();
            }
            ServerEvent::PlayerJoined { game_id, player_id } => {
                info!(game_id, player_id, "player joined");
                self.spawn_reload(guard);
            }
            ServerEvent::GameStarted { game_id } => {
                info!(game_id, "game started");
                self.inner.ui.info("The game has started");
                self.spawn_reload(guard);
            }
            ServerEvent::Error { .. } | ServerEvent::Other { .. } => self.process_global(event),
        }
    }

    fn process_global(&self, event: ServerEvent) {
        match event {
            ServerEvent::Error { message, code } => {
                warn!(%message, ?code, "server error");
                self.inner.ui.report(&ClientError::request(message, code));
            }
            ServerEvent::Other { name } => debug!(event = %name, "ignoring unhandled server event"),
            ServerEvent::GameState(_)
            | ServerEvent::GameUpdate(_)
            | ServerEvent::TurnComplete { .. }
            | ServerEvent::PlayerJoined { .. }
            | ServerEvent::GameStarted { .. } => {
                debug!("game-scoped event without an active game");
            }
        }
    }

    fn handle_connection_change(&self, change: &ConnectionChange) {
        if change.state != ConnectionState::Connected {
            return;
        }
        let Some(guard) = self.active_guard().filter(SessionGuard::is_loaded) else {
            return;
        };
        debug!(game_id = guard.game_id(), "reconnected; resyncing game");
        self.send_join(guard.game_id());
        self.spawn_refresh();
    }

    fn spawn_refresh(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            let _ = this.request_refresh().await;
        });
    }

    fn spawn_reload(&self, guard: &SessionGuard) {
        let this = self.clone();
        let guard = guard.clone();
        tokio::spawn(async move {
            let _ = this.reload(&guard).await;
        });
    }

    // ── Actions ─────────────────────────────────────────────────────

    /// Run a user action.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoGameLoaded`] for game-scoped actions without an
    /// active game, [`ClientError::NotAuthenticated`] without credentials,
    /// and request failures (also reported on the UI status channel).
    pub async fn dispatch(&self, action: GameAction) -> Result<Outcome> {
        debug!(action = action.name(), mode = ?action.mode(), "dispatching action");
        match action {
            GameAction::JoinGame => self.join_current(),
            GameAction::CreateGame(game) => self.create_game(game).await,
            GameAction::AddPlayer(player) => {
                self.run_setup("add_player", FollowUp::Reload, move |api, token, game_id| async move {
                    api.add_player(&token, game_id, &player).await.map(drop)
                })
                .await
            }
            GameAction::GenerateMap(settings) => {
                self.run_setup("generate_map", FollowUp::Reload, move |api, token, game_id| async move {
                    api.generate_map(&token, game_id, &settings).await
                })
                .await
            }
            GameAction::PlacePlayers => {
                self.run_setup("place_players", FollowUp::Reload, |api, token, game_id| async move {
                    api.place_players(&token, game_id).await
                })
                .await
            }
            GameAction::StartGame => {
                self.run_setup("start_game", FollowUp::Reload, |api, token, game_id| async move {
                    api.start_game(&token, game_id).await
                })
                .await
            }
            GameAction::SubmitOrders(orders) => {
                self.run_setup("submit_orders", FollowUp::Refresh, move |api, token, game_id| async move {
                    api.submit_orders(&token, game_id, &orders).await
                })
                .await
            }
        }
    }

    fn join_current(&self) -> Result<Outcome> {
        let guard = self.active_guard().ok_or(ClientError::NoGameLoaded)?;
        let event = ClientEvent::JoinGame {
            game_id: guard.game_id(),
            player_id: self.inner.cache.your_player_id(),
        };
        match guard.submit_outbound(event) {
            OutboundDisposition::Send(event) => {
                self.send_event(&event)?;
                Ok(Outcome::Applied)
            }
            OutboundDisposition::Queued => Ok(Outcome::Queued),
            OutboundDisposition::Discarded => Ok(Outcome::Discarded),
        }
    }

    async fn create_game(&self, game: NewGame) -> Result<Outcome> {
        let token = self.access_token()?;
        let api = Arc::clone(&self.inner.api);
        let created = self
            .inner
            .session
            .run_validated(async move { api.create_game(&token, &game).await })
            .await;

        match created {
            Guarded::Current(Ok(game_id)) => {
                info!(game_id, "game created");
                self.inner.ui.emit(UiEvent::GameCreated { game_id });
                self.request_initial_load(game_id).await
            }
            Guarded::Current(Err(e)) | Guarded::Stale(Err(e)) => {
                self.report_failure("create_game", &e);
                Err(e)
            }
            Guarded::Stale(Ok(_)) | Guarded::Cancelled => {
                debug!("create_game finished after logout");
                Ok(Outcome::Discarded)
            }
        }
    }

    /// Run a game-scoped request under the active guard, then reload or
    /// refresh if it is still current.
    async fn run_setup<F, Fut>(
        &self,
        action: &'static str,
        follow_up: FollowUp,
        call: F,
    ) -> Result<Outcome>
    where
        F: FnOnce(Arc<dyn GameApi>, String, GameId) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let guard = self.active_guard().ok_or(ClientError::NoGameLoaded)?;
        let token = self.access_token()?;
        let game_id = guard.game_id();

        let result = guard
            .spawn_validated(call(Arc::clone(&self.inner.api), token, game_id))
            .await;

        match result {
            Guarded::Current(Ok(())) => {
                debug!(action, game_id, "action succeeded");
                match follow_up {
                    FollowUp::Reload => self.reload(&guard).await,
                    FollowUp::Refresh => self.request_refresh().await,
                }
            }
            Guarded::Current(Err(e)) | Guarded::Stale(Err(e)) => {
                self.report_failure(action, &e);
                Err(e)
            }
            Guarded::Stale(Ok(_)) | Guarded::Cancelled => {
                debug!(action, game_id, "action superseded");
                Ok(Outcome::Discarded)
            }
        }
    }

    // ── Teardown ────────────────────────────────────────────────────

    /// Leave the active game and return to the lobby.
    pub fn leave_game(&self) {
        let guard = lock(&self.inner.guard).take();
        if let Some(guard) = guard {
            guard.dispose();
            let leave = ClientEvent::LeaveGame {
                game_id: guard.game_id(),
            };
            if let Err(e) = self.send_event(&leave) {
                debug!(game_id = guard.game_id(), "game:leave not sent: {e}");
            }
            info!(game_id = guard.game_id(), "left game");
        }
        self.inner.cache.clear();
        self.inner.ui.show_screen(Screen::Lobby);
    }

    /// Drop all session state: the active game, in-flight actions and
    /// transport listeners. Used on logout.
    pub fn reset(&self) {
        let guard = lock(&self.inner.guard).take();
        if let Some(guard) = guard {
            guard.dispose();
        }
        self.inner.session.advance();
        self.inner.cache.clear();
        lock(&self.inner.subscriptions).clear();
        debug!("game controller reset");
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn access_token(&self) -> Result<String> {
        self.inner.tokens.access_token().ok_or_else(|| {
            let err = ClientError::NotAuthenticated;
            self.inner.ui.report(&err);
            err
        })
    }

    fn send_join(&self, game_id: GameId) {
        let join = ClientEvent::JoinGame {
            game_id,
            player_id: self.inner.cache.your_player_id(),
        };
        if let Err(e) = self.send_event(&join) {
            debug!(game_id, "game:join not sent: {e}");
        }
    }

    fn send_event(&self, event: &ClientEvent) -> Result<()> {
        self.inner.transport.send(event.name(), event.payload()?)
    }

    fn report_failure(&self, operation: &'static str, err: &ClientError) {
        if err.is_consistency() {
            error!(operation, "inconsistent game data: {err}");
        } else {
            warn!(operation, "request failed: {err}");
        }
        self.inner.ui.report(err);
    }

    /// Drop `guard` if it is still the active one.
    fn abandon(&self, guard: &SessionGuard) {
        let mut slot = lock(&self.inner.guard);
        if slot.as_ref().is_some_and(|active| active.ptr_eq(guard)) {
            slot.take();
        }
        drop(slot);
        guard.dispose();
    }

    fn abandon_if_loading(&self, guard: &SessionGuard) {
        if guard.is_valid() && !guard.is_loaded() {
            self.abandon(guard);
        }
    }
}

impl std::fmt::Debug for GameController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameController")
            .field("guard", &self.active_guard())
            .field("loaded", &self.inner.cache.is_loaded())
            .finish()
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
    fn action_modes() {
        assert_eq!(GameAction::JoinGame.mode(), DispatchMode::Sync);
        assert_eq!(GameAction::StartGame.mode(), DispatchMode::Async);
        assert_eq!(
            GameAction::SubmitOrders(vec![]).mode(),
            DispatchMode::Async
        );
        assert_eq!(GameAction::PlacePlayers.name(), "place_players");
    }
}
