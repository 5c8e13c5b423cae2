//! Generation-token guards for "one loaded game at a time".
//!
//! Asynchronous work cannot be cancelled reliably once it is on the wire, so
//! instead every piece of work captures a [`GenerationToken`] when it starts
//! and compares it with the current one when it finishes. Disposing a guard
//! regenerates its token, which turns every result captured under the old
//! token into a [`Guarded::Stale`] no-op.
//!
//! ```text
//!   token() ──────── work in flight ──────── is_current(token)?
//!      │                                        │
//!      │            dispose() ─ new token        ├─ yes → apply
//!      ▼                                        └─ no  → discard silently
//! ```
//!
//! [`CancellationEpoch`] is the reusable token holder; [`SessionGuard`] adds
//! the per-game lifecycle, load phase, message queues and abort handles.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task::AbortHandle;
use tracing::debug;
use uuid::Uuid;

use crate::protocol::{ClientEvent, GameId, ServerEvent};
use crate::sync::lock;

// ── Tokens ──────────────────────────────────────────────────────────

/// Opaque generation marker. A fresh random value is drawn on every
/// regeneration, so a token captured before a regeneration never compares
/// equal to one drawn after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationToken(Uuid);

impl GenerationToken {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Result of work validated against a generation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    /// The token was still current when the work finished.
    Current(T),
    /// The work finished, but its generation has been superseded.
    Stale(T),
    /// The work was aborted before producing a value.
    Cancelled,
}

impl<T> Guarded<T> {
    /// The value, only if it is still current.
    pub fn current(self) -> Option<T> {
        match self {
            Self::Current(value) => Some(value),
            Self::Stale(_) | Self::Cancelled => None,
        }
    }

    pub fn is_current(&self) -> bool {
        matches!(self, Self::Current(_))
    }
}

/// A regenerable [`GenerationToken`].
#[derive(Debug)]
pub struct CancellationEpoch {
    current: Mutex<GenerationToken>,
}

impl Default for CancellationEpoch {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationEpoch {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(GenerationToken::fresh()),
        }
    }

    /// Capture the current token.
    pub fn token(&self) -> GenerationToken {
        *lock(&self.current)
    }

    pub fn is_current(&self, token: GenerationToken) -> bool {
        *lock(&self.current) == token
    }

    /// Invalidate every previously captured token.
    pub fn advance(&self) -> GenerationToken {
        let next = GenerationToken::fresh();
        *lock(&self.current) = next;
        next
    }

    /// Capture the token, run `work`, and classify the output by whether the
    /// token is still current afterwards.
    pub async fn run_validated<F: Future>(&self, work: F) -> Guarded<F::Output> {
        let token = self.token();
        let output = work.await;
        if self.is_current(token) {
            Guarded::Current(output)
        } else {
            Guarded::Stale(output)
        }
    }
}

// ── Session guard ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Disposed,
}

/// Progress of an active guard's game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Initial data requested but not yet applied.
    Loading,
    /// Initial data applied; refreshes and outbound messages flow directly.
    Loaded,
}

/// What to do with an outbound message submitted to a guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundDisposition {
    /// The game is loaded; send now.
    Send(ClientEvent),
    /// The game is still loading; held until it is loaded.
    Queued,
    /// The guard is disposed; dropped.
    Discarded,
}

/// What to do with an inbound event offered to a guard.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundDisposition {
    /// The game is loaded; process now.
    Process(ServerEvent),
    /// The game is still loading; held until it is loaded.
    Queued,
    /// The guard is disposed; dropped.
    Discarded,
}

/// Messages held while loading, released by [`SessionGuard::mark_loaded`].
#[derive(Debug, Default)]
pub struct Backlog {
    pub inbound: Vec<ServerEvent>,
    pub outbound: Vec<ClientEvent>,
    /// `true` only for the call that moved the guard from loading to loaded.
    pub first_load: bool,
}

#[derive(Debug)]
struct GuardState {
    lifecycle: Lifecycle,
    phase: LoadPhase,
    inbound: VecDeque<ServerEvent>,
    outbound: VecDeque<ClientEvent>,
    in_flight: Vec<AbortHandle>,
}

struct GuardInner {
    game_id: GameId,
    epoch: CancellationEpoch,
    state: Mutex<GuardState>,
}

/// Validity object for one loaded game.
///
/// Cloning shares the same guard. Once [`dispose`](Self::dispose)d it never
/// becomes valid again; the controller creates a new guard for the next load.
#[derive(Clone)]
pub struct SessionGuard {
    inner: Arc<GuardInner>,
}

impl SessionGuard {
    /// Create an active guard in the loading phase.
    pub fn new(game_id: GameId) -> Self {
        debug!(game_id, "session guard created");
        Self {
            inner: Arc::new(GuardInner {
                game_id,
                epoch: CancellationEpoch::new(),
                state: Mutex::new(GuardState {
                    lifecycle: Lifecycle::Active,
                    phase: LoadPhase::Loading,
                    inbound: VecDeque::new(),
                    outbound: VecDeque::new(),
                    in_flight: Vec::new(),
                }),
            }),
        }
    }

    pub fn game_id(&self) -> GameId {
        self.inner.game_id
    }

    /// Returns `true` if both handles refer to the same guard.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Capture the current generation token.
    pub fn token(&self) -> GenerationToken {
        self.inner.epoch.token()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        lock(&self.inner.state).lifecycle
    }

    pub fn phase(&self) -> LoadPhase {
        lock(&self.inner.state).phase
    }

    /// Returns `true` until the guard is disposed.
    pub fn is_valid(&self) -> bool {
        self.lifecycle() == Lifecycle::Active
    }

    /// Returns `true` if the guard is active and the initial data is applied.
    pub fn is_loaded(&self) -> bool {
        let state = lock(&self.inner.state);
        state.lifecycle == Lifecycle::Active && state.phase == LoadPhase::Loaded
    }

    /// Returns `true` if the guard is active and `token` is its current token.
    pub fn is_current(&self, token: GenerationToken) -> bool {
        let state = lock(&self.inner.state);
        state.lifecycle == Lifecycle::Active && self.inner.epoch.is_current(token)
    }

    /// Run `f` only if the guard is still valid.
    ///
    /// `f` runs inside the guard's critical section, so a concurrent
    /// [`dispose`](Self::dispose) either completes before the check or waits
    /// for `f` to finish. `f` must not call back into this guard.
    pub fn run_if_valid<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let state = lock(&self.inner.state);
        (state.lifecycle == Lifecycle::Active).then(f)
    }

    /// Like [`run_if_valid`](Self::run_if_valid), but also requires `token`
    /// to be the current token.
    pub fn run_if_current<R>(&self, token: GenerationToken, f: impl FnOnce() -> R) -> Option<R> {
        let state = lock(&self.inner.state);
        (state.lifecycle == Lifecycle::Active && self.inner.epoch.is_current(token)).then(f)
    }

    /// Await `work` and validate its output against the token captured
    /// before it started. The work itself is not abortable.
    pub async fn run_validated<F: Future>(&self, work: F) -> Guarded<F::Output> {
        let token = self.token();
        let output = work.await;
        if self.is_current(token) {
            Guarded::Current(output)
        } else {
            Guarded::Stale(output)
        }
    }

    /// Spawn `work` as an abortable task owned by this guard and validate its
    /// output when it finishes.
    ///
    /// Disposing the guard aborts the task, which yields
    /// [`Guarded::Cancelled`]. Must be called from within a tokio runtime.
    pub async fn spawn_validated<F>(&self, work: F) -> Guarded<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let token = self.token();
        let handle = tokio::spawn(work);
        {
            let mut state = lock(&self.inner.state);
            if state.lifecycle == Lifecycle::Disposed {
                handle.abort();
            } else {
                state.in_flight.retain(|h| !h.is_finished());
                state.in_flight.push(handle.abort_handle());
            }
        }

        match handle.await {
            Ok(output) if self.is_current(token) => Guarded::Current(output),
            Ok(output) => Guarded::Stale(output),
            Err(join_err) if join_err.is_cancelled() => Guarded::Cancelled,
            Err(join_err) => std::panic::resume_unwind(join_err.into_panic()),
        }
    }

    /// Offer an inbound event.
    pub fn admit_inbound(&self, event: ServerEvent) -> InboundDisposition {
        let mut state = lock(&self.inner.state);
        match (state.lifecycle, state.phase) {
            (Lifecycle::Disposed, _) => InboundDisposition::Discarded,
            (Lifecycle::Active, LoadPhase::Loading) => {
                state.inbound.push_back(event);
                InboundDisposition::Queued
            }
            (Lifecycle::Active, LoadPhase::Loaded) => InboundDisposition::Process(event),
        }
    }

    /// Submit an outbound message.
    pub fn submit_outbound(&self, event: ClientEvent) -> OutboundDisposition {
        let mut state = lock(&self.inner.state);
        match (state.lifecycle, state.phase) {
            (Lifecycle::Disposed, _) => OutboundDisposition::Discarded,
            (Lifecycle::Active, LoadPhase::Loading) => {
                state.outbound.push_back(event);
                OutboundDisposition::Queued
            }
            (Lifecycle::Active, LoadPhase::Loaded) => OutboundDisposition::Send(event),
        }
    }

    /// Move to [`LoadPhase::Loaded`] if `token` is still current, releasing
    /// everything queued while loading.
    ///
    /// Returns `None` if the guard was disposed or the token superseded.
    pub fn mark_loaded(&self, token: GenerationToken) -> Option<Backlog> {
        let mut state = lock(&self.inner.state);
        if state.lifecycle != Lifecycle::Active || !self.inner.epoch.is_current(token) {
            return None;
        }
        let first_load = state.phase == LoadPhase::Loading;
        state.phase = LoadPhase::Loaded;
        Some(Backlog {
            inbound: state.inbound.drain(..).collect(),
            outbound: state.outbound.drain(..).collect(),
            first_load,
        })
    }

    /// Number of `(inbound, outbound)` messages held while loading.
    pub fn queued(&self) -> (usize, usize) {
        let state = lock(&self.inner.state);
        (state.inbound.len(), state.outbound.len())
    }

    /// Invalidate the guard: regenerate the token, drop queued messages and
    /// abort in-flight tasks.
    ///
    /// Idempotent; returns `false` if the guard was already disposed.
    pub fn dispose(&self) -> bool {
        let in_flight = {
            let mut state = lock(&self.inner.state);
            if state.lifecycle == Lifecycle::Disposed {
                return false;
            }
            state.lifecycle = Lifecycle::Disposed;
            self.inner.epoch.advance();
            state.inbound.clear();
            state.outbound.clear();
            std::mem::take(&mut state.in_flight)
        };

        let aborted = in_flight.iter().filter(|h| !h.is_finished()).count();
        for handle in in_flight {
            handle.abort();
        }
        debug!(game_id = self.inner.game_id, aborted, "session guard disposed");
        true
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("SessionGuard")
            .field("game_id", &self.inner.game_id)
            .field("lifecycle", &state.lifecycle)
            .field("phase", &state.phase)
            .field("inbound", &state.inbound.len())
            .field("outbound", &state.outbound.len())
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
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::oneshot;

    fn turn_complete(game_id: GameId) -> ServerEvent {
        ServerEvent::TurnComplete {
            game_id,
            turn: Some(1),
        }
    }

    #[test]
    fn dispose_regenerates_token() {
        let guard = SessionGuard::new(1);
        let before = guard.token();
        assert!(guard.is_current(before));

        assert!(guard.dispose());
        assert!(!guard.is_current(before));
        assert_ne!(guard.token(), before);
        assert_eq!(guard.lifecycle(), Lifecycle::Disposed);
    }

    #[test]
    fn dispose_is_idempotent() {
        let guard = SessionGuard::new(1);
        assert!(guard.dispose());
        assert!(!guard.dispose());
    }

    #[test]
    fn run_if_valid_skips_after_dispose() {
        let guard = SessionGuard::new(1);
        assert_eq!(guard.run_if_valid(|| 5), Some(5));
        guard.dispose();
        assert_eq!(guard.run_if_valid(|| 5), None);
    }

    #[test]
    fn run_if_current_rejects_old_token() {
        let guard = SessionGuard::new(1);
        let token = guard.token();
        guard.dispose();
        assert_eq!(guard.run_if_current(token, || ()), None);
        // Even the post-dispose token is rejected: the guard stays dead.
        assert_eq!(guard.run_if_current(guard.token(), || ()), None);
    }

    #[test]
    fn run_validated_reports_stale_after_dispose() {
        let guard = SessionGuard::new(1);
        let (tx, rx) = oneshot::channel::<u32>();

        let mut waiting = tokio_test::task::spawn(guard.run_validated(async { rx.await.unwrap() }));
        tokio_test::assert_pending!(waiting.poll());

        guard.dispose();
        tx.send(42).unwrap();
        assert!(waiting.is_woken());
        assert_eq!(tokio_test::assert_ready!(waiting.poll()), Guarded::Stale(42));
    }

    #[tokio::test]
    async fn run_validated_current_without_dispose() {
        let guard = SessionGuard::new(1);
        let result = guard.run_validated(async { "ok" }).await;
        assert!(result.is_current());
        assert_eq!(result.current(), Some("ok"));
    }

    #[tokio::test]
    async fn spawn_validated_is_aborted_by_dispose() {
        let guard = SessionGuard::new(9);
        let finished = Arc::new(AtomicBool::new(false));
        let (_tx, rx) = oneshot::channel::<()>();

        let waiting = {
            let guard = guard.clone();
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                guard
                    .spawn_validated(async move {
                        let _ = rx.await;
                        finished.store(true, Ordering::SeqCst);
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        guard.dispose();
        assert_eq!(waiting.await.unwrap(), Guarded::Cancelled);
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn spawn_validated_on_disposed_guard_is_cancelled() {
        let guard = SessionGuard::new(3);
        guard.dispose();
        let result = guard
            .spawn_validated(async {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            })
            .await;
        assert_eq!(result, Guarded::Cancelled);
    }

    #[test]
    fn loading_guard_queues_until_loaded() {
        let guard = SessionGuard::new(4);
        assert_eq!(
            guard.admit_inbound(turn_complete(4)),
            InboundDisposition::Queued
        );
        assert_eq!(
            guard.submit_outbound(ClientEvent::LeaveGame { game_id: 4 }),
            OutboundDisposition::Queued
        );
        assert_eq!(guard.queued(), (1, 1));

        let backlog = guard.mark_loaded(guard.token()).unwrap();
        assert!(backlog.first_load);
        assert_eq!(backlog.inbound, vec![turn_complete(4)]);
        assert_eq!(backlog.outbound, vec![ClientEvent::LeaveGame { game_id: 4 }]);
        assert_eq!(guard.queued(), (0, 0));
        assert!(guard.is_loaded());

        assert_eq!(
            guard.admit_inbound(turn_complete(4)),
            InboundDisposition::Process(turn_complete(4))
        );
        let again = guard.mark_loaded(guard.token()).unwrap();
        assert!(!again.first_load);
    }

    #[test]
    fn dispose_drops_queues_and_rejects_messages() {
        let guard = SessionGuard::new(4);
        guard.admit_inbound(turn_complete(4));
        guard.submit_outbound(ClientEvent::LeaveGame { game_id: 4 });
        let token = guard.token();

        guard.dispose();
        assert_eq!(guard.queued(), (0, 0));
        assert!(guard.mark_loaded(token).is_none());
        assert_eq!(
            guard.admit_inbound(turn_complete(4)),
            InboundDisposition::Discarded
        );
        assert_eq!(
            guard.submit_outbound(ClientEvent::LeaveGame { game_id: 4 }),
            OutboundDisposition::Discarded
        );
    }

    #[tokio::test]
    async fn epoch_run_validated() {
        let epoch = CancellationEpoch::new();
        assert!(epoch.run_validated(async { 1 }).await.is_current());

        let token = epoch.token();
        epoch.advance();
        assert!(!epoch.is_current(token));
    }
}
