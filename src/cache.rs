//! Client-side store for the currently loaded game.
//!
//! The cache splits a game into two groups of fields:
//!
//! - **immutable per load**: id, metadata, topology, roster. Replaced only
//!   as a whole by [`GameStateCache::apply_initial`].
//! - **refreshable**: turn, location states, units, orders, events. Replaced
//!   by [`GameStateCache::apply_refresh`] without touching the first group.
//!
//! Both operations build the new state off to the side, recompute the
//! per-location overlay, and swap it in under the write lock only if every
//! step succeeded. Readers therefore never observe a half-applied payload.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::{ClientError, Result};
use crate::protocol::{
    Economy, GameEvent, GameId, GameMetadata, InitialPayload, Location, LocationId, LocationState,
    Order, Player, PlayerId, RefreshPayload, TurnInfo, Unit, UnitId,
};
use crate::sync::{read, write};

/// A topology location together with its derived overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapLocation {
    pub location: Location,
    /// Owning player; `None` if unowned or the owner is not in the roster.
    pub owner: Option<PlayerId>,
    /// The owner's display color.
    pub color: Option<String>,
    pub economy: Economy,
    /// Units currently at this location, in payload order.
    pub units: Vec<UnitId>,
}

impl MapLocation {
    fn new(location: Location) -> Self {
        Self {
            location,
            owner: None,
            color: None,
            economy: Economy::default(),
            units: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.owner = None;
        self.color = None;
        self.economy = Economy::default();
        self.units.clear();
    }
}

/// A consistent copy of everything the cache holds for one game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub metadata: GameMetadata,
    pub players: Vec<Player>,
    pub your_player_id: Option<PlayerId>,
    /// Topology with overlay, in payload order.
    pub locations: Vec<MapLocation>,
    pub turn: TurnInfo,
    pub location_states: Vec<LocationState>,
    pub units: Vec<Unit>,
    pub orders: Vec<Order>,
    pub events: Vec<GameEvent>,
}

#[derive(Debug, Clone)]
struct LoadedGame {
    snapshot: GameSnapshot,
    location_index: HashMap<LocationId, usize>,
    player_index: HashMap<PlayerId, usize>,
}

impl LoadedGame {
    fn build(payload: InitialPayload) -> Result<Self> {
        if !payload.success {
            return Err(ClientError::MalformedPayload(
                payload
                    .error
                    .unwrap_or_else(|| "initial payload reported failure".into()),
            ));
        }
        if payload.locations.is_empty() {
            return Err(ClientError::MalformedPayload(
                "initial payload has an empty topology".into(),
            ));
        }

        let mut location_index = HashMap::with_capacity(payload.locations.len());
        for (i, location) in payload.locations.iter().enumerate() {
            if location_index.insert(location.id, i).is_some() {
                return Err(ClientError::Consistency(format!(
                    "duplicate location id {}",
                    location.id
                )));
            }
        }
        let player_index = payload
            .players
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i))
            .collect();

        let mut game = Self {
            snapshot: GameSnapshot {
                game_id: payload.game_id,
                metadata: payload.game,
                players: payload.players,
                your_player_id: payload.your_player_id,
                locations: payload.locations.into_iter().map(MapLocation::new).collect(),
                turn: payload.turn,
                location_states: payload.location_states,
                units: payload.units,
                orders: payload.orders,
                events: payload.events,
            },
            location_index,
            player_index,
        };
        game.recompute_overlay()?;
        Ok(game)
    }

    /// Rebuild every location's owner, color, economy and unit list from the
    /// refreshable fields.
    fn recompute_overlay(&mut self) -> Result<()> {
        let Self {
            snapshot,
            location_index,
            player_index,
        } = self;

        for slot in &mut snapshot.locations {
            slot.reset();
        }

        for state in &snapshot.location_states {
            let slot = location_index
                .get(&state.location_id)
                .and_then(|&i| snapshot.locations.get_mut(i))
                .ok_or_else(|| {
                    ClientError::Consistency(format!(
                        "location state references unknown location {}",
                        state.location_id
                    ))
                })?;

            let owner = state
                .owner_id
                .and_then(|id| player_index.get(&id))
                .and_then(|&i| snapshot.players.get(i));
            slot.owner = owner.map(|p| p.id);
            slot.color = owner.map(|p| p.color.clone());
            slot.economy = state.economy;
        }

        for unit in &snapshot.units {
            let slot = location_index
                .get(&unit.location_id)
                .and_then(|&i| snapshot.locations.get_mut(i))
                .ok_or_else(|| {
                    ClientError::Consistency(format!(
                        "unit {} references unknown location {}",
                        unit.id, unit.location_id
                    ))
                })?;
            slot.units.push(unit.id);
        }

        Ok(())
    }
}

/// The shared game state store.
///
/// One instance is created by the client and shared as
/// `Arc<GameStateCache>`. Only the game controller writes to it; everything
/// else reads through the getters, which return copies.
#[derive(Debug, Default)]
pub struct GameStateCache {
    game: RwLock<Option<LoadedGame>>,
}

impl GameStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole game with a full snapshot.
    ///
    /// # Errors
    ///
    /// - [`ClientError::MalformedPayload`] if `success` is `false` or the
    ///   topology is empty.
    /// - [`ClientError::Consistency`] if the overlay cannot be computed.
    ///
    /// On error the cache is left exactly as it was.
    pub fn apply_initial(&self, payload: InitialPayload) -> Result<()> {
        let game = LoadedGame::build(payload)?;
        debug!(
            game_id = game.snapshot.game_id,
            locations = game.snapshot.locations.len(),
            players = game.snapshot.players.len(),
            "initial game state applied"
        );
        *write(&self.game) = Some(game);
        Ok(())
    }

    /// Replace the refreshable fields and recompute the overlay.
    ///
    /// # Errors
    ///
    /// - [`ClientError::MalformedPayload`] if any refreshable field is missing.
    /// - [`ClientError::NoGameLoaded`] if no game is loaded.
    /// - [`ClientError::Consistency`] if the payload is for another game or
    ///   references an unknown location.
    ///
    /// On error the cache is left exactly as it was.
    pub fn apply_refresh(&self, payload: RefreshPayload) -> Result<()> {
        let data = payload.validate()?;

        let mut slot = write(&self.game);
        let current = slot.as_ref().ok_or(ClientError::NoGameLoaded)?;
        if current.snapshot.game_id != data.game_id {
            return Err(ClientError::Consistency(format!(
                "refresh for game {} while game {} is loaded",
                data.game_id, current.snapshot.game_id
            )));
        }

        let mut next = current.clone();
        next.snapshot.turn = data.turn;
        next.snapshot.location_states = data.location_states;
        next.snapshot.units = data.units;
        next.snapshot.orders = data.orders;
        next.snapshot.events = data.events;
        next.recompute_overlay()?;

        debug!(
            game_id = data.game_id,
            turn = next.snapshot.turn.number,
            "game state refreshed"
        );
        *slot = Some(next);
        Ok(())
    }

    /// Recompute the overlay from the current refreshable fields.
    ///
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoGameLoaded`] or [`ClientError::Consistency`]; the
    /// cache is unchanged on error.
    pub fn recompute_overlay(&self) -> Result<()> {
        let mut slot = write(&self.game);
        let mut next = (*slot).clone().ok_or(ClientError::NoGameLoaded)?;
        next.recompute_overlay()?;
        *slot = Some(next);
        Ok(())
    }

    /// Forget the loaded game.
    pub fn clear(&self) {
        *write(&self.game) = None;
    }

    /// Run `f` against the loaded game without copying it.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&GameSnapshot) -> R) -> Option<R> {
        read(&self.game).as_ref().map(|g| f(&g.snapshot))
    }

    // ── Getters ─────────────────────────────────────────────────────

    pub fn is_loaded(&self) -> bool {
        read(&self.game).is_some()
    }

    pub fn game_id(&self) -> Option<GameId> {
        self.with_snapshot(|s| s.game_id)
    }

    pub fn metadata(&self) -> Option<GameMetadata> {
        self.with_snapshot(|s| s.metadata.clone())
    }

    pub fn players(&self) -> Vec<Player> {
        self.with_snapshot(|s| s.players.clone())
            .unwrap_or_default()
    }

    pub fn player(&self, id: PlayerId) -> Option<Player> {
        let game = read(&self.game);
        let game = game.as_ref()?;
        game.player_index
            .get(&id)
            .and_then(|&i| game.snapshot.players.get(i))
            .cloned()
    }

    pub fn your_player_id(&self) -> Option<PlayerId> {
        self.with_snapshot(|s| s.your_player_id).flatten()
    }

    pub fn locations(&self) -> Vec<MapLocation> {
        self.with_snapshot(|s| s.locations.clone())
            .unwrap_or_default()
    }

    pub fn location(&self, id: LocationId) -> Option<MapLocation> {
        let game = read(&self.game);
        let game = game.as_ref()?;
        game.location_index
            .get(&id)
            .and_then(|&i| game.snapshot.locations.get(i))
            .cloned()
    }

    pub fn turn(&self) -> Option<TurnInfo> {
        self.with_snapshot(|s| s.turn.clone())
    }

    pub fn location_states(&self) -> Vec<LocationState> {
        self.with_snapshot(|s| s.location_states.clone())
            .unwrap_or_default()
    }

    pub fn units(&self) -> Vec<Unit> {
        self.with_snapshot(|s| s.units.clone()).unwrap_or_default()
    }

    /// Units at `location`, in payload order.
    pub fn units_at(&self, location: LocationId) -> Vec<Unit> {
        self.with_snapshot(|s| {
            s.units
                .iter()
                .filter(|u| u.location_id == location)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.with_snapshot(|s| s.orders.clone()).unwrap_or_default()
    }

    pub fn events(&self) -> Vec<GameEvent> {
        self.with_snapshot(|s| s.events.clone()).unwrap_or_default()
    }

    /// A full copy of the loaded game.
    pub fn snapshot(&self) -> Option<GameSnapshot> {
        self.with_snapshot(GameSnapshot::clone)
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
    use crate::protocol::{LocationKind, UnitKind};

    fn location(id: LocationId, name: &str) -> Location {
        Location {
            id,
            name: name.into(),
            kind: LocationKind::Land,
            neighbors: vec![],
            supply_center: false,
        }
    }

    fn player(id: PlayerId, color: &str) -> Player {
        Player {
            id,
            name: format!("player-{id}"),
            color: color.into(),
            is_ai: false,
        }
    }

    fn unit(id: UnitId, owner_id: PlayerId, location_id: LocationId) -> Unit {
        Unit {
            id,
            owner_id,
            kind: UnitKind::Army,
            location_id,
        }
    }

    fn owned(location_id: LocationId, owner_id: Option<PlayerId>, production: u32) -> LocationState {
        LocationState {
            location_id,
            owner_id,
            economy: Economy {
                production,
                population: 10,
            },
        }
    }

    fn initial(game_id: GameId) -> InitialPayload {
        InitialPayload {
            success: true,
            error: None,
            game_id,
            game: GameMetadata {
                name: "Test".into(),
                ..GameMetadata::default()
            },
            locations: vec![location(1, "Alba"), location(2, "Brest"), location(3, "Corfu")],
            players: vec![player(10, "#ff0000"), player(20, "#0000ff")],
            your_player_id: Some(10),
            turn: TurnInfo {
                number: 1,
                ..TurnInfo::default()
            },
            location_states: vec![owned(1, Some(10), 3), owned(2, Some(20), 2)],
            units: vec![unit(100, 10, 1), unit(101, 20, 2)],
            orders: vec![],
            events: vec![],
        }
    }

    fn refresh(game_id: GameId, turn: u32) -> RefreshPayload {
        RefreshPayload {
            game_id,
            turn: Some(TurnInfo {
                number: turn,
                ..TurnInfo::default()
            }),
            location_states: Some(vec![owned(1, Some(20), 5), owned(3, None, 1)]),
            units: Some(vec![unit(101, 20, 1), unit(102, 20, 1)]),
            orders: Some(vec![]),
            events: Some(vec![GameEvent {
                turn,
                message: "Brest fell".into(),
            }]),
        }
    }

    #[test]
    fn initial_builds_overlay() {
        let cache = GameStateCache::new();
        cache.apply_initial(initial(7)).unwrap();

        assert_eq!(cache.game_id(), Some(7));
        assert_eq!(cache.your_player_id(), Some(10));
        let alba = cache.location(1).unwrap();
        assert_eq!(alba.owner, Some(10));
        assert_eq!(alba.color.as_deref(), Some("#ff0000"));
        assert_eq!(alba.units, vec![100]);
        let corfu = cache.location(3).unwrap();
        assert_eq!(corfu.owner, None);
        assert!(corfu.units.is_empty());
    }

    #[test]
    fn unsuccessful_initial_is_rejected() {
        let cache = GameStateCache::new();
        let mut payload = initial(7);
        payload.success = false;
        payload.error = Some("no such game".into());
        let err = cache.apply_initial(payload).unwrap_err();
        assert!(matches!(err, ClientError::MalformedPayload(ref m) if m == "no such game"));
        assert!(!cache.is_loaded());
    }

    #[test]
    fn empty_topology_is_rejected() {
        let cache = GameStateCache::new();
        let mut payload = initial(7);
        payload.locations.clear();
        payload.location_states.clear();
        payload.units.clear();
        assert!(matches!(
            cache.apply_initial(payload),
            Err(ClientError::MalformedPayload(_))
        ));
    }

    #[test]
    fn failed_initial_leaves_previous_game() {
        let cache = GameStateCache::new();
        cache.apply_initial(initial(7)).unwrap();

        let mut broken = initial(8);
        broken.units.push(unit(999, 10, 42));
        let err = cache.apply_initial(broken).unwrap_err();
        assert!(err.is_consistency());
        assert_eq!(cache.game_id(), Some(7));
    }

    #[test]
    fn duplicate_location_is_inconsistent() {
        let cache = GameStateCache::new();
        let mut payload = initial(7);
        payload.locations.push(location(1, "Again"));
        assert!(matches!(
            cache.apply_initial(payload),
            Err(ClientError::Consistency(_))
        ));
    }

    #[test]
    fn refresh_preserves_immutable_fields() {
        let cache = GameStateCache::new();
        cache.apply_initial(initial(7)).unwrap();
        let before = cache.snapshot().unwrap();

        cache.apply_refresh(refresh(7, 2)).unwrap();
        let after = cache.snapshot().unwrap();

        assert_eq!(after.game_id, before.game_id);
        assert_eq!(after.metadata, before.metadata);
        assert_eq!(after.players, before.players);
        assert_eq!(
            after.locations.iter().map(|l| &l.location).collect::<Vec<_>>(),
            before.locations.iter().map(|l| &l.location).collect::<Vec<_>>()
        );
        assert_eq!(after.turn.number, 2);
        assert_eq!(after.events.len(), 1);

        let alba = cache.location(1).unwrap();
        assert_eq!(alba.owner, Some(20));
        assert_eq!(alba.economy.production, 5);
        assert_eq!(alba.units, vec![101, 102]);
        // Brest has no location state any more and reverts to unowned.
        assert_eq!(cache.location(2).unwrap().owner, None);
        assert_eq!(cache.units_at(1).len(), 2);
    }

    #[test]
    fn refresh_missing_field_leaves_cache_unchanged() {
        let cache = GameStateCache::new();
        cache.apply_initial(initial(7)).unwrap();
        let before = cache.snapshot().unwrap();

        for strip in 0..5 {
            let mut payload = refresh(7, 2);
            match strip {
                0 => payload.turn = None,
                1 => payload.location_states = None,
                2 => payload.units = None,
                3 => payload.orders = None,
                _ => payload.events = None,
            }
            let err = cache.apply_refresh(payload).unwrap_err();
            assert!(matches!(err, ClientError::MalformedPayload(_)));
            assert_eq!(cache.snapshot().unwrap(), before);
        }
    }

    #[test]
    fn refresh_for_other_game_is_inconsistent() {
        let cache = GameStateCache::new();
        cache.apply_initial(initial(7)).unwrap();
        assert!(matches!(
            cache.apply_refresh(refresh(8, 2)),
            Err(ClientError::Consistency(_))
        ));
        assert_eq!(cache.turn().unwrap().number, 1);
    }

    #[test]
    fn refresh_without_game_fails() {
        let cache = GameStateCache::new();
        assert!(matches!(
            cache.apply_refresh(refresh(7, 2)),
            Err(ClientError::NoGameLoaded)
        ));
    }

    #[test]
    fn unknown_location_in_refresh_is_fatal_and_atomic() {
        let cache = GameStateCache::new();
        cache.apply_initial(initial(7)).unwrap();
        let before = cache.snapshot().unwrap();

        let mut payload = refresh(7, 2);
        payload.location_states = Some(vec![owned(1, Some(20), 5), owned(99, Some(10), 1)]);
        let err = cache.apply_refresh(payload).unwrap_err();
        assert!(matches!(err, ClientError::Consistency(ref m) if m.contains("99")));
        assert_eq!(cache.snapshot().unwrap(), before);
    }

    #[test]
    fn unknown_owner_is_unowned() {
        let cache = GameStateCache::new();
        let mut payload = initial(7);
        payload.location_states = vec![owned(1, Some(555), 4)];
        cache.apply_initial(payload).unwrap();

        let alba = cache.location(1).unwrap();
        assert_eq!(alba.owner, None);
        assert_eq!(alba.color, None);
        assert_eq!(alba.economy.production, 4);
    }

    #[test]
    fn recompute_is_idempotent() {
        let cache = GameStateCache::new();
        cache.apply_initial(initial(7)).unwrap();
        let once = cache.locations();
        cache.recompute_overlay().unwrap();
        cache.recompute_overlay().unwrap();
        assert_eq!(cache.locations(), once);
    }

    #[test]
    fn clear_forgets_game() {
        let cache = GameStateCache::new();
        cache.apply_initial(initial(7)).unwrap();
        cache.clear();
        assert!(!cache.is_loaded());
        assert!(cache.players().is_empty());
        assert!(matches!(
            cache.recompute_overlay(),
            Err(ClientError::NoGameLoaded)
        ));
    }

    #[test]
    fn player_lookup() {
        let cache = GameStateCache::new();
        cache.apply_initial(initial(7)).unwrap();
        assert_eq!(cache.player(20).unwrap().color, "#0000ff");
        assert!(cache.player(30).is_none());
    }
}
