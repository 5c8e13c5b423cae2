#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests for `GameController` through a fully wired
//! `GameClient`: game loading under session guards, inbound routing, action
//! dispatch, and teardown.
//!
//! API calls block until the test answers them, so every ordering of
//! "request issued", "user moved on" and "response arrived" can be scripted.

mod common;

use std::time::Duration;

use serde_json::json;
use strategos_client::api::{NewGame, NewPlayer, OrderDraft};
use strategos_client::event::StatusLevel;
use strategos_client::protocol::{GameId, OrderKind, Player, RefreshPayload};
use strategos_client::{
    ClientConfig, ClientError, Credentials, Envelope, GameAction, GameClient, Outcome, Screen,
    UiEvent,
};
use tokio::sync::mpsc;

use common::{
    connector, drain_ui, game_api, init_tracing, initial_payload, owned, refresh_payload, settle,
    wait_until, Call, Dialer, GameServer, MockAuthApi, Reply, ServerEnd,
};

struct Harness {
    client: GameClient,
    dialer: Dialer,
    api: GameServer,
    server: ServerEnd,
    ui: mpsc::Receiver<UiEvent>,
}

/// A logged-in client with an authenticated connection.
async fn logged_in() -> Harness {
    init_tracing();
    let (connector, mut dialer) = connector();
    let (games, api) = game_api();
    let (client, mut ui) =
        GameClient::new(connector, MockAuthApi::new(), games, ClientConfig::default());

    client
        .login(&Credentials::new("ada", "hunter2"))
        .await
        .unwrap();
    let mut server = dialer.accept().await;
    assert_eq!(server.next_sent().await.event, "authenticate");
    wait_until("connected", || client.transport().is_connected()).await;
    drain_ui(&mut ui);

    Harness {
        client,
        dialer,
        api,
        server,
        ui,
    }
}

fn spawn_load(
    client: &GameClient,
    game_id: GameId,
) -> tokio::task::JoinHandle<Result<Outcome, ClientError>> {
    let games = client.games().clone();
    tokio::spawn(async move { games.request_initial_load(game_id).await })
}

fn spawn_dispatch(
    client: &GameClient,
    action: GameAction,
) -> tokio::task::JoinHandle<Result<Outcome, ClientError>> {
    let games = client.games().clone();
    tokio::spawn(async move { games.dispatch(action).await })
}

/// Load `game_id` to completion and consume the resulting `game:join`.
async fn load(h: &mut Harness, game_id: GameId) {
    let task = spawn_load(&h.client, game_id);
    h.api
        .expect(Call::Load(game_id))
        .await
        .reply(Reply::Initial(initial_payload(game_id)));
    assert_eq!(task.await.unwrap().unwrap(), Outcome::Applied);
    assert_eq!(h.server.next_sent().await.event, "game:join");
    drain_ui(&mut h.ui);
}

fn join(game_id: GameId, player_id: u64) -> Envelope {
    Envelope::new(
        "game:join",
        json!({ "gameId": game_id, "playerId": player_id }),
    )
}

fn has_error_status(events: &[UiEvent]) -> bool {
    events.iter().any(|e| {
        matches!(
            e,
            UiEvent::Status {
                level: StatusLevel::Error,
                ..
            }
        )
    })
}

// ════════════════════════════════════════════════════════════════════
// Initial load
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn initial_load_applies_state_and_joins() {
    let mut h = logged_in().await;
    let task = spawn_load(&h.client, 7);

    let pending = h.api.expect(Call::Load(7)).await;
    assert_eq!(pending.token, "access-1");
    assert_eq!(h.client.games().active_game(), Some(7));
    assert!(!h.client.games().is_loaded());
    pending.reply(Reply::Initial(initial_payload(7)));

    assert_eq!(task.await.unwrap().unwrap(), Outcome::Applied);
    assert!(h.client.games().is_loaded());
    assert_eq!(h.client.cache().game_id(), Some(7));
    assert_eq!(h.client.cache().location(1).unwrap().owner, Some(10));
    assert_eq!(h.server.next_sent().await, join(7, 10));

    let ui = drain_ui(&mut h.ui);
    assert!(ui.contains(&UiEvent::ShowScreen(Screen::Game)));
    assert!(ui.contains(&UiEvent::GameLoaded { game_id: 7 }));
}

#[tokio::test]
async fn latest_requested_game_wins() {
    let mut h = logged_in().await;

    // G1: two locations, one player.
    let mut g1 = initial_payload(1);
    g1.locations.truncate(2);
    g1.players.truncate(1);
    g1.location_states = vec![owned(1, 10)];
    g1.units.clear();

    let first = spawn_load(&h.client, 1);
    let g1_request = h.api.expect(Call::Load(1)).await;

    let second = spawn_load(&h.client, 2);
    let g2_request = h.api.expect(Call::Load(2)).await;

    // The superseded request was aborted.
    wait_until("G1 request aborted", || g1_request.is_abandoned()).await;
    g1_request.reply(Reply::Initial(g1));
    assert_eq!(first.await.unwrap().unwrap(), Outcome::Discarded);
    assert!(!h.client.cache().is_loaded());

    g2_request.reply(Reply::Initial(initial_payload(2)));
    assert_eq!(second.await.unwrap().unwrap(), Outcome::Applied);

    let snapshot = h.client.cache().snapshot().unwrap();
    assert_eq!(snapshot.game_id, 2);
    assert_eq!(snapshot.locations.len(), 3);
    assert_eq!(snapshot.players.len(), 2);
    assert_eq!(h.server.next_sent().await, join(2, 10));
    assert!(h.server.drain_sent().is_empty());
}

#[tokio::test]
async fn newer_game_wins_even_if_it_answers_first() {
    let mut h = logged_in().await;
    let first = spawn_load(&h.client, 1);
    let g1_request = h.api.expect(Call::Load(1)).await;
    let second = spawn_load(&h.client, 2);

    h.api
        .expect(Call::Load(2))
        .await
        .reply(Reply::Initial(initial_payload(2)));
    assert_eq!(second.await.unwrap().unwrap(), Outcome::Applied);

    g1_request.reply(Reply::Initial(initial_payload(1)));
    assert_eq!(first.await.unwrap().unwrap(), Outcome::Discarded);
    assert_eq!(h.client.cache().game_id(), Some(2));
}

#[tokio::test]
async fn leaving_before_the_response_never_touches_the_cache() {
    let mut h = logged_in().await;
    let task = spawn_load(&h.client, 7);
    let pending = h.api.expect(Call::Load(7)).await;

    h.client.games().leave_game();
    pending.reply(Reply::Initial(initial_payload(7)));

    assert_eq!(task.await.unwrap().unwrap(), Outcome::Discarded);
    assert!(!h.client.cache().is_loaded());
    assert_eq!(h.client.games().active_game(), None);
}

#[tokio::test]
async fn failed_load_is_reported_and_abandoned() {
    let mut h = logged_in().await;
    let task = spawn_load(&h.client, 7);
    h.api
        .expect(Call::Load(7))
        .await
        .reply(Reply::Fail("Game not found".into()));

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err.user_message(), "Game not found");
    assert_eq!(h.client.games().active_game(), None);
    assert_eq!(
        drain_ui(&mut h.ui),
        vec![UiEvent::Status {
            level: StatusLevel::Error,
            message: "Game not found".into()
        }]
    );
}

#[tokio::test]
async fn inconsistent_initial_payload_is_rejected() {
    let mut h = logged_in().await;
    let mut payload = initial_payload(7);
    payload.units.push(common::army(999, 10, 404));

    let task = spawn_load(&h.client, 7);
    h.api
        .expect(Call::Load(7))
        .await
        .reply(Reply::Initial(payload));

    let err = task.await.unwrap().unwrap_err();
    assert!(err.is_consistency());
    assert!(!h.client.cache().is_loaded());
    assert!(has_error_status(&drain_ui(&mut h.ui)));
    settle().await;
    assert!(h.server.drain_sent().is_empty());
}

#[tokio::test]
async fn payload_for_another_game_is_inconsistent() {
    let mut h = logged_in().await;
    let task = spawn_load(&h.client, 7);
    h.api
        .expect(Call::Load(7))
        .await
        .reply(Reply::Initial(initial_payload(8)));

    assert!(matches!(
        task.await.unwrap(),
        Err(ClientError::Consistency(_))
    ));
    assert!(!h.client.cache().is_loaded());
}

#[tokio::test]
async fn load_without_login_fails() {
    init_tracing();
    let (connector, _dialer) = connector();
    let (games, _api) = game_api();
    let (client, _ui) =
        GameClient::new(connector, MockAuthApi::new(), games, ClientConfig::default());

    let err = client.games().request_initial_load(1).await.unwrap_err();
    assert!(matches!(err, ClientError::NotAuthenticated));
    assert_eq!(client.games().active_game(), None);
}

// ════════════════════════════════════════════════════════════════════
// Inbound routing
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn refresh_push_during_load_is_applied_after_initial_state() {
    let mut h = logged_in().await;
    let task = spawn_load(&h.client, 7);
    let pending = h.api.expect(Call::Load(7)).await;

    h.server.push(
        "game:update",
        serde_json::to_value(refresh_payload(7, 2)).unwrap(),
    );
    let guard = h.client.games().active_guard().unwrap();
    wait_until("update queued", || guard.queued().0 == 1).await;
    assert!(!h.client.cache().is_loaded());

    pending.reply(Reply::Initial(initial_payload(7)));
    assert_eq!(task.await.unwrap().unwrap(), Outcome::Applied);

    assert_eq!(h.client.cache().turn().unwrap().number, 2);
    assert_eq!(h.client.cache().location(1).unwrap().owner, Some(20));
    let ui = drain_ui(&mut h.ui);
    let loaded = ui
        .iter()
        .position(|e| *e == UiEvent::GameLoaded { game_id: 7 })
        .unwrap();
    let refreshed = ui
        .iter()
        .position(|e| *e == UiEvent::GameRefreshed { game_id: 7, turn: 2 })
        .unwrap();
    assert!(loaded < refreshed);
}

#[tokio::test]
async fn full_state_push_completes_a_load() {
    let mut h = logged_in().await;
    let task = spawn_load(&h.client, 7);
    let pending = h.api.expect(Call::Load(7)).await;

    h.server.push(
        "game:state",
        serde_json::to_value(initial_payload(7)).unwrap(),
    );
    wait_until("loaded by push", || h.client.games().is_loaded()).await;
    assert_eq!(h.server.next_sent().await, join(7, 10));

    // The HTTP answer still lands, but does not join or announce twice.
    pending.reply(Reply::Initial(initial_payload(7)));
    assert_eq!(task.await.unwrap().unwrap(), Outcome::Applied);
    settle().await;
    assert!(h.server.drain_sent().is_empty());

    let ui = drain_ui(&mut h.ui);
    let loaded = ui
        .iter()
        .filter(|e| matches!(e, UiEvent::GameLoaded { game_id: 7 }))
        .count();
    let shown = ui
        .iter()
        .filter(|e| matches!(e, UiEvent::ShowScreen(Screen::Game)))
        .count();
    assert_eq!((loaded, shown), (1, 1), "ui events: {ui:?}");
}

#[tokio::test]
async fn malformed_game_state_push_is_reported() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;
    let before = h.client.cache().snapshot();

    h.server
        .push("game:state", json!({ "gameId": 7, "locations": [] }));

    let mut ui = Vec::new();
    wait_until("error status", || {
        ui.extend(drain_ui(&mut h.ui));
        has_error_status(&ui)
    })
    .await;
    assert!(h.client.games().is_loaded());
    assert_eq!(h.client.cache().snapshot(), before);
}

#[tokio::test]
async fn turn_complete_triggers_refresh() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;

    h.server
        .push("game:turnComplete", json!({ "gameId": 7, "turn": 1 }));
    let pending = h.api.expect(Call::Refresh(7)).await;
    pending.reply(Reply::Refresh(refresh_payload(7, 2)));

    let cache = h.client.cache().clone();
    wait_until("refresh applied", || {
        cache.turn().is_some_and(|t| t.number == 2)
    })
    .await;
    assert_eq!(cache.location(1).unwrap().units, vec![101]);
    assert_eq!(cache.location(3).unwrap().units, vec![100]);

    let ui = drain_ui(&mut h.ui);
    assert!(ui.contains(&UiEvent::Status {
        level: StatusLevel::Info,
        message: "Turn 1 complete".into()
    }));
    assert!(ui.contains(&UiEvent::GameRefreshed { game_id: 7, turn: 2 }));
}

#[tokio::test]
async fn events_for_other_games_are_ignored() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;
    let before = h.client.cache().snapshot().unwrap();

    h.server.push("game:turnComplete", json!({ "gameId": 8 }));
    h.server.push(
        "game:update",
        serde_json::to_value(refresh_payload(8, 5)).unwrap(),
    );
    h.server.push("game:started", json!({ "gameId": 8 }));
    settle().await;

    assert!(h.api.is_idle());
    assert_eq!(h.client.cache().snapshot().unwrap(), before);
}

#[tokio::test]
async fn game_events_without_active_game_are_ignored() {
    let mut h = logged_in().await;
    h.server.push("game:turnComplete", json!({ "gameId": 7 }));
    settle().await;
    assert!(h.api.is_idle());
    assert!(!h.client.cache().is_loaded());
}

#[tokio::test]
async fn incomplete_refresh_push_is_rejected() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;
    let before = h.client.cache().snapshot().unwrap();

    let incomplete = RefreshPayload {
        units: None,
        ..refresh_payload(7, 2)
    };
    h.server
        .push("game:update", serde_json::to_value(incomplete).unwrap());

    let mut ui = Vec::new();
    wait_until("error reported", || {
        ui.extend(drain_ui(&mut h.ui));
        has_error_status(&ui)
    })
    .await;
    assert_eq!(h.client.cache().snapshot().unwrap(), before);
}

#[tokio::test]
async fn refresh_with_unknown_location_is_a_consistency_error() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;
    let before = h.client.cache().snapshot().unwrap();

    let mut payload = refresh_payload(7, 2);
    payload.location_states = Some(vec![owned(1, 20), owned(77, 20)]);
    h.server
        .push("game:update", serde_json::to_value(payload).unwrap());

    let mut ui = Vec::new();
    wait_until("error reported", || {
        ui.extend(drain_ui(&mut h.ui));
        has_error_status(&ui)
    })
    .await;
    assert_eq!(h.client.cache().snapshot().unwrap(), before);
}

#[tokio::test]
async fn player_joined_reloads_the_game() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;

    h.server
        .push("game:playerJoined", json!({ "gameId": 7, "playerId": 30 }));

    let mut payload = initial_payload(7);
    payload.players.push(Player {
        id: 30,
        name: "newcomer".into(),
        color: "#27ae60".into(),
        is_ai: true,
    });
    h.api
        .expect(Call::Load(7))
        .await
        .reply(Reply::Initial(payload));

    let cache = h.client.cache().clone();
    wait_until("roster reloaded", || cache.players().len() == 3).await;
    assert_eq!(cache.player(30).unwrap().name, "newcomer");
}

#[tokio::test]
async fn player_joined_keeps_pending_orders_and_loaded_state() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;

    let orders = vec![OrderDraft {
        unit_id: 100,
        kind: OrderKind::Hold,
        target: None,
    }];
    let task = spawn_dispatch(&h.client, GameAction::SubmitOrders(orders));
    let submit = h.api.expect(Call::SubmitOrders(7, 1)).await;

    h.server
        .push("game:playerJoined", json!({ "gameId": 7, "playerId": 30 }));
    let reload = h.api.expect(Call::Load(7)).await;

    // The old state stays readable while the reload is in flight.
    assert!(h.client.games().is_loaded());
    assert!(h.client.cache().is_loaded());
    assert_eq!(h.client.cache().players().len(), 2);
    assert!(!submit.is_abandoned());

    let mut payload = initial_payload(7);
    payload.players.push(Player {
        id: 30,
        name: "newcomer".into(),
        color: "#27ae60".into(),
        is_ai: false,
    });
    reload.reply(Reply::Initial(payload));
    let cache = h.client.cache().clone();
    wait_until("roster reloaded", || cache.players().len() == 3).await;

    submit.reply(Reply::Done);
    h.api
        .expect(Call::Refresh(7))
        .await
        .reply(Reply::Refresh(refresh_payload(7, 2)));
    assert_eq!(task.await.unwrap().unwrap(), Outcome::Applied);
    assert_eq!(cache.turn().unwrap().number, 2);

    // Same game, so no second join and no screen change.
    settle().await;
    assert!(h.server.drain_sent().is_empty());
    let ui = drain_ui(&mut h.ui);
    assert!(!ui.iter().any(|e| matches!(e, UiEvent::ShowScreen(_))));
}

#[tokio::test]
async fn failed_reload_keeps_the_game_loaded() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;

    h.server
        .push("game:started", json!({ "gameId": 7 }));
    h.api
        .expect(Call::Load(7))
        .await
        .reply(Reply::Fail("Service unavailable".into()));

    let mut ui = Vec::new();
    wait_until("error status", || {
        ui.extend(drain_ui(&mut h.ui));
        has_error_status(&ui)
    })
    .await;
    assert_eq!(h.client.games().active_game(), Some(7));
    assert!(h.client.games().is_loaded());
    assert_eq!(h.client.cache().game_id(), Some(7));

    // The game keeps following pushes afterwards.
    h.server
        .push("game:turnComplete", json!({ "gameId": 7, "turn": 1 }));
    h.api
        .expect(Call::Refresh(7))
        .await
        .reply(Reply::Refresh(refresh_payload(7, 2)));
    let cache = h.client.cache().clone();
    wait_until("refresh applied", || {
        cache.turn().is_some_and(|t| t.number == 2)
    })
    .await;
}

#[tokio::test]
async fn server_error_event_is_reported() {
    let mut h = logged_in().await;
    h.server.push(
        "error",
        json!({ "message": "Slow down", "code": "RATE_LIMIT_EXCEEDED" }),
    );

    let mut ui = Vec::new();
    wait_until("status", || {
        ui.extend(drain_ui(&mut h.ui));
        !ui.is_empty()
    })
    .await;
    assert_eq!(
        ui,
        vec![UiEvent::Status {
            level: StatusLevel::Error,
            message: "Slow down".into()
        }]
    );
}

// ════════════════════════════════════════════════════════════════════
// Actions
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn join_is_queued_while_loading_and_sent_once() {
    let mut h = logged_in().await;
    let task = spawn_load(&h.client, 7);
    let pending = h.api.expect(Call::Load(7)).await;

    let queued = h.client.games().dispatch(GameAction::JoinGame).await;
    assert_eq!(queued.unwrap(), Outcome::Queued);
    settle().await;
    assert!(h.server.drain_sent().is_empty());

    pending.reply(Reply::Initial(initial_payload(7)));
    task.await.unwrap().unwrap();
    settle().await;
    assert_eq!(h.server.drain_sent(), vec![join(7, 10)]);

    let sent = h.client.games().dispatch(GameAction::JoinGame).await;
    assert_eq!(sent.unwrap(), Outcome::Applied);
    assert_eq!(h.server.next_sent().await, join(7, 10));
}

#[tokio::test]
async fn join_without_game_fails() {
    let h = logged_in().await;
    let err = h
        .client
        .games()
        .dispatch(GameAction::JoinGame)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NoGameLoaded));
}

#[tokio::test]
async fn start_game_reloads_on_success() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;

    let task = spawn_dispatch(&h.client, GameAction::StartGame);
    h.api.expect(Call::Start(7)).await.reply(Reply::Done);
    h.api
        .expect(Call::Load(7))
        .await
        .reply(Reply::Initial(initial_payload(7)));

    assert_eq!(task.await.unwrap().unwrap(), Outcome::Applied);
    assert!(h.client.games().is_loaded());
}

#[tokio::test]
async fn setup_actions_call_the_api_for_the_active_game() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;

    let add = spawn_dispatch(
        &h.client,
        GameAction::AddPlayer(NewPlayer {
            name: "bot".into(),
            color: "#8e44ad".into(),
            is_ai: true,
        }),
    );
    h.api
        .expect(Call::AddPlayer(7, "bot".into()))
        .await
        .reply(Reply::Player(30));
    h.api
        .expect(Call::Load(7))
        .await
        .reply(Reply::Initial(initial_payload(7)));
    assert_eq!(add.await.unwrap().unwrap(), Outcome::Applied);

    let map = spawn_dispatch(&h.client, GameAction::GenerateMap(Default::default()));
    h.api.expect(Call::GenerateMap(7)).await.reply(Reply::Done);
    h.api
        .expect(Call::Load(7))
        .await
        .reply(Reply::Initial(initial_payload(7)));
    assert_eq!(map.await.unwrap().unwrap(), Outcome::Applied);

    let place = spawn_dispatch(&h.client, GameAction::PlacePlayers);
    h.api.expect(Call::PlacePlayers(7)).await.reply(Reply::Done);
    h.api
        .expect(Call::Load(7))
        .await
        .reply(Reply::Initial(initial_payload(7)));
    assert_eq!(place.await.unwrap().unwrap(), Outcome::Applied);
}

#[tokio::test]
async fn submit_orders_refreshes_on_success() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;

    let orders = vec![OrderDraft {
        unit_id: 100,
        kind: OrderKind::Move,
        target: Some(3),
    }];
    let task = spawn_dispatch(&h.client, GameAction::SubmitOrders(orders));
    h.api
        .expect(Call::SubmitOrders(7, 1))
        .await
        .reply(Reply::Done);
    h.api
        .expect(Call::Refresh(7))
        .await
        .reply(Reply::Refresh(refresh_payload(7, 2)));

    assert_eq!(task.await.unwrap().unwrap(), Outcome::Applied);
    assert_eq!(h.client.cache().turn().unwrap().number, 2);
}

#[tokio::test]
async fn rejected_action_is_reported() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;

    let task = spawn_dispatch(&h.client, GameAction::StartGame);
    h.api
        .expect(Call::Start(7))
        .await
        .reply(Reply::Fail("Not enough players".into()));

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::Request { .. }));
    assert_eq!(
        drain_ui(&mut h.ui),
        vec![UiEvent::Status {
            level: StatusLevel::Error,
            message: "Not enough players".into()
        }]
    );
}

#[tokio::test]
async fn superseded_action_is_silent() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;

    let task = spawn_dispatch(&h.client, GameAction::PlacePlayers);
    let pending = h.api.expect(Call::PlacePlayers(7)).await;
    h.client.games().leave_game();
    pending.reply(Reply::Fail("too late".into()));

    assert_eq!(task.await.unwrap().unwrap(), Outcome::Discarded);
    assert!(!has_error_status(&drain_ui(&mut h.ui)));
    settle().await;
    assert!(h.api.is_idle());
}

#[tokio::test]
async fn create_game_announces_and_loads_it() {
    let mut h = logged_in().await;
    let task = spawn_dispatch(
        &h.client,
        GameAction::CreateGame(NewGame {
            name: "Spring 1901".into(),
            max_players: 7,
            map_name: None,
        }),
    );
    h.api
        .expect(Call::Create("Spring 1901".into()))
        .await
        .reply(Reply::Created(42));
    h.api
        .expect(Call::Load(42))
        .await
        .reply(Reply::Initial(initial_payload(42)));

    assert_eq!(task.await.unwrap().unwrap(), Outcome::Applied);
    assert_eq!(h.client.cache().game_id(), Some(42));
    let ui = drain_ui(&mut h.ui);
    assert!(ui.contains(&UiEvent::GameCreated { game_id: 42 }));
    assert!(ui.contains(&UiEvent::GameLoaded { game_id: 42 }));
}

#[tokio::test]
async fn create_game_finishing_after_logout_is_discarded() {
    let mut h = logged_in().await;
    let task = spawn_dispatch(
        &h.client,
        GameAction::CreateGame(NewGame {
            name: "Late".into(),
            max_players: 2,
            map_name: None,
        }),
    );
    let pending = h.api.expect(Call::Create("Late".into())).await;

    h.client.logout().await;
    pending.reply(Reply::Created(43));

    assert_eq!(task.await.unwrap().unwrap(), Outcome::Discarded);
    settle().await;
    assert!(h.api.is_idle());
    assert!(!drain_ui(&mut h.ui).contains(&UiEvent::GameCreated { game_id: 43 }));
}

#[tokio::test]
async fn superseded_request_failure_is_still_reported() {
    let mut h = logged_in().await;
    let task = spawn_dispatch(
        &h.client,
        GameAction::CreateGame(NewGame {
            name: "Doomed".into(),
            max_players: 2,
            map_name: None,
        }),
    );
    let pending = h.api.expect(Call::Create("Doomed".into())).await;

    h.client.logout().await;
    drain_ui(&mut h.ui);
    pending.reply(Reply::Fail("Storage unavailable".into()));

    assert!(matches!(
        task.await.unwrap(),
        Err(ClientError::Request { .. })
    ));
    assert_eq!(
        drain_ui(&mut h.ui),
        vec![UiEvent::Status {
            level: StatusLevel::Error,
            message: "Storage unavailable".into()
        }]
    );
}

// ════════════════════════════════════════════════════════════════════
// Teardown and resync
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn leave_game_sends_leave_and_returns_to_lobby() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;

    h.client.games().leave_game();
    assert_eq!(
        h.server.next_sent().await,
        Envelope::new("game:leave", json!({ "gameId": 7 }))
    );
    assert!(!h.client.cache().is_loaded());
    assert_eq!(h.client.games().active_game(), None);
    assert_eq!(
        drain_ui(&mut h.ui).last(),
        Some(&UiEvent::ShowScreen(Screen::Lobby))
    );

    // Late pushes for the old game change nothing.
    h.server.push("game:turnComplete", json!({ "gameId": 7 }));
    settle().await;
    assert!(h.api.is_idle());
}

#[tokio::test]
async fn logout_drops_the_game_session() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;

    h.client.logout().await;

    assert!(!h.client.cache().is_loaded());
    assert_eq!(h.client.games().active_game(), None);
    assert!(h.client.tokens().access_token().is_none());
    assert_eq!(h.client.transport().listener_counts(), (0, 0));
    assert_eq!(
        drain_ui(&mut h.ui).last(),
        Some(&UiEvent::ShowScreen(Screen::Entry))
    );
}

#[tokio::test(start_paused = true)]
async fn reconnect_rejoins_and_refreshes_loaded_game() {
    let mut h = logged_in().await;
    load(&mut h, 7).await;

    let Harness {
        server,
        mut dialer,
        mut api,
        client,
        ..
    } = h;
    server.hang_up();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let mut server = dialer.accept().await;
    assert_eq!(server.next_sent().await.event, "authenticate");
    assert_eq!(server.next_sent().await, join(7, 10));

    api.expect(Call::Refresh(7))
        .await
        .reply(Reply::Refresh(refresh_payload(7, 3)));
    let cache = client.cache().clone();
    wait_until("resynced", || cache.turn().is_some_and(|t| t.number == 3)).await;
}

#[tokio::test]
async fn relogin_rebinds_game_listeners() {
    let mut h = logged_in().await;
    h.client.logout().await;
    h.client
        .login(&Credentials::new("ada", "hunter2"))
        .await
        .unwrap();

    let mut server = h.dialer.accept().await;
    assert_eq!(server.next_sent().await.event, "authenticate");
    assert_eq!(h.client.transport().listener_counts(), (1, 2));

    let task = spawn_load(&h.client, 9);
    h.api
        .expect(Call::Load(9))
        .await
        .reply(Reply::Initial(initial_payload(9)));
    assert_eq!(task.await.unwrap().unwrap(), Outcome::Applied);
    assert_eq!(server.next_sent().await, join(9, 10));
}
