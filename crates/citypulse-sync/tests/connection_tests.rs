//! Integration tests for the real-time channel.
//!
//! A live `axum` WebSocket server on loopback pushes envelopes; the tests
//! observe connection state, slices, and notifications through the
//! public session API.

#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use citypulse_sync::SyncSession;
use citypulse_types::{ConnectionStatus, NotificationKind};

use common::{TestServer, config_for, eventually, free_addr};

const WAIT: Duration = Duration::from_secs(5);

async fn wait_for_status(session: &SyncSession, status: ConnectionStatus) -> bool {
    let mut rx = session.store().connection().subscribe();
    tokio::time::timeout(WAIT, rx.wait_for(|s| s.status == status))
        .await
        .is_ok_and(|r| r.is_ok())
}

async fn open_session(server: &TestServer) -> SyncSession {
    let session = SyncSession::init(&server.config()).unwrap();
    session.connect().unwrap();
    assert!(wait_for_status(&session, ConnectionStatus::Open).await);
    assert!(eventually(WAIT, || server.connections() >= 1).await);
    session
}

#[tokio::test]
async fn open_shows_connected_notification() {
    let server = TestServer::start().await;
    let session = open_session(&server).await;

    let state = session.connection_state();
    assert_eq!(state.attempt, 0);
    assert!(state.last_error.is_none());

    let shown = session.notifications().visible().unwrap();
    assert_eq!(shown.kind, NotificationKind::Success);
    assert_eq!(shown.message, "Connected to server");

    session.teardown().await;
}

#[tokio::test]
async fn vehicle_frames_replace_the_slice() {
    let server = TestServer::start().await;
    let session = open_session(&server).await;
    let vehicles = session.store().vehicles();

    server.push(r#"{"type":"vehicles","data":[{"id":"v1","type":"car","lat":37.77,"lon":-122.41}]}"#);
    assert!(eventually(WAIT, || vehicles.get().len() == 1).await);
    assert_eq!(vehicles.get().first().map(|v| v.id.clone()).as_deref(), Some("v1"));

    server.push(r#"{"type":"vehicles","data":[]}"#);
    assert!(eventually(WAIT, || vehicles.get().is_empty()).await);

    session.teardown().await;
}

#[tokio::test]
async fn bad_frames_do_not_disturb_the_stream() {
    let server = TestServer::start().await;
    let session = open_session(&server).await;
    let store = session.store();

    server.push("definitely not json");
    server.push(r#"{"data":{"e1":0.5}}"#);
    server.push(r#"{"type":"weather","data":{"rain":true}}"#);
    server.push(r#"{"type":"congestion","data":"not a map"}"#);
    server.push(r#"{"type":"congestion","data":{"e1":0.5}}"#);

    assert!(eventually(WAIT, || !store.congestion().get().is_empty()).await);
    let snapshot = store.snapshot();
    assert_eq!(snapshot.congestion.len(), 1);
    assert!(snapshot.vehicles.is_empty());
    assert!(snapshot.graph.is_none());
    assert_eq!(session.connection_state().status, ConnectionStatus::Open);

    session.teardown().await;
}

#[tokio::test]
async fn status_frames_drive_running_flag_and_notifications() {
    let server = TestServer::start().await;
    let session = open_session(&server).await;
    let running = session.store().running();

    server.push(r#"{"type":"simulation_status","data":{"running":true,"message":"Simulation started","status":"info"}}"#);
    assert!(eventually(WAIT, || running.get()).await);
    let shown = session.notifications().visible().unwrap();
    assert_eq!(shown.message, "Simulation started");
    assert_eq!(shown.kind, NotificationKind::Info);

    server.push(r#"{"type":"simulation_status","data":{"running":false}}"#);
    assert!(eventually(WAIT, || !running.get()).await);
    assert_eq!(
        session.notifications().current().map(|n| n.message).as_deref(),
        Some("Simulation started")
    );

    session.teardown().await;
}

#[tokio::test]
async fn heartbeat_pings_while_open() {
    let server = TestServer::start().await;
    let session = open_session(&server).await;

    assert!(eventually(WAIT, || server.pings() >= 2).await);

    session.teardown().await;
}

#[tokio::test]
async fn server_close_reconnects_and_resets_attempts() {
    let server = TestServer::start().await;
    let session = open_session(&server).await;
    let mut rx = session.store().connection().subscribe();
    rx.borrow_and_update();

    server.kick();
    let reconnecting = tokio::time::timeout(
        WAIT,
        rx.wait_for(|s| s.status == ConnectionStatus::Reconnecting),
    )
    .await
    .is_ok_and(|r| r.is_ok());
    assert!(reconnecting);

    assert!(wait_for_status(&session, ConnectionStatus::Open).await);
    assert!(eventually(WAIT, || server.connections() >= 2).await);
    assert_eq!(session.connection_state().attempt, 0);

    session.teardown().await;
}

#[tokio::test]
async fn disconnect_closes_the_socket() {
    let server = TestServer::start().await;
    let session = open_session(&server).await;

    session.disconnect().unwrap();
    assert!(wait_for_status(&session, ConnectionStatus::Idle).await);
    assert!(eventually(WAIT, || server.disconnections() >= 1).await);
    assert_eq!(
        session.notifications().visible().map(|n| n.message).as_deref(),
        Some("Disconnected from server")
    );

    // No automatic reconnect after an explicit disconnect.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connections(), 1);

    session.teardown().await;
}

#[tokio::test]
async fn manual_connect_recovers_from_failed() {
    let addr = free_addr();
    let mut config = config_for(addr);
    config.connection.max_attempts = 2;

    let session = SyncSession::init(&config).unwrap();
    session.connect().unwrap();
    assert!(wait_for_status(&session, ConnectionStatus::Failed).await);
    assert_eq!(session.connection_state().attempt, 2);
    assert_eq!(
        session.notifications().visible().map(|n| n.kind),
        Some(NotificationKind::Error)
    );

    // Stays failed without a manual connect.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(session.connection_state().status, ConnectionStatus::Failed);

    let server = TestServer::start_on(addr).await;
    session.connect().unwrap();
    assert!(wait_for_status(&session, ConnectionStatus::Open).await);
    assert!(eventually(WAIT, || server.connections() >= 1).await);

    session.teardown().await;
}

#[tokio::test]
async fn silent_server_trips_liveness_timeout() {
    let server = TestServer::start().await;
    let mut config = server.config();
    config.connection.heartbeat_interval_ms = 100;
    config.connection.liveness_timeout_ms = Some(300);

    let session = SyncSession::init(&config).unwrap();
    session.connect().unwrap();
    assert!(wait_for_status(&session, ConnectionStatus::Open).await);

    // The server never answers heartbeats, so the client drops and redials.
    assert!(eventually(WAIT, || server.connections() >= 2).await);
    assert!(eventually(WAIT, || server.disconnections() >= 1).await);

    session.teardown().await;
}
