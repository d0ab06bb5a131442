//! Integration tests for the command gateway.
//!
//! Commands run against a live `axum` server on loopback. Each test checks
//! the returned outcome, the store, and the notification slot.

#![allow(clippy::unwrap_used)]

mod common;

use citypulse_sync::{CommandError, SyncSession};
use citypulse_types::{
    CommandAction, ConnectionStatus, IncidentReport, LightPhase, NotificationKind,
    RoutePlanRequest, SettingsUpdate, StartSimulation, TrafficLightControl, VehicleAdd, WireId,
};
use serde_json::json;

use common::{TestServer, config_for, free_addr};

fn session_for(server: &TestServer) -> SyncSession {
    SyncSession::init(&server.config()).unwrap()
}

fn shown(session: &SyncSession) -> (NotificationKind, String) {
    let n = session.notifications().visible().unwrap();
    (n.kind, n.message)
}

#[tokio::test]
async fn start_success_sets_running_and_settings() {
    let server = TestServer::start().await;
    let session = session_for(&server);

    let response = session
        .gateway()
        .start_simulation(StartSimulation::for_city("Berlin"))
        .await
        .unwrap();
    assert!(response.is_success());

    let snapshot = session.store().snapshot();
    assert!(snapshot.running);
    assert_eq!(snapshot.settings.city.as_deref(), Some("Berlin"));
    assert_eq!(snapshot.settings.routing_algorithm.as_deref(), Some("a_star"));
    assert_eq!(
        shown(&session),
        (NotificationKind::Success, "Simulation started for Berlin".to_owned())
    );

    let requests = server.requests();
    assert_eq!(
        requests.last(),
        Some(&(
            "/simulation/start".to_owned(),
            json!({
                "city": "Berlin",
                "speed": 1.0,
                "routing_algorithm": "a_star",
                "traffic_light_mode": "auto"
            })
        ))
    );

    session.teardown().await;
}

#[tokio::test]
async fn start_error_leaves_state_untouched() {
    let server = TestServer::start().await;
    let session = session_for(&server);
    let before = session.store().snapshot();

    let result = session
        .gateway()
        .start_simulation(StartSimulation::for_city("busy"))
        .await;

    match result {
        Err(CommandError::Rejected { action, response }) => {
            assert_eq!(action, CommandAction::StartSimulation);
            assert_eq!(response.message, "city busy");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(!session.store().running().get());
    assert_eq!(session.store().snapshot(), before);
    assert_eq!(shown(&session), (NotificationKind::Error, "city busy".to_owned()));

    session.teardown().await;
}

#[tokio::test]
async fn stop_clears_running() {
    let server = TestServer::start().await;
    let session = session_for(&server);
    let gateway = session.gateway();

    gateway
        .start_simulation(StartSimulation::for_city("Paris"))
        .await
        .unwrap();
    assert!(session.store().running().get());

    gateway.stop_simulation().await.unwrap();
    assert!(!session.store().running().get());
    assert_eq!(
        shown(&session),
        (NotificationKind::Success, "Simulation stopped".to_owned())
    );

    session.teardown().await;
}

#[tokio::test]
async fn settings_update_merges_confirmed_fields() {
    let server = TestServer::start().await;
    let session = session_for(&server);
    let gateway = session.gateway();

    gateway
        .start_simulation(StartSimulation::for_city("Tokyo"))
        .await
        .unwrap();
    gateway
        .update_settings(SettingsUpdate {
            routing_algorithm: Some("dijkstra".to_owned()),
            ..SettingsUpdate::default()
        })
        .await
        .unwrap();

    let settings = session.store().settings().get();
    assert_eq!(settings.city.as_deref(), Some("Tokyo"));
    assert_eq!(settings.routing_algorithm.as_deref(), Some("dijkstra"));
    assert_eq!(settings.traffic_light_mode.as_deref(), Some("auto"));

    let (path, body) = server.requests().last().cloned().unwrap();
    assert_eq!(path, "/simulation/settings");
    assert_eq!(body, json!({"routing_algorithm": "dijkstra"}));

    session.teardown().await;
}

#[tokio::test]
async fn light_control_records_manual_phase_only_on_success() {
    let server = TestServer::start().await;
    let session = session_for(&server);
    let gateway = session.gateway();

    gateway
        .control_traffic_light(TrafficLightControl {
            node_id: WireId::Number(42),
            state: LightPhase::Red,
        })
        .await
        .unwrap();
    assert_eq!(
        session.store().manual_lights().get().get("42"),
        Some(&LightPhase::Red)
    );
    assert_eq!(
        server.requests().last().map(|(_, body)| body.clone()),
        Some(json!({"node_id": 42, "state": "red"}))
    );

    let failed = gateway
        .control_traffic_light(TrafficLightControl {
            node_id: WireId::from("missing"),
            state: LightPhase::Green,
        })
        .await;
    assert!(matches!(failed, Err(CommandError::Rejected { .. })));
    assert!(!session.store().manual_lights().get().contains_key("missing"));
    assert_eq!(
        shown(&session),
        (NotificationKind::Error, "Failed to control traffic light".to_owned())
    );

    session.teardown().await;
}

#[tokio::test]
async fn add_vehicle_and_incident_only_notify() {
    let server = TestServer::start().await;
    let session = session_for(&server);
    let gateway = session.gateway();
    let before = session.store().snapshot();

    let response = gateway
        .add_vehicle(VehicleAdd {
            origin: Some("n1".to_owned()),
            destination: Some("n9".to_owned()),
            vehicle_type: "bus".to_owned(),
        })
        .await
        .unwrap();
    assert_eq!(response.field::<String>("vehicle_id").as_deref(), Some("vehicle_7"));
    assert_eq!(
        shown(&session),
        (NotificationKind::Success, "Vehicle vehicle_7 added".to_owned())
    );

    gateway
        .report_incident(IncidentReport {
            lat: 52.52,
            lon: 13.405,
            incident_type: "accident".to_owned(),
        })
        .await
        .unwrap();
    assert_eq!(
        shown(&session),
        (NotificationKind::Success, "accident incident added".to_owned())
    );

    assert_eq!(session.store().snapshot(), before);

    session.teardown().await;
}

#[tokio::test]
async fn plan_route_returns_plan_without_touching_store() {
    let server = TestServer::start().await;
    let mut config = server.config();
    config.server.route_api_url = Some(format!("http://{}", server.addr));
    let session = SyncSession::init(&config).unwrap();
    let before = session.store().snapshot();

    let plan = session
        .gateway()
        .plan_route(RoutePlanRequest {
            origin_lat: 37.77,
            origin_lon: -122.41,
            destination_lat: 37.76,
            destination_lon: -122.43,
        })
        .await
        .unwrap();

    assert_eq!(plan.route.len(), 2);
    assert_eq!(
        plan.origin.and_then(|o| o.node_name).as_deref(),
        Some("Market St")
    );
    assert!(plan.distance_km.is_some_and(|d| (d - 4.2).abs() < f64::EPSILON));
    assert_eq!(session.store().snapshot(), before);
    assert_eq!(
        shown(&session),
        (NotificationKind::Success, "Route planned successfully".to_owned())
    );

    session.teardown().await;
}

#[tokio::test]
async fn refresh_analytics_replaces_slice() {
    let server = TestServer::start().await;
    let session = session_for(&server);

    let summary = session.gateway().refresh_analytics().await.unwrap();
    assert_eq!(summary.get("total_vehicles"), Some(&json!(4)));
    assert_eq!(session.store().analytics().get(), summary);

    session.teardown().await;
}

#[tokio::test]
async fn unreachable_server_reports_transport_failure() {
    let addr = free_addr();
    let session = SyncSession::init(&config_for(addr)).unwrap();

    let result = session.gateway().stop_simulation().await;
    assert!(matches!(result, Err(CommandError::Transport { .. })));
    assert_eq!(
        shown(&session),
        (
            NotificationKind::Error,
            "Failed to stop simulation: server unreachable".to_owned()
        )
    );

    session.teardown().await;
}

#[tokio::test]
async fn commands_work_while_inbound_channel_is_down() {
    let server = TestServer::start().await;
    let mut config = server.config();
    config.server.ws_url = format!("ws://{}/ws", free_addr());
    config.connection.reconnect_delay_ms = 10_000;
    config.connection.max_reconnect_delay_ms = 10_000;

    let session = SyncSession::init(&config).unwrap();
    session.connect().unwrap();
    let mut rx = session.store().connection().subscribe();
    let reconnecting = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        rx.wait_for(|s| s.status == ConnectionStatus::Reconnecting),
    )
    .await
    .is_ok_and(|r| r.is_ok());
    assert!(reconnecting);

    session
        .gateway()
        .start_simulation(StartSimulation::for_city("Oslo"))
        .await
        .unwrap();
    assert!(session.store().running().get());
    assert_eq!(
        session.connection_state().status,
        ConnectionStatus::Reconnecting
    );

    session.teardown().await;
}
