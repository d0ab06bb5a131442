//! In-process simulation server for integration tests.
//!
//! Serves the command endpoints and a `/ws` WebSocket on `127.0.0.1`.
//! Tests push frames to every connected socket, force-close sockets, and
//! inspect what the client sent.

#![allow(dead_code, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{any, get, post};
use axum::Json;
use citypulse_sync::SyncConfig;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Shared server-side bookkeeping.
pub struct ServerState {
    /// Frames fanned out to every connected socket.
    pub frames: broadcast::Sender<String>,
    /// Closes every connected socket.
    pub kick: broadcast::Sender<()>,
    /// Sockets that have subscribed to `frames`.
    pub connections: AtomicUsize,
    /// Sockets that have ended.
    pub disconnections: AtomicUsize,
    /// Heartbeat frames received.
    pub pings: AtomicUsize,
    /// Every command request as `(path, body)`.
    pub requests: Mutex<Vec<(String, Value)>>,
}

/// A running test server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_on("127.0.0.1:0".parse().unwrap()).await
    }

    pub async fn start_on(addr: SocketAddr) -> Self {
        let (frames, _) = broadcast::channel(64);
        let (kick, _) = broadcast::channel(4);
        let state = Arc::new(ServerState {
            frames,
            kick,
            connections: AtomicUsize::new(0),
            disconnections: AtomicUsize::new(0),
            pings: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/ws", any(ws_upgrade))
            .route("/analytics", get(analytics))
            .route("/simulation/start", post(command))
            .route("/simulation/stop", post(command))
            .route("/simulation/settings", post(command))
            .route("/traffic_lights/control", post(command))
            .route("/vehicles/add", post(command))
            .route("/incidents/add", post(command))
            .route("/route/plan", post(command))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state, task }
    }

    /// Client config pointing at this server with fast timers.
    pub fn config(&self) -> SyncConfig {
        config_for(self.addr)
    }

    /// Send a raw text frame to every connected socket.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.state.frames.send(frame.into());
    }

    /// Close every connected socket from the server side.
    pub fn kick(&self) {
        let _ = self.state.kick.send(());
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn disconnections(&self) -> usize {
        self.state.disconnections.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Config for a server at `addr` with fast reconnects and heartbeats.
pub fn config_for(addr: SocketAddr) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.server.ws_url = format!("ws://{addr}/ws");
    config.server.api_url = format!("http://{addr}");
    config.connection.reconnect_delay_ms = 50;
    config.connection.max_reconnect_delay_ms = 50;
    config.connection.heartbeat_interval_ms = 100;
    config.commands.request_timeout_ms = 2_000;
    config
}

/// An address nothing is listening on.
pub fn free_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Poll `condition` every 10ms until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn command(
    State(state): State<Arc<ServerState>>,
    uri: Uri,
    body: Bytes,
) -> impl IntoResponse {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let path = uri.path().to_owned();
    state
        .requests
        .lock()
        .unwrap()
        .push((path.clone(), body.clone()));

    let ok = |message: String| (StatusCode::OK, Json(json!({"status": "success", "message": message})));
    let fail = |code: StatusCode, message: &str| {
        (code, Json(json!({"status": "error", "message": message})))
    };

    match path.as_str() {
        "/simulation/start" => match body.get("city").and_then(Value::as_str) {
            Some("busy") => fail(StatusCode::INTERNAL_SERVER_ERROR, "city busy"),
            Some(city) => ok(format!("Simulation started for {city}")),
            None => fail(StatusCode::UNPROCESSABLE_ENTITY, "city is required"),
        },
        "/simulation/stop" => ok("Simulation stopped".to_owned()),
        "/simulation/settings" => ok("Simulation settings updated".to_owned()),
        "/traffic_lights/control" => match body.get("node_id") {
            Some(Value::String(node)) if node == "missing" => {
                fail(StatusCode::BAD_REQUEST, "Failed to control traffic light")
            }
            Some(node @ (Value::String(_) | Value::Number(_))) => {
                let node = node.as_str().map_or_else(|| node.to_string(), str::to_owned);
                let phase = body.get("state").and_then(Value::as_str).unwrap_or("?");
                ok(format!("Traffic light {node} set to {phase}"))
            }
            _ => fail(StatusCode::UNPROCESSABLE_ENTITY, "node_id is required"),
        },
        "/vehicles/add" => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": "Vehicle vehicle_7 added",
                "vehicle_id": "vehicle_7"
            })),
        ),
        "/incidents/add" => {
            let kind = body.get("type").and_then(Value::as_str).unwrap_or("unknown");
            ok(format!("{kind} incident added"))
        }
        "/route/plan" => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "route": {
                    "route": [
                        {"lat": body["origin_lat"], "lon": body["origin_lon"]},
                        {"lat": body["destination_lat"], "lon": body["destination_lon"]}
                    ],
                    "origin": {"node_id": "n1", "node_name": "Market St"},
                    "destination": {"node_id": "n9", "node_name": "Castro St"},
                    "travel_time_minutes": 12.5,
                    "distance_km": 4.2,
                    "congestion_factor": 0.3
                }
            })),
        ),
        _ => fail(StatusCode::NOT_FOUND, "unknown command"),
    }
}

async fn analytics() -> impl IntoResponse {
    Json(json!({
        "average_speed": 31.5,
        "total_vehicles": 4,
        "congestion_hotspots": ["e1", "e7"]
    }))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut frames = state.frames.subscribe();
    let mut kick = state.kick.subscribe();
    state.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Ok(frame) = frame else { break };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            _ = kick.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let frame: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
                        if frame.get("type").and_then(Value::as_str) == Some("ping") {
                            state.pings.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.disconnections.fetch_add(1, Ordering::SeqCst);
}
