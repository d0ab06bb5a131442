//! Payload types for each state slice pushed over the real-time channel.
//!
//! These mirror what the simulation server emits. Decoding is lenient:
//! unknown fields are ignored and missing fields fall back to their
//! defaults, because the client only stages these values for rendering
//! and never interprets simulation semantics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::WireId;

// ---------------------------------------------------------------------------
// Road network
// ---------------------------------------------------------------------------

/// A geographic point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(default)]
pub struct RoutePoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// An intersection in the city graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(default)]
pub struct GraphNode {
    /// Server-assigned node id (a raw map id on the live server).
    pub id: WireId,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Display name.
    pub name: Option<String>,
    /// Whether more than one road leaves this node.
    pub is_intersection: Option<bool>,
}

/// A directed road segment in the city graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(default)]
pub struct GraphEdge {
    /// Server-assigned edge id (key of the congestion map).
    pub id: String,
    /// Origin node id.
    #[serde(alias = "source")]
    pub source_id: WireId,
    /// Destination node id.
    #[serde(alias = "target")]
    pub target_id: WireId,
    /// Origin latitude.
    pub source_lat: f64,
    /// Origin longitude.
    pub source_lon: f64,
    /// Destination latitude.
    pub target_lat: f64,
    /// Destination longitude.
    pub target_lon: f64,
    /// Street name.
    pub name: Option<String>,
    /// Congestion level embedded in graph snapshots, when present.
    pub congestion: Option<f64>,
}

/// The full road network (`city_graph` slice).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(default)]
pub struct CityGraph {
    /// All intersections.
    pub nodes: Vec<GraphNode>,
    /// All road segments.
    pub edges: Vec<GraphEdge>,
}

// ---------------------------------------------------------------------------
// Traffic, vehicles, incidents
// ---------------------------------------------------------------------------

/// One traffic light as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(default)]
pub struct TrafficLight {
    /// Light id.
    pub id: String,
    /// Intersection the light controls.
    pub node_id: Option<WireId>,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// Current phase (`green`, `yellow`, `red`).
    pub state: String,
    /// Seconds until the next phase change.
    pub next_change: Option<f64>,
    /// Timestamp of the last phase change.
    pub last_change: Option<f64>,
    /// Number of queued vehicles.
    pub queue_length: Option<u32>,
}

/// One vehicle on the network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(default)]
pub struct Vehicle {
    /// Vehicle id.
    pub id: String,
    /// Vehicle class (`car`, `bus`, `truck`, ...).
    #[serde(rename = "type")]
    pub vehicle_type: Option<String>,
    /// Current latitude.
    pub lat: f64,
    /// Current longitude.
    pub lon: f64,
    /// Origin label or node id.
    pub origin: Option<WireId>,
    /// Destination label or node id.
    pub destination: Option<WireId>,
    /// Current speed.
    pub speed: Option<f64>,
    /// Movement status (`moving`, `waiting`, `arrived`).
    pub status: Option<String>,
    /// Estimated time of arrival in milliseconds.
    pub eta: Option<f64>,
    /// Remaining route as a polyline.
    pub current_route: Vec<RoutePoint>,
}

/// An active incident.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(default)]
pub struct Incident {
    /// Incident id, when the server assigns one.
    pub id: Option<String>,
    /// Incident class (`accident`, `congestion`, `roadwork`, ...).
    #[serde(rename = "type")]
    pub incident_type: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// Edge the incident sits on.
    pub edge_id: Option<String>,
    /// When the incident was reported (Unix seconds).
    pub timestamp: Option<f64>,
    /// Expected duration in seconds.
    pub duration: Option<f64>,
    /// When the incident is expected to clear (Unix seconds).
    pub expected_clearance: Option<f64>,
    /// Severity label.
    pub severity: Option<String>,
}

/// Congestion level (0.0 free flow .. 1.0 gridlock) keyed by edge id.
pub type CongestionMap = BTreeMap<String, f64>;

/// Open-ended analytics metrics keyed by metric name.
pub type AnalyticsSummary = BTreeMap<String, serde_json::Value>;

/// Payload of a `simulation_status` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(default)]
pub struct SimulationStatus {
    /// Whether the simulation is currently running.
    pub running: bool,
    /// Optional human-readable message.
    pub message: Option<String>,
    /// Optional severity for the message (`info`, `success`, `error`).
    pub status: Option<String>,
}

impl SimulationStatus {
    /// The user-facing `(message, status)` pair, when both are present.
    pub fn announcement(&self) -> Option<(&str, &str)> {
        match (self.message.as_deref(), self.status.as_deref()) {
            (Some(message), Some(status)) if !message.is_empty() => Some((message, status)),
            _ => None,
        }
    }
}
