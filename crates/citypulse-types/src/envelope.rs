//! Inbound envelope and outbound control frames of the real-time channel.
//!
//! Every inbound text frame is a JSON object `{ "type": ..., "data": ... }`.
//! The `type` string selects an [`EventKind`]; `data` is the payload of the
//! matching state slice. Unknown types are valid frames and are simply not
//! routed anywhere.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// The unit of inbound transport: a declared type plus an arbitrary payload.
///
/// `data` defaults to `null` when the server omits it (control frames such
/// as `pong` carry no payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Declared event type as sent by the server.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload, decoded later by the handler registered for the type.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    /// Decode an envelope from a raw text frame.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if the frame is not JSON
    /// or lacks a string `type` field.
    pub fn from_frame(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The recognized kind of this envelope, if any.
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_wire(&self.event_type)
    }
}

/// Every event type the client knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Full road network snapshot.
    CityGraph,
    /// List of all traffic lights and their current phase.
    TrafficLights,
    /// List of all vehicles on the network.
    Vehicles,
    /// List of active incidents.
    Incidents,
    /// Congestion level keyed by edge id.
    Congestion,
    /// Aggregate analytics summary.
    Analytics,
    /// Running flag plus an optional user-facing message.
    SimulationStatus,
    /// Keepalive frame (normally client to server).
    Ping,
    /// Keepalive acknowledgement from the server.
    Pong,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::CityGraph,
        Self::TrafficLights,
        Self::Vehicles,
        Self::Incidents,
        Self::Congestion,
        Self::Analytics,
        Self::SimulationStatus,
        Self::Ping,
        Self::Pong,
    ];

    /// The `type` string used on the wire.
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::CityGraph => "city_graph",
            Self::TrafficLights => "traffic_lights",
            Self::Vehicles => "vehicles",
            Self::Incidents => "incidents",
            Self::Congestion => "congestion",
            Self::Analytics => "analytics",
            Self::SimulationStatus => "simulation_status",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }

    /// Parse a wire `type` string. Returns `None` for unknown types.
    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_wire() == value)
    }

    /// Whether this kind is a transport control frame rather than state.
    pub const fn is_control(self) -> bool {
        matches!(self, Self::Ping | Self::Pong)
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Frames the client sends on the real-time channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Heartbeat keeping intermediaries from closing an idle channel.
    Ping,
}

impl ClientFrame {
    /// Encode the frame as JSON text.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if encoding fails.
    pub fn to_text(self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self)
    }
}
