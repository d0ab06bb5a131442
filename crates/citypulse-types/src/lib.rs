//! Shared wire types for the CityPulse real-time sync layer.
//!
//! This crate is the single source of truth for every value that crosses
//! the client boundary: inbound envelopes from the simulation server,
//! command requests and responses, and the state published to the
//! rendering layer. Types flow to `TypeScript` via `ts-rs` so the browser
//! dashboard renders exactly what the core stages.
//!
//! # Modules
//!
//! - [`envelope`] -- `{type, data}` envelope, event kinds, outbound frames
//! - [`connection`] -- Observable channel status
//! - [`payloads`] -- Slice payloads (graph, lights, vehicles, incidents, ...)
//! - [`commands`] -- Command actions, parameters, responses, local mirrors
//! - [`notification`] -- Single-slot user feedback messages
//! - [`ids`] -- Server-assigned and client-minted identifiers

pub mod commands;
pub mod connection;
pub mod envelope;
pub mod ids;
pub mod notification;
pub mod payloads;

pub use commands::{
    Command, CommandAction, CommandResponse, CommandStatus, IncidentReport, LightPhase,
    RouteEndpoint, RoutePlan, RoutePlanRequest, SettingsUpdate, SimulationSettings,
    StartSimulation, TrafficLightControl, VehicleAdd,
};
pub use connection::{ConnectionState, ConnectionStatus};
pub use envelope::{ClientFrame, Envelope, EventKind};
pub use ids::{NotificationId, WireId};
pub use notification::{Notification, NotificationKind};
pub use payloads::{
    AnalyticsSummary, CityGraph, CongestionMap, GraphEdge, GraphNode, Incident, RoutePoint,
    SimulationStatus, TrafficLight, Vehicle,
};
