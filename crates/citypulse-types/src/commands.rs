//! Command requests and responses for the request/response channel.
//!
//! A command is a one-shot action distinct from the continuous inbound
//! stream. Each [`Command`] serializes to the JSON body its endpoint
//! expects; every endpoint answers with a [`CommandResponse`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::WireId;
use crate::payloads::RoutePoint;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// The set of discrete actions the client can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    /// Start the simulation for a city.
    StartSimulation,
    /// Stop the running simulation.
    StopSimulation,
    /// Report an incident at a location.
    ReportIncident,
    /// Change one or more simulation settings.
    UpdateSettings,
    /// Force a traffic light into a phase.
    ControlTrafficLight,
    /// Inject a vehicle between two points.
    AddVehicle,
    /// Ask the router for a route between two coordinates.
    PlanRoute,
    /// Fetch the current analytics summary.
    RefreshAnalytics,
}

impl CommandAction {
    /// Endpoint path, relative to the API base URL.
    pub const fn path(self) -> &'static str {
        match self {
            Self::StartSimulation => "/simulation/start",
            Self::StopSimulation => "/simulation/stop",
            Self::ReportIncident => "/incidents/add",
            Self::UpdateSettings => "/simulation/settings",
            Self::ControlTrafficLight => "/traffic_lights/control",
            Self::AddVehicle => "/vehicles/add",
            Self::PlanRoute => "/route/plan",
            Self::RefreshAnalytics => "/analytics",
        }
    }

    /// Short human-readable label used in fallback messages.
    pub const fn label(self) -> &'static str {
        match self {
            Self::StartSimulation => "start simulation",
            Self::StopSimulation => "stop simulation",
            Self::ReportIncident => "report incident",
            Self::UpdateSettings => "update settings",
            Self::ControlTrafficLight => "control traffic light",
            Self::AddVehicle => "add vehicle",
            Self::PlanRoute => "plan route",
            Self::RefreshAnalytics => "refresh analytics",
        }
    }

    /// Whether the action is a read (`GET`) rather than a mutation (`POST`).
    pub const fn is_read(self) -> bool {
        matches!(self, Self::RefreshAnalytics)
    }
}

impl core::fmt::Display for CommandAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Parameters for [`CommandAction::StartSimulation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StartSimulation {
    /// City to simulate.
    pub city: String,
    /// Simulation speed multiplier.
    pub speed: f64,
    /// Routing algorithm name (e.g. `a_star`).
    pub routing_algorithm: String,
    /// Traffic light mode (`auto` or `manual`).
    pub traffic_light_mode: String,
}

impl StartSimulation {
    /// Start parameters for `city` with the server's default settings.
    pub fn for_city(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            speed: 1.0,
            routing_algorithm: "a_star".to_owned(),
            traffic_light_mode: "auto".to_owned(),
        }
    }
}

/// Parameters for [`CommandAction::ReportIncident`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IncidentReport {
    /// Latitude of the incident.
    pub lat: f64,
    /// Longitude of the incident.
    pub lon: f64,
    /// Incident class.
    #[serde(rename = "type")]
    pub incident_type: String,
}

/// Parameters for [`CommandAction::UpdateSettings`]. Absent fields are left
/// unchanged by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SettingsUpdate {
    /// New speed multiplier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// New routing algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_algorithm: Option<String>,
    /// New traffic light mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_light_mode: Option<String>,
}

impl SettingsUpdate {
    /// Whether the update carries no field at all.
    pub const fn is_empty(&self) -> bool {
        self.speed.is_none() && self.routing_algorithm.is_none() && self.traffic_light_mode.is_none()
    }
}

/// Traffic light phase requested through manual control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum LightPhase {
    /// Go.
    Green,
    /// Prepare to stop.
    Yellow,
    /// Stop.
    Red,
}

/// Parameters for [`CommandAction::ControlTrafficLight`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TrafficLightControl {
    /// Intersection whose light is forced, as the server reported it.
    pub node_id: WireId,
    /// Requested phase.
    pub state: LightPhase,
}

/// Parameters for [`CommandAction::AddVehicle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VehicleAdd {
    /// Origin node id; the server picks one when absent.
    pub origin: Option<String>,
    /// Destination node id; the server picks one when absent.
    pub destination: Option<String>,
    /// Vehicle class.
    #[serde(rename = "type")]
    pub vehicle_type: String,
}

/// Parameters for [`CommandAction::PlanRoute`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RoutePlanRequest {
    /// Origin latitude.
    pub origin_lat: f64,
    /// Origin longitude.
    pub origin_lon: f64,
    /// Destination latitude.
    pub destination_lat: f64,
    /// Destination longitude.
    pub destination_lon: f64,
}

/// A command with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// See [`CommandAction::StartSimulation`].
    StartSimulation(StartSimulation),
    /// See [`CommandAction::StopSimulation`].
    StopSimulation,
    /// See [`CommandAction::ReportIncident`].
    ReportIncident(IncidentReport),
    /// See [`CommandAction::UpdateSettings`].
    UpdateSettings(SettingsUpdate),
    /// See [`CommandAction::ControlTrafficLight`].
    ControlTrafficLight(TrafficLightControl),
    /// See [`CommandAction::AddVehicle`].
    AddVehicle(VehicleAdd),
    /// See [`CommandAction::PlanRoute`].
    PlanRoute(RoutePlanRequest),
    /// See [`CommandAction::RefreshAnalytics`].
    RefreshAnalytics,
}

impl Command {
    /// The action this command performs.
    pub const fn action(&self) -> CommandAction {
        match self {
            Self::StartSimulation(_) => CommandAction::StartSimulation,
            Self::StopSimulation => CommandAction::StopSimulation,
            Self::ReportIncident(_) => CommandAction::ReportIncident,
            Self::UpdateSettings(_) => CommandAction::UpdateSettings,
            Self::ControlTrafficLight(_) => CommandAction::ControlTrafficLight,
            Self::AddVehicle(_) => CommandAction::AddVehicle,
            Self::PlanRoute(_) => CommandAction::PlanRoute,
            Self::RefreshAnalytics => CommandAction::RefreshAnalytics,
        }
    }

    /// The JSON request body, or `None` for body-less actions.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if a parameter fails to
    /// encode (for example a non-finite float).
    pub fn body(&self) -> Result<Option<serde_json::Value>, serde_json::Error> {
        let body = match self {
            Self::StartSimulation(params) => serde_json::to_value(params)?,
            Self::ReportIncident(params) => serde_json::to_value(params)?,
            Self::UpdateSettings(params) => serde_json::to_value(params)?,
            Self::ControlTrafficLight(params) => serde_json::to_value(params)?,
            Self::AddVehicle(params) => serde_json::to_value(params)?,
            Self::PlanRoute(params) => serde_json::to_value(params)?,
            Self::StopSimulation | Self::RefreshAnalytics => return Ok(None),
        };
        Ok(Some(body))
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Outcome flag of a command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    /// The server applied the command.
    Success,
    /// The server refused or failed to apply the command.
    Error,
}

/// Structured response to a command.
///
/// Action-specific fields (`vehicle_id`, `route`, ...) are collected into
/// [`data`](Self::data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Whether the command succeeded.
    pub status: CommandStatus,
    /// Human-readable outcome message.
    #[serde(default)]
    pub message: String,
    /// Remaining action-specific fields.
    #[serde(flatten)]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl CommandResponse {
    /// Whether the response reports success.
    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Success
    }

    /// Decode an action-specific field.
    ///
    /// Returns `None` if the field is absent or has an unexpected shape.
    pub fn field<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Endpoint descriptor returned inside a [`RoutePlan`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(default)]
pub struct RouteEndpoint {
    /// Nearest graph node id.
    pub node_id: Option<WireId>,
    /// Nearest graph node name.
    pub node_name: Option<String>,
    /// Snapped latitude.
    pub lat: Option<f64>,
    /// Snapped longitude.
    pub lon: Option<f64>,
}

/// Route description returned by [`CommandAction::PlanRoute`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(default)]
pub struct RoutePlan {
    /// Polyline from origin to destination.
    pub route: Vec<RoutePoint>,
    /// Snapped origin.
    pub origin: Option<RouteEndpoint>,
    /// Snapped destination.
    pub destination: Option<RouteEndpoint>,
    /// Estimated travel time.
    pub travel_time_minutes: Option<f64>,
    /// Route length.
    pub distance_km: Option<f64>,
    /// Average congestion along the route (0.0 .. 1.0).
    pub congestion_factor: Option<f64>,
}

// ---------------------------------------------------------------------------
// Local mirrors
// ---------------------------------------------------------------------------

/// Client-side mirror of the settings the server confirmed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationSettings {
    /// City passed to the last successful start.
    pub city: Option<String>,
    /// Speed multiplier.
    pub speed: Option<f64>,
    /// Routing algorithm.
    pub routing_algorithm: Option<String>,
    /// Traffic light mode.
    pub traffic_light_mode: Option<String>,
}

impl SimulationSettings {
    /// Settings in effect after a confirmed start.
    pub fn from_start(params: &StartSimulation) -> Self {
        Self {
            city: Some(params.city.clone()),
            speed: Some(params.speed),
            routing_algorithm: Some(params.routing_algorithm.clone()),
            traffic_light_mode: Some(params.traffic_light_mode.clone()),
        }
    }

    /// Merge a confirmed partial update; absent fields keep their value.
    pub fn merge(&mut self, update: &SettingsUpdate) {
        if let Some(speed) = update.speed {
            self.speed = Some(speed);
        }
        if let Some(algorithm) = &update.routing_algorithm {
            self.routing_algorithm = Some(algorithm.clone());
        }
        if let Some(mode) = &update.traffic_light_mode {
            self.traffic_light_mode = Some(mode.clone());
        }
    }
}
