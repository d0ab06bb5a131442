//! Request/response command channel.
//!
//! Every command is a single HTTP request with no automatic retry. The
//! response body is decoded whatever the HTTP status, because the server
//! reports failures as `{status: "error", message}` with a 4xx/5xx code.
//!
//! Outcome rules:
//! - success: the relevant slice is updated, then a success notification
//!   is shown using the server's message.
//! - error or transport failure: no slice is touched and an error
//!   notification is shown.
//!
//! Commands never consult the inbound channel, so they work while it is
//! reconnecting.

use citypulse_types::{
    AnalyticsSummary, Command, CommandAction, CommandResponse, CommandStatus, IncidentReport,
    NotificationKind, RoutePlan, RoutePlanRequest, SettingsUpdate, SimulationSettings,
    StartSimulation, TrafficLightControl, VehicleAdd,
};

use crate::config::{CommandConfig, ServerConfig};
use crate::error::{CommandError, SyncError};
use crate::notification::NotificationCenter;
use crate::store::StateStore;

/// Issues commands and applies their confirmed effects.
#[derive(Debug, Clone)]
pub struct CommandGateway {
    client: reqwest::Client,
    api_url: String,
    route_url: String,
    store: StateStore,
    notifications: NotificationCenter,
}

impl CommandGateway {
    /// Build a gateway writing to `store` and `notifications`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::HttpClient`] if the HTTP client cannot be
    /// constructed (for example, no TLS backend).
    pub fn new(
        server: &ServerConfig,
        commands: &CommandConfig,
        store: StateStore,
        notifications: NotificationCenter,
    ) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(commands.request_timeout())
            .build()
            .map_err(SyncError::HttpClient)?;
        Ok(Self {
            client,
            api_url: server.api_url.trim_end_matches('/').to_owned(),
            route_url: server.route_base().trim_end_matches('/').to_owned(),
            store,
            notifications,
        })
    }

    /// Send one command and apply its outcome.
    ///
    /// On success the response is returned after the store is updated and
    /// a success notification is shown. On failure the store is unchanged,
    /// an error notification is shown, and the error is returned.
    pub async fn send(&self, command: &Command) -> Result<CommandResponse, CommandError> {
        let action = command.action();
        tracing::debug!(%action, "sending command");

        match self.execute(command).await {
            Ok(response) => {
                self.apply_success(command, &response);
                let message = success_message(action, &response);
                tracing::info!(%action, message = %message, "command succeeded");
                self.notifications.show(message, NotificationKind::Success);
                Ok(response)
            }
            Err(err) => {
                tracing::warn!(%action, error = %err, "command failed");
                self.notifications.show(err.user_message(), NotificationKind::Error);
                Err(err)
            }
        }
    }

    /// Start the simulation. Sets the running flag and the settings mirror.
    pub async fn start_simulation(
        &self,
        params: StartSimulation,
    ) -> Result<CommandResponse, CommandError> {
        self.send(&Command::StartSimulation(params)).await
    }

    /// Stop the simulation. Clears the running flag.
    pub async fn stop_simulation(&self) -> Result<CommandResponse, CommandError> {
        self.send(&Command::StopSimulation).await
    }

    /// Report an incident. The incident itself arrives on the inbound
    /// channel.
    pub async fn report_incident(
        &self,
        report: IncidentReport,
    ) -> Result<CommandResponse, CommandError> {
        self.send(&Command::ReportIncident(report)).await
    }

    /// Change simulation settings. Confirmed fields are merged into the
    /// settings mirror.
    pub async fn update_settings(
        &self,
        update: SettingsUpdate,
    ) -> Result<CommandResponse, CommandError> {
        self.send(&Command::UpdateSettings(update)).await
    }

    /// Force a traffic light phase and record it as manually controlled.
    pub async fn control_traffic_light(
        &self,
        control: TrafficLightControl,
    ) -> Result<CommandResponse, CommandError> {
        self.send(&Command::ControlTrafficLight(control)).await
    }

    /// Add a vehicle. The assigned id is in the response's `vehicle_id`
    /// field; the vehicle itself arrives on the inbound channel.
    pub async fn add_vehicle(&self, vehicle: VehicleAdd) -> Result<CommandResponse, CommandError> {
        self.send(&Command::AddVehicle(vehicle)).await
    }

    /// Plan a route. The plan goes back to the caller and is not stored.
    pub async fn plan_route(&self, request: RoutePlanRequest) -> Result<RoutePlan, CommandError> {
        let response = self.send(&Command::PlanRoute(request)).await?;
        decode_route(&response)
    }

    /// Fetch the analytics summary and replace the analytics slice.
    pub async fn refresh_analytics(&self) -> Result<AnalyticsSummary, CommandError> {
        let response = self.send(&Command::RefreshAnalytics).await?;
        Ok(response.data)
    }

    fn url_for(&self, action: CommandAction) -> String {
        let base = if action == CommandAction::PlanRoute {
            &self.route_url
        } else {
            &self.api_url
        };
        format!("{base}{}", action.path())
    }

    async fn execute(&self, command: &Command) -> Result<CommandResponse, CommandError> {
        let action = command.action();
        let body = command
            .body()
            .map_err(|source| CommandError::Encode { action, source })?;
        let url = self.url_for(action);

        let request = if action.is_read() {
            self.client.get(&url)
        } else {
            let request = self.client.post(&url);
            match &body {
                Some(body) => request.json(body),
                None => request,
            }
        };

        let response = request
            .send()
            .await
            .map_err(|source| CommandError::Transport { action, source })?;
        let http_status = response.status();
        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| CommandError::InvalidResponse {
                    action,
                    reason: format!("HTTP {http_status}: {e}"),
                })?;

        let response = decode_response(action, body)?;
        if !response.is_success() {
            return Err(CommandError::Rejected { action, response });
        }
        if action == CommandAction::PlanRoute {
            decode_route(&response)?;
        }
        Ok(response)
    }

    fn apply_success(&self, command: &Command, response: &CommandResponse) {
        match command {
            Command::StartSimulation(params) => {
                self.store.running().replace(true);
                self.store
                    .settings()
                    .replace(SimulationSettings::from_start(params));
            }
            Command::StopSimulation => self.store.running().replace(false),
            Command::UpdateSettings(update) => {
                if !update.is_empty() {
                    self.store.settings().modify(|settings| settings.merge(update));
                }
            }
            Command::ControlTrafficLight(control) => {
                self.store.manual_lights().modify(|lights| {
                    lights.insert(control.node_id.to_string(), control.state);
                });
            }
            Command::RefreshAnalytics => self.store.analytics().replace(response.data.clone()),
            Command::ReportIncident(_) | Command::AddVehicle(_) | Command::PlanRoute(_) => {}
        }
    }
}

/// Interpret a response body for `action`.
///
/// The analytics endpoint answers with the bare summary on success, so any
/// object without `status: "error"` is wrapped as a success.
fn decode_response(
    action: CommandAction,
    body: serde_json::Value,
) -> Result<CommandResponse, CommandError> {
    let invalid = |e: serde_json::Error| CommandError::InvalidResponse {
        action,
        reason: e.to_string(),
    };

    let reports_error = body.get("status").and_then(serde_json::Value::as_str) == Some("error");
    if action == CommandAction::RefreshAnalytics && !reports_error {
        let data: AnalyticsSummary = serde_json::from_value(body).map_err(invalid)?;
        return Ok(CommandResponse {
            status: CommandStatus::Success,
            message: String::new(),
            data,
        });
    }

    serde_json::from_value(body).map_err(invalid)
}

fn decode_route(response: &CommandResponse) -> Result<RoutePlan, CommandError> {
    response
        .field::<RoutePlan>("route")
        .ok_or_else(|| CommandError::InvalidResponse {
            action: CommandAction::PlanRoute,
            reason: "response has no decodable route".to_owned(),
        })
}

fn success_message(action: CommandAction, response: &CommandResponse) -> String {
    if !response.message.trim().is_empty() {
        return response.message.clone();
    }
    let fallback = match action {
        CommandAction::StartSimulation => "Simulation started",
        CommandAction::StopSimulation => "Simulation stopped",
        CommandAction::ReportIncident => "Incident reported",
        CommandAction::UpdateSettings => "Simulation settings updated",
        CommandAction::ControlTrafficLight => "Traffic light updated",
        CommandAction::AddVehicle => "Vehicle added",
        CommandAction::PlanRoute => "Route planned successfully",
        CommandAction::RefreshAnalytics => "Analytics refreshed",
    };
    fallback.to_owned()
}
