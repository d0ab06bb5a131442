//! Reactive state slices published to the rendering layer.
//!
//! Each slice is a `tokio::sync::watch` channel. Writers replace the whole
//! value; readers either take a snapshot with [`Slice::get`] or await
//! changes on a [`Slice::subscribe`] receiver. Only this crate can write,
//! so the rendering layer can observe but never mutate.
//!
//! Inbound frames write through the handlers installed by
//! [`StateStore::install_handlers`]. Each handler touches exactly one
//! slice and never reads the previous value.

use std::collections::BTreeMap;
use std::sync::Arc;

use citypulse_types::{
    AnalyticsSummary, CityGraph, CongestionMap, ConnectionState, EventKind, Incident, LightPhase,
    NotificationKind, SimulationSettings, SimulationStatus, TrafficLight, Vehicle,
};
use serde::Serialize;
use tokio::sync::watch;

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::notification::NotificationCenter;

/// One named, observable region of client state.
#[derive(Debug)]
pub struct Slice<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> Slice<T> {
    fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// A copy of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// A receiver notified on every replacement.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Replace the whole value.
    pub(crate) fn replace(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Edit the value in place and notify subscribers.
    pub(crate) fn modify(&self, edit: impl FnOnce(&mut T)) {
        self.tx.send_modify(edit);
    }
}

/// Requested phase per node for lights under manual control, keyed by
/// the node id's display form.
pub type ManualLights = BTreeMap<String, LightPhase>;

#[derive(Debug)]
struct Slices {
    graph: Slice<Option<CityGraph>>,
    traffic_lights: Slice<Vec<TrafficLight>>,
    vehicles: Slice<Vec<Vehicle>>,
    incidents: Slice<Vec<Incident>>,
    congestion: Slice<CongestionMap>,
    analytics: Slice<AnalyticsSummary>,
    connection: Slice<ConnectionState>,
    running: Slice<bool>,
    settings: Slice<SimulationSettings>,
    manual_lights: Slice<ManualLights>,
}

/// The set of state slices for one session.
///
/// Cloning is cheap and every clone sees the same slices.
#[derive(Debug, Clone)]
pub struct StateStore {
    slices: Arc<Slices>,
}

/// A point-in-time copy of every slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreSnapshot {
    /// Road network.
    pub graph: Option<CityGraph>,
    /// Traffic lights.
    pub traffic_lights: Vec<TrafficLight>,
    /// Vehicles.
    pub vehicles: Vec<Vehicle>,
    /// Incidents.
    pub incidents: Vec<Incident>,
    /// Congestion by edge.
    pub congestion: CongestionMap,
    /// Analytics summary.
    pub analytics: AnalyticsSummary,
    /// Connection state.
    pub connection: ConnectionState,
    /// Running flag.
    pub running: bool,
    /// Confirmed settings.
    pub settings: SimulationSettings,
    /// Manual light record.
    pub manual_lights: ManualLights,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// A store with every slice empty and the connection idle.
    pub fn new() -> Self {
        Self {
            slices: Arc::new(Slices {
                graph: Slice::new(None),
                traffic_lights: Slice::new(Vec::new()),
                vehicles: Slice::new(Vec::new()),
                incidents: Slice::new(Vec::new()),
                congestion: Slice::new(CongestionMap::new()),
                analytics: Slice::new(AnalyticsSummary::new()),
                connection: Slice::new(ConnectionState::default()),
                running: Slice::new(false),
                settings: Slice::new(SimulationSettings::default()),
                manual_lights: Slice::new(ManualLights::new()),
            }),
        }
    }

    /// Road network, once the server has sent it.
    pub fn graph(&self) -> &Slice<Option<CityGraph>> {
        &self.slices.graph
    }

    /// Traffic lights and their phases.
    pub fn traffic_lights(&self) -> &Slice<Vec<TrafficLight>> {
        &self.slices.traffic_lights
    }

    /// Vehicles on the network.
    pub fn vehicles(&self) -> &Slice<Vec<Vehicle>> {
        &self.slices.vehicles
    }

    /// Active incidents.
    pub fn incidents(&self) -> &Slice<Vec<Incident>> {
        &self.slices.incidents
    }

    /// Congestion level by edge id.
    pub fn congestion(&self) -> &Slice<CongestionMap> {
        &self.slices.congestion
    }

    /// Analytics summary.
    pub fn analytics(&self) -> &Slice<AnalyticsSummary> {
        &self.slices.analytics
    }

    /// State of the inbound channel.
    pub fn connection(&self) -> &Slice<ConnectionState> {
        &self.slices.connection
    }

    /// Whether the simulation is running.
    pub fn running(&self) -> &Slice<bool> {
        &self.slices.running
    }

    /// Settings the server has confirmed.
    pub fn settings(&self) -> &Slice<SimulationSettings> {
        &self.slices.settings
    }

    /// Lights the user has put under manual control.
    pub fn manual_lights(&self) -> &Slice<ManualLights> {
        &self.slices.manual_lights
    }

    /// Copy every slice.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            graph: self.graph().get(),
            traffic_lights: self.traffic_lights().get(),
            vehicles: self.vehicles().get(),
            incidents: self.incidents().get(),
            congestion: self.congestion().get(),
            analytics: self.analytics().get(),
            connection: self.connection().get(),
            running: self.running().get(),
            settings: self.settings().get(),
            manual_lights: self.manual_lights().get(),
        }
    }

    /// Register one handler per inbound slice type on `dispatcher`.
    ///
    /// `simulation_status` frames that carry both a message and a status
    /// also show a notification.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicateHandler`] if `dispatcher` already
    /// handles one of these types.
    pub fn install_handlers(
        &self,
        dispatcher: &mut Dispatcher,
        notifications: &NotificationCenter,
    ) -> Result<(), DispatchError> {
        let store = self.clone();
        dispatcher.register(EventKind::CityGraph, move |graph: CityGraph| {
            tracing::info!(
                nodes = graph.nodes.len(),
                edges = graph.edges.len(),
                "city graph received"
            );
            store.graph().replace(Some(graph));
        })?;

        let store = self.clone();
        dispatcher.register(EventKind::TrafficLights, move |lights: Vec<TrafficLight>| {
            store.traffic_lights().replace(lights);
        })?;

        let store = self.clone();
        dispatcher.register(EventKind::Vehicles, move |vehicles: Vec<Vehicle>| {
            store.vehicles().replace(vehicles);
        })?;

        let store = self.clone();
        dispatcher.register(EventKind::Incidents, move |incidents: Vec<Incident>| {
            store.incidents().replace(incidents);
        })?;

        let store = self.clone();
        dispatcher.register(EventKind::Congestion, move |congestion: CongestionMap| {
            store.congestion().replace(congestion);
        })?;

        let store = self.clone();
        dispatcher.register(EventKind::Analytics, move |analytics: AnalyticsSummary| {
            store.analytics().replace(analytics);
        })?;

        let store = self.clone();
        let notifications = notifications.clone();
        dispatcher.register(EventKind::SimulationStatus, move |status: SimulationStatus| {
            store.running().replace(status.running);
            if let Some((message, kind)) = status.announcement() {
                notifications.show(message, NotificationKind::from_status(kind));
            }
        })?;

        Ok(())
    }
}
