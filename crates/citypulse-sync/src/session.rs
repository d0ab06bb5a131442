//! Explicit session lifecycle.
//!
//! A [`SyncSession`] owns one state store, one notification slot, one
//! connection task, and one command gateway. Nothing is global: the
//! rendering layer receives the session (or clones of its store and
//! gateway) and the session ends with [`SyncSession::teardown`].

use citypulse_types::ConnectionState;

use crate::config::SyncConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, SyncError};
use crate::gateway::CommandGateway;
use crate::manager::ConnectionManager;
use crate::notification::NotificationCenter;
use crate::store::StateStore;

/// One client session against one simulation server.
#[derive(Debug)]
pub struct SyncSession {
    store: StateStore,
    notifications: NotificationCenter,
    gateway: CommandGateway,
    manager: ConnectionManager,
}

impl SyncSession {
    /// Build a session with the standard slice handlers.
    ///
    /// The connection starts `Idle`; call [`connect`](Self::connect) to
    /// open it. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::HttpClient`] if the command client cannot be
    /// built.
    pub fn init(config: &SyncConfig) -> Result<Self, SyncError> {
        Self::init_with(config, |_| Ok(()))
    }

    /// Build a session, letting `extra` register handlers for types the
    /// store does not consume (for example `pong`).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Dispatch`] if `extra` fails or registers a
    /// type the store already handles, or [`SyncError::HttpClient`] if the
    /// command client cannot be built.
    pub fn init_with<F>(config: &SyncConfig, extra: F) -> Result<Self, SyncError>
    where
        F: FnOnce(&mut Dispatcher) -> Result<(), DispatchError>,
    {
        let store = StateStore::new();
        let notifications = NotificationCenter::new(config.notifications.display_duration());

        let mut dispatcher = Dispatcher::new();
        store.install_handlers(&mut dispatcher, &notifications)?;
        extra(&mut dispatcher)?;

        let gateway = CommandGateway::new(
            &config.server,
            &config.commands,
            store.clone(),
            notifications.clone(),
        )?;
        let manager = ConnectionManager::spawn(
            config.server.ws_url.clone(),
            &config.connection,
            dispatcher,
            store.clone(),
            notifications.clone(),
        );

        tracing::info!(
            ws_url = %config.server.ws_url,
            api_url = %config.server.api_url,
            "sync session initialized"
        );

        Ok(Self {
            store,
            notifications,
            gateway,
            manager,
        })
    }

    /// State slices for the rendering layer.
    pub const fn store(&self) -> &StateStore {
        &self.store
    }

    /// The notification slot.
    pub const fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// The command gateway. Clone it to issue commands from other tasks.
    pub const fn gateway(&self) -> &CommandGateway {
        &self.gateway
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Open (or reopen after `Failed`) the real-time channel.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ManagerStopped`] if the connection task exited.
    pub fn connect(&self) -> Result<(), SyncError> {
        self.manager.connect()
    }

    /// Close the real-time channel and cancel pending reconnects.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ManagerStopped`] if the connection task exited.
    pub fn disconnect(&self) -> Result<(), SyncError> {
        self.manager.disconnect()
    }

    /// End the session: stop the connection task and cancel the pending
    /// notification hide.
    pub async fn teardown(self) {
        self.manager.shutdown().await;
        self.notifications.shutdown();
        tracing::info!("sync session torn down");
    }
}
