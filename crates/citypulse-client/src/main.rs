//! Headless client entry point for CityPulse.
//!
//! Opens one sync session against the configured simulation server and
//! logs every change to the connection state, the running flag, the
//! notification slot, and the data slices. Runs until Ctrl-C, then tears
//! the session down cleanly.
//!
//! # Configuration
//!
//! The YAML file named by `CITYPULSE_CONFIG` (default `citypulse.yaml`)
//! is loaded if present; otherwise built-in defaults apply. `CITYPULSE_*`
//! environment variables override either.

use std::path::PathBuf;

use citypulse_sync::SyncSession;
use citypulse_sync::config::{ConfigError, LogFormat, LoggingConfig, SyncConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Config file used when `CITYPULSE_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "citypulse.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the session cannot be
/// built, or the Ctrl-C handler cannot be installed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, source) = load_config()?;
    init_logging(&config.logging);

    info!(
        config = source.as_deref().unwrap_or("defaults"),
        ws_url = %config.server.ws_url,
        api_url = %config.server.api_url,
        max_attempts = config.connection.max_attempts,
        heartbeat_interval_ms = config.connection.heartbeat_interval_ms,
        "citypulse-client starting"
    );

    let session = SyncSession::init_with(&config, |dispatcher| {
        dispatcher.register_handler("pong", |_| tracing::trace!("pong received"))
    })?;
    let watchers = spawn_watchers(&session);
    session.connect()?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    for watcher in watchers {
        watcher.abort();
    }
    session.teardown().await;
    info!("citypulse-client stopped");
    Ok(())
}

/// Load the config file if it exists, otherwise defaults.
///
/// Returns the path actually read, for logging once tracing is up.
fn load_config() -> Result<(SyncConfig, Option<String>), ConfigError> {
    let path = std::env::var("CITYPULSE_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        let config = SyncConfig::from_file(&path)?;
        Ok((config, Some(path.display().to_string())))
    } else {
        Ok((SyncConfig::parse("")?, None))
    }
}

/// Initialize structured logging. `RUST_LOG` wins over the config level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match config.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

// ---------------------------------------------------------------------------
// Slice watchers
// ---------------------------------------------------------------------------

fn spawn_watchers(session: &SyncSession) -> Vec<JoinHandle<()>> {
    let store = session.store();
    vec![
        log_changes(store.connection().subscribe(), |state| {
            info!(
                status = %state.status,
                attempt = state.attempt,
                last_error = state.last_error.as_deref().unwrap_or(""),
                "connection"
            );
        }),
        log_changes(store.running().subscribe(), |running| {
            info!(running = *running, "simulation");
        }),
        log_changes(session.notifications().subscribe(), |slot| {
            if let Some(n) = slot.as_ref().filter(|n| n.visible) {
                info!(kind = ?n.kind, message = %n.message, "notification");
            }
        }),
        log_changes(store.graph().subscribe(), |graph| {
            if let Some(graph) = graph {
                info!(nodes = graph.nodes.len(), edges = graph.edges.len(), "city graph");
            }
        }),
        log_changes(store.vehicles().subscribe(), |vehicles| {
            debug!(count = vehicles.len(), "vehicles");
        }),
        log_changes(store.traffic_lights().subscribe(), |lights| {
            debug!(count = lights.len(), "traffic lights");
        }),
        log_changes(store.incidents().subscribe(), |incidents| {
            debug!(count = incidents.len(), "incidents");
        }),
        log_changes(store.congestion().subscribe(), |congestion| {
            debug!(edges = congestion.len(), "congestion");
        }),
        log_changes(store.analytics().subscribe(), |analytics| {
            debug!(metrics = analytics.len(), "analytics");
        }),
    ]
}

/// Log every value a watch channel takes until its sender goes away.
fn log_changes<T, F>(mut rx: watch::Receiver<T>, log: F) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
    F: Fn(&T) + Send + 'static,
{
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            log(&rx.borrow_and_update());
        }
    })
}
