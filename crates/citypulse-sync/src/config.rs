//! Configuration loading and typed config structures for the sync client.
//!
//! Configuration lives in a YAML file (by default `citypulse.yaml`). Every
//! field has a default matching the reference client, so an empty document
//! is a valid configuration. Server URLs and the log level can be
//! overridden through environment variables without editing the file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SyncConfig {
    /// Where the simulation server lives.
    #[serde(default)]
    pub server: ServerConfig,

    /// Real-time channel lifecycle parameters.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Notification display parameters.
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Command channel parameters.
    #[serde(default)]
    pub commands: CommandConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SyncConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `CITYPULSE_WS_URL` overrides `server.ws_url`
    /// - `CITYPULSE_API_URL` overrides `server.api_url`
    /// - `CITYPULSE_ROUTE_API_URL` overrides `server.route_api_url`
    /// - `CITYPULSE_LOG_LEVEL` overrides `logging.level`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override values with `CITYPULSE_*` environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Override values from an arbitrary variable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("CITYPULSE_WS_URL") {
            self.server.ws_url = val;
        }
        if let Some(val) = lookup("CITYPULSE_API_URL") {
            self.server.api_url = val;
        }
        if let Some(val) = lookup("CITYPULSE_ROUTE_API_URL") {
            self.server.route_api_url = Some(val);
        }
        if let Some(val) = lookup("CITYPULSE_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Check that the values describe a usable client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };

        if self.server.ws_url.is_empty() {
            return invalid("server.ws_url must not be empty");
        }
        if self.server.api_url.is_empty() {
            return invalid("server.api_url must not be empty");
        }
        if self.connection.heartbeat_interval_ms == 0 {
            return invalid("connection.heartbeat_interval_ms must be at least 1");
        }
        if self.connection.connect_timeout_ms == 0 {
            return invalid("connection.connect_timeout_ms must be at least 1");
        }
        if self.connection.max_attempts > 0 && self.connection.reconnect_delay_ms == 0 {
            return invalid("connection.reconnect_delay_ms must be at least 1 when retries are enabled");
        }
        if self.connection.max_reconnect_delay_ms < self.connection.reconnect_delay_ms {
            return invalid("connection.max_reconnect_delay_ms must not be below reconnect_delay_ms");
        }
        let heartbeat = self.connection.heartbeat_interval_ms;
        if self
            .connection
            .liveness_timeout_ms
            .is_some_and(|timeout| timeout <= heartbeat)
        {
            return invalid("connection.liveness_timeout_ms must exceed heartbeat_interval_ms");
        }
        if self.notifications.display_ms == 0 {
            return invalid("notifications.display_ms must be at least 1");
        }
        if self.commands.request_timeout_ms == 0 {
            return invalid("commands.request_timeout_ms must be at least 1");
        }
        Ok(())
    }
}

/// Server endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// WebSocket URL of the real-time channel.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Base URL of the command API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL of the route planner, when it runs separately.
    #[serde(default)]
    pub route_api_url: Option<String>,
}

impl ServerConfig {
    /// Base URL used for route planning (falls back to `api_url`).
    pub fn route_base(&self) -> &str {
        self.route_api_url.as_deref().unwrap_or(&self.api_url)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_url: default_api_url(),
            route_api_url: None,
        }
    }
}

/// How the delay between reconnect attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffMode {
    /// Always wait `reconnect_delay_ms`.
    Fixed,
    /// Double the delay per attempt, capped at `max_reconnect_delay_ms`.
    Exponential,
}

/// Real-time channel lifecycle parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// Reconnect attempts before giving up and entering `Failed`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between reconnect attempts.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Upper bound for the delay under exponential backoff.
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Delay growth policy.
    #[serde(default = "default_backoff")]
    pub backoff: BackoffMode,

    /// Interval between heartbeat frames while open.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Bound on one dial, TCP connect plus WebSocket handshake. Expiry
    /// counts as a failed attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Force a reconnect if nothing arrives for this long. Disabled when
    /// absent.
    #[serde(default)]
    pub liveness_timeout_ms: Option<u64>,
}

impl ConnectionConfig {
    /// Heartbeat interval as a [`Duration`].
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Dial bound as a [`Duration`].
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Liveness bound as a [`Duration`], if enabled.
    pub fn liveness_timeout(&self) -> Option<Duration> {
        self.liveness_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            backoff: default_backoff(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            liveness_timeout_ms: None,
        }
    }
}

/// Notification display parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationConfig {
    /// How long a notification stays visible.
    #[serde(default = "default_display_ms")]
    pub display_ms: u64,
}

impl NotificationConfig {
    /// Display duration as a [`Duration`].
    pub const fn display_duration(&self) -> Duration {
        Duration::from_millis(self.display_ms)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            display_ms: default_display_ms(),
        }
    }
}

/// Command channel parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandConfig {
    /// Per-request timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl CommandConfig {
    /// Request timeout as a [`Duration`].
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_ws_url() -> String {
    "ws://localhost:8000/ws".to_owned()
}

fn default_api_url() -> String {
    "http://localhost:8000".to_owned()
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_reconnect_delay_ms() -> u64 {
    1_000
}

const fn default_max_reconnect_delay_ms() -> u64 {
    5_000
}

const fn default_backoff() -> BackoffMode {
    BackoffMode::Fixed
}

const fn default_heartbeat_interval_ms() -> u64 {
    5_000
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

const fn default_display_ms() -> u64 {
    3_000
}

const fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}
