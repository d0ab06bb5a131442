//! Observable state of the real-time channel.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle status of the inbound channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Not connected and not trying to be.
    #[default]
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// The channel is up and frames are flowing.
    Open,
    /// Waiting out the delay before the next attempt.
    Reconnecting,
    /// The attempt budget is spent; only a manual connect resumes.
    Failed,
}

impl ConnectionStatus {
    /// Lowercase name used in logs and bindings.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

impl core::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the connection slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ConnectionState {
    /// Current lifecycle status.
    pub status: ConnectionStatus,
    /// Reconnect attempts made since the channel was last open.
    pub attempt: u32,
    /// Most recent transport error, if any.
    pub last_error: Option<String>,
}
