//! Transient user-facing feedback messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::NotificationId;

/// Visual tone of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Neutral information.
    Info,
    /// A confirmed positive outcome.
    Success,
    /// A failure the user should know about.
    Error,
}

impl NotificationKind {
    /// Map a server-provided status string to a kind.
    ///
    /// Unrecognized values are shown as [`NotificationKind::Info`].
    pub fn from_status(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }
}

/// A notification occupying the single display slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Notification {
    /// Identity of this particular showing.
    pub id: NotificationId,
    /// Text to display.
    pub message: String,
    /// Visual tone.
    pub kind: NotificationKind,
    /// Whether the notification is currently displayed.
    pub visible: bool,
    /// Wall-clock time at which it hides automatically.
    pub expires_at: DateTime<Utc>,
}
