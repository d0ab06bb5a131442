//! Identifier types.
//!
//! [`WireId`] carries ids the simulation server assigns. The server keys
//! graph nodes by their raw map ids (integers) and most other entities by
//! strings, so a wire id accepts either and serializes back in the form it
//! arrived in. [`NotificationId`] is minted client-side.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// A server-assigned id, numeric or textual.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(untagged)]
pub enum WireId {
    /// Integer id, as used for map nodes.
    Number(#[ts(type = "number")] i64),
    /// Opaque string id.
    Text(String),
}

impl Default for WireId {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl core::fmt::Display for WireId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for WireId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<String> for WireId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for WireId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

/// Identifier of a single shown notification (UUID v7).
///
/// Lets a close action target the notification it was rendered for, so a
/// late click never hides a newer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NotificationId(Uuid);

impl NotificationId {
    /// A fresh, time-ordered id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}
