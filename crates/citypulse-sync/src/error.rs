//! Error types for the sync layer.
//!
//! Uses `thiserror` for typed errors. Transport and decode failures on the
//! inbound channel are absorbed into connection state and notifications;
//! only registration mistakes and command outcomes reach callers.

use citypulse_types::{CommandAction, CommandResponse, EventKind};

use crate::config::ConfigError;

/// Errors raised while routing inbound frames.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The frame is not a JSON object with a string `type` field.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// The envelope was recognized but its `data` has the wrong shape.
    #[error("payload for {kind} does not decode: {source}")]
    Payload {
        /// The event kind whose payload failed.
        kind: EventKind,
        /// The underlying decode error.
        source: serde_json::Error,
    },

    /// A handler was registered for a type the client does not know.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// A second handler was registered for the same kind.
    #[error("handler already registered for {0}")]
    DuplicateHandler(EventKind),
}

/// Errors surfaced by the command gateway.
///
/// Every variant names the action so callers and logs can attribute it.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The server answered with `status: error`.
    #[error("{action} rejected: {}", .response.message)]
    Rejected {
        /// The action that was refused.
        action: CommandAction,
        /// The full response body.
        response: CommandResponse,
    },

    /// The request never produced a response (connect, timeout, I/O).
    #[error("{action} failed in transport: {source}")]
    Transport {
        /// The action that failed.
        action: CommandAction,
        /// The underlying HTTP client error.
        source: reqwest::Error,
    },

    /// The response body could not be interpreted.
    #[error("{action} returned an invalid response: {reason}")]
    InvalidResponse {
        /// The action whose response was unusable.
        action: CommandAction,
        /// Explanation of what was wrong.
        reason: String,
    },

    /// The request parameters failed to encode.
    #[error("{action} parameters failed to encode: {source}")]
    Encode {
        /// The action whose body failed.
        action: CommandAction,
        /// The underlying encode error.
        source: serde_json::Error,
    },
}

impl CommandError {
    /// The action this error belongs to.
    pub const fn action(&self) -> CommandAction {
        match self {
            Self::Rejected { action, .. }
            | Self::Transport { action, .. }
            | Self::InvalidResponse { action, .. }
            | Self::Encode { action, .. } => *action,
        }
    }

    /// The message shown to the user for this failure.
    ///
    /// Server rejections use the server's own message when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { action, response } if response.message.trim().is_empty() => {
                format!("Failed to {action}")
            }
            Self::Rejected { response, .. } => response.message.clone(),
            Self::Transport { action, .. } | Self::InvalidResponse { action, .. } => {
                format!("Failed to {action}: server unreachable")
            }
            Self::Encode { action, .. } => format!("Failed to {action}: invalid parameters"),
        }
    }
}

/// Session-level errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Handler registration failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// The connection task is no longer running.
    #[error("connection manager has stopped")]
    ManagerStopped,
}
