//! Connection lifecycle state machine.
//!
//! The machine is pure: it consumes [`ConnectionEvent`]s and yields at most
//! one [`Transition`] per event. It never touches sockets or timers. The
//! [`manager`](crate::manager) task feeds it transport events and acts on
//! the resulting status. Keeping the rules here lets every sequence of
//! open, error, and close events be exercised without a network.
//!
//! ```text
//! Idle --connect--> Connecting --opened--> Open
//!                    |    ^                  |
//!               lost |    | retry elapsed    | lost
//!                    v    |                  v
//!                  Reconnecting <------------+
//!                    |
//!                    +--budget spent--> Failed --connect--> Connecting
//! ```

use std::time::Duration;

use citypulse_types::{ConnectionState, ConnectionStatus, NotificationKind};

use crate::retry::ReconnectPolicy;

/// Inputs to the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The user asked to connect.
    ConnectRequested,
    /// The transport finished its handshake.
    TransportOpened,
    /// The transport errored or closed.
    TransportLost {
        /// Description of the failure.
        error: String,
    },
    /// The reconnect delay has elapsed.
    RetryElapsed,
    /// The user asked to disconnect.
    DisconnectRequested,
}

impl ConnectionEvent {
    /// Short name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConnectRequested => "connect_requested",
            Self::TransportOpened => "transport_opened",
            Self::TransportLost { .. } => "transport_lost",
            Self::RetryElapsed => "retry_elapsed",
            Self::DisconnectRequested => "disconnect_requested",
        }
    }
}

/// The user-facing summary attached to a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Text to show.
    pub message: String,
    /// Visual tone.
    pub kind: NotificationKind,
}

impl Notice {
    fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

/// A status change produced by [`ConnectionMachine::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Status before the event.
    pub from: ConnectionStatus,
    /// Full state after the event.
    pub state: ConnectionState,
    /// Exactly one notification per transition.
    pub notice: Notice,
}

/// The connection state machine.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    policy: ReconnectPolicy,
}

impl ConnectionMachine {
    /// A machine in `Idle` governed by `policy`.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::default(),
            policy,
        }
    }

    /// Current state.
    pub const fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Current status.
    pub const fn status(&self) -> ConnectionStatus {
        self.state.status
    }

    /// The reconnect policy in force.
    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Delay before the pending reconnect attempt.
    pub fn retry_delay(&self) -> Duration {
        self.policy.delay_for(self.state.attempt)
    }

    /// Feed one event.
    ///
    /// Returns `None` when the event has no effect in the current status
    /// (for example `connect` while already open, or `disconnect` while
    /// failed). Such events are expected races, not errors.
    pub fn apply(&mut self, event: ConnectionEvent) -> Option<Transition> {
        use ConnectionStatus::{Connecting, Failed, Idle, Open, Reconnecting};

        let from = self.state.status;
        let notice = match (from, event) {
            (Idle, ConnectionEvent::ConnectRequested) => {
                self.state.attempt = 0;
                self.state.status = Connecting;
                Notice::new(NotificationKind::Info, "Connecting to server...")
            }
            (Failed, ConnectionEvent::ConnectRequested) => {
                self.state.attempt = 0;
                self.state.last_error = None;
                self.state.status = Connecting;
                Notice::new(NotificationKind::Info, "Retrying connection to server...")
            }
            (Connecting, ConnectionEvent::TransportOpened) => {
                self.state.attempt = 0;
                self.state.last_error = None;
                self.state.status = Open;
                Notice::new(NotificationKind::Success, "Connected to server")
            }
            (Connecting | Open, ConnectionEvent::TransportLost { error }) => {
                let notice = if self.policy.allows(self.state.attempt) {
                    self.state.status = Reconnecting;
                    Notice::new(NotificationKind::Error, format!("Connection error: {error}"))
                } else {
                    self.state.status = Failed;
                    Notice::new(
                        NotificationKind::Error,
                        format!(
                            "Unable to reach server after {} reconnect attempts",
                            self.state.attempt
                        ),
                    )
                };
                self.state.last_error = Some(error);
                notice
            }
            (Reconnecting, ConnectionEvent::RetryElapsed) => {
                self.state.attempt = self.state.attempt.saturating_add(1);
                self.state.status = Connecting;
                Notice::new(
                    NotificationKind::Info,
                    format!(
                        "Reconnecting (attempt {} of {})...",
                        self.state.attempt, self.policy.max_attempts
                    ),
                )
            }
            (Connecting | Open | Reconnecting, ConnectionEvent::DisconnectRequested) => {
                self.state.attempt = 0;
                self.state.status = Idle;
                Notice::new(NotificationKind::Info, "Disconnected from server")
            }
            _ => return None,
        };

        Some(Transition {
            from,
            state: self.state.clone(),
            notice,
        })
    }
}
