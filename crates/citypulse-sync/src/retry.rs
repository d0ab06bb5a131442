//! Reconnect delay policy.

use std::time::Duration;

use crate::config::{BackoffMode, ConnectionConfig};

/// Attempt budget and delay schedule for reconnecting the inbound channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnect attempts allowed before the manager gives up.
    pub max_attempts: u32,
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth policy.
    pub mode: BackoffMode,
}

impl ReconnectPolicy {
    /// Build the policy described by a connection config.
    pub const fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.reconnect_delay_ms),
            max_delay: Duration::from_millis(config.max_reconnect_delay_ms),
            mode: config.backoff,
        }
    }

    /// Whether another attempt is allowed after `attempt` have been made.
    pub const fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait before reconnect attempt number `attempt + 1`.
    ///
    /// Fixed mode always returns the base delay. Exponential mode doubles
    /// per attempt and saturates at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.mode {
            BackoffMode::Fixed => self.base_delay,
            BackoffMode::Exponential => {
                let factor = 2_u32.saturating_pow(attempt);
                self.base_delay
                    .checked_mul(factor)
                    .map_or(self.max_delay, |delay| delay.min(self.max_delay))
            }
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ConnectionConfig::default())
    }
}
