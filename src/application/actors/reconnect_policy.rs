use std::time::Duration;

use crate::config::EngineConfig;

/// Linear reconnect backoff: attempt `n` waits `n * base_interval`, and no
/// attempt past `max_attempts` is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_interval: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_interval: Duration, max_attempts: u32) -> Self {
        Self {
            base_interval,
            max_attempts,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.reconnect_interval, config.max_reconnect_attempts)
    }

    /// Delay before attempt `attempt` (1-based), `None` once the budget is spent
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        Some(self.base_interval * attempt)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
