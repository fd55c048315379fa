use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing knobs for the startup sequence, the monitoring loop and the
/// recovery policy. All values are whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Stabilization wait before the startup sequence begins.
    pub startup_delay_secs: u64,
    /// Launch slots per role during the startup sequence.
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    /// Monitoring cadence when nothing was recovered.
    pub poll_interval_secs: u64,
    /// Short re-check cadence after a tick that performed a recovery.
    pub post_recovery_interval_secs: u64,
    /// Minimum spacing between two recovery attempts for the same role.
    pub cooldown_secs: u64,
    pub max_attempts: u32,
    /// Time after the last attempt at which an exhausted counter is cleared.
    pub reset_window_secs: u64,
    /// How long a freshly spawned application has to show up in the
    /// process table.
    pub liveness_timeout_secs: u64,
    /// Wait for a bring-up prerequisite launched during recovery.
    pub prerequisite_wait_secs: u64,
    /// Consecutive failed process snapshots after which monitoring stops.
    pub max_observer_failures: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            startup_delay_secs: 30,
            retry_attempts: 3,
            retry_delay_secs: 10,
            poll_interval_secs: 30,
            post_recovery_interval_secs: 10,
            cooldown_secs: 300,
            max_attempts: 3,
            reset_window_secs: 3600,
            liveness_timeout_secs: 30,
            prerequisite_wait_secs: 10,
            max_observer_failures: 5,
        }
    }
}

impl SupervisorConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn post_recovery_interval(&self) -> Duration {
        Duration::from_secs(self.post_recovery_interval_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn reset_window(&self) -> Duration {
        Duration::from_secs(self.reset_window_secs)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs)
    }

    pub fn prerequisite_wait(&self) -> Duration {
        Duration::from_secs(self.prerequisite_wait_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_observed_values() {
        let config = SupervisorConfig::default();
        assert_eq!(config.startup_delay(), Duration::from_secs(30));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(10));
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.post_recovery_interval(), Duration::from_secs(10));
        assert_eq!(config.cooldown(), Duration::from_secs(300));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.reset_window(), Duration::from_secs(3600));
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config: SupervisorConfig =
            serde_json::from_str(r#"{ "cooldown_secs": 60, "max_attempts": 5 }"#).unwrap();
        assert_eq!(config.cooldown_secs, 60);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.poll_interval_secs, 30);
    }
}
