//! Per-role recovery bookkeeping: cooldown between attempts and a bounded
//! number of attempts that is cleared after a reset window.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Role, SupervisorConfig};

/// Attempt history for one role. Created the first time the role is
/// evaluated and kept for the life of the supervisor process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryState {
    pub attempt_count: u32,
    /// Only ever set by a completed attempt, never by a skip.
    pub last_attempt: Option<DateTime<Utc>>,
}

/// Outcome of asking the policy whether a role may be recovered now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Permit,
    /// The last attempt was less than `cooldown` ago.
    Cooldown,
    /// `max_attempts` reached and the reset window has not yet passed.
    Exhausted,
}

impl Decision {
    pub fn is_permit(&self) -> bool {
        matches!(self, Self::Permit)
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    cooldown: Duration,
    max_attempts: u32,
    reset_window: Duration,
    states: HashMap<Role, RecoveryState>,
}

impl RecoveryPolicy {
    pub fn new(cooldown: Duration, max_attempts: u32, reset_window: Duration) -> Self {
        Self {
            cooldown,
            max_attempts,
            reset_window,
            states: HashMap::new(),
        }
    }

    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(config.cooldown(), config.max_attempts, config.reset_window())
    }

    /// Decide whether `role` may be recovered at `now`.
    ///
    /// Cooldown is checked before exhaustion, so an elapsed reset window can
    /// never bypass an active cooldown. Reaching the reset window clears the
    /// attempt counter as a side effect.
    pub fn decide(&mut self, role: Role, now: DateTime<Utc>) -> Decision {
        let cooldown = self.cooldown;
        let reset_window = self.reset_window;
        let max_attempts = self.max_attempts;
        let state = self.states.entry(role).or_default();

        let elapsed = state.last_attempt.map(|last| elapsed_since(last, now));

        if let Some(elapsed) = elapsed {
            if elapsed < cooldown {
                return Decision::Cooldown;
            }
        }

        if state.attempt_count >= max_attempts {
            match elapsed {
                Some(elapsed) if elapsed <= reset_window => return Decision::Exhausted,
                _ => {
                    tracing::info!(
                        role = %role,
                        attempts = state.attempt_count,
                        "Reset window passed, clearing recovery attempts"
                    );
                    state.attempt_count = 0;
                }
            }
        }

        Decision::Permit
    }

    pub fn should_attempt(&mut self, role: Role, now: DateTime<Utc>) -> bool {
        self.decide(role, now).is_permit()
    }

    /// Charge one performed attempt to `role`, whatever its outcome.
    pub fn record_attempt(&mut self, role: Role, now: DateTime<Utc>) {
        let state = self.states.entry(role).or_default();
        state.attempt_count += 1;
        state.last_attempt = Some(now);
    }

    pub fn state(&self, role: Role) -> Option<&RecoveryState> {
        self.states.get(&role)
    }
}

/// Elapsed wall time from `since` to `now`, clamped at zero.
fn elapsed_since(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn policy() -> RecoveryPolicy {
        RecoveryPolicy::new(Duration::from_secs(300), 3, Duration::from_secs(3600))
    }

    #[test]
    fn fresh_role_is_permitted_and_state_created_lazily() {
        let mut policy = policy();
        assert!(policy.state(Role::Launcher).is_none());
        assert!(policy.should_attempt(Role::Launcher, t(0)));
        assert_eq!(policy.state(Role::Launcher), Some(&RecoveryState::default()));
    }

    #[test]
    fn cooldown_blocks_until_elapsed() {
        let mut policy = policy();
        policy.record_attempt(Role::VrRuntime, t(0));
        assert_eq!(policy.decide(Role::VrRuntime, t(1)), Decision::Cooldown);
        assert_eq!(policy.decide(Role::VrRuntime, t(299)), Decision::Cooldown);
        assert_eq!(policy.decide(Role::VrRuntime, t(300)), Decision::Permit);
    }

    #[test]
    fn exhausted_until_reset_window_then_cleared() {
        let mut policy = policy();
        policy.record_attempt(Role::TargetApp, t(0));
        policy.record_attempt(Role::TargetApp, t(300));
        policy.record_attempt(Role::TargetApp, t(600));

        assert_eq!(policy.decide(Role::TargetApp, t(900)), Decision::Exhausted);
        assert_eq!(policy.decide(Role::TargetApp, t(600 + 3600)), Decision::Exhausted);
        assert_eq!(policy.decide(Role::TargetApp, t(600 + 3601)), Decision::Permit);
        assert_eq!(policy.state(Role::TargetApp).unwrap().attempt_count, 0);
    }

    #[test]
    fn cooldown_is_checked_before_reset_window() {
        // Reset window shorter than cooldown: the window has passed but the
        // cooldown has not, so the attempt must still be refused.
        let mut policy = RecoveryPolicy::new(Duration::from_secs(300), 1, Duration::from_secs(60));
        policy.record_attempt(Role::Launcher, t(0));

        assert_eq!(policy.decide(Role::Launcher, t(120)), Decision::Cooldown);
        assert_eq!(policy.state(Role::Launcher).unwrap().attempt_count, 1);
        assert_eq!(policy.decide(Role::Launcher, t(300)), Decision::Permit);
    }

    #[test]
    fn roles_are_tracked_independently() {
        let mut policy = policy();
        policy.record_attempt(Role::Launcher, t(0));
        assert!(!policy.should_attempt(Role::Launcher, t(10)));
        assert!(policy.should_attempt(Role::StreamingClient, t(10)));
    }

    #[test]
    fn decide_never_touches_last_attempt() {
        let mut policy = policy();
        policy.record_attempt(Role::Launcher, t(0));
        policy.decide(Role::Launcher, t(10));
        policy.decide(Role::Launcher, t(400));
        assert_eq!(policy.state(Role::Launcher).unwrap().last_attempt, Some(t(0)));
    }
}
