use std::time::Duration;

use serde::Serialize;

use super::Supervisor;
use crate::error::SupervisorError;
use crate::graph::{self, DependencyMode};
use crate::launcher::LaunchOutcome;
use crate::models::Role;
use crate::observer::Snapshot;
use crate::policy::Decision;

/// What a tick did about one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum RoleAction {
    Alive,
    /// Gate dependency was down in the snapshot; policy untouched.
    DependencyUnmet { dependency: Role },
    Cooldown,
    Exhausted,
    /// The launcher declined to spawn; not charged.
    LaunchSkipped { reason: String },
    Recovered,
    RecoveryFailed { reason: String },
}

impl RoleAction {
    /// Whether this action charged a recovery attempt.
    pub fn is_attempt(&self) -> bool {
        matches!(self, Self::Recovered | Self::RecoveryFailed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    /// `None` when the process listing failed.
    pub snapshot: Option<Snapshot>,
    pub actions: Vec<(Role, RoleAction)>,
    pub recovery_performed: bool,
    /// Sleep before the next tick.
    pub next_sleep: Duration,
}

impl TickReport {
    pub fn action(&self, role: Role) -> Option<&RoleAction> {
        self.actions.iter().find(|(r, _)| *r == role).map(|(_, a)| a)
    }
}

impl Supervisor {
    /// Run the monitoring loop until shutdown is requested.
    ///
    /// Returns an error only when the process table stays unavailable for
    /// `max_observer_failures` consecutive ticks.
    pub fn monitor(&mut self) -> Result<(), SupervisorError> {
        tracing::info!(
            roles = ?self.registry.available_roles(),
            poll_secs = self.config.poll_interval_secs,
            "Monitoring started"
        );

        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            let report = self.run_tick()?;
            if !self.pause(report.next_sleep) {
                break;
            }
        }

        tracing::info!("Monitoring stopped");
        Ok(())
    }

    /// Evaluate every resolved role once and recover the dead ones the
    /// policy allows.
    pub fn run_tick(&mut self) -> Result<TickReport, SupervisorError> {
        let roles = self.registry.available_roles();

        let snapshot = match self.observer().snapshot(&self.registry, &roles) {
            Ok(snapshot) => {
                self.observer_failures = 0;
                snapshot
            }
            Err(e) => {
                self.observer_failures += 1;
                let max = self.config.max_observer_failures;
                if self.observer_failures >= max {
                    tracing::error!(failures = self.observer_failures, error = %e, "Process table unavailable, giving up");
                    return Err(SupervisorError::ObserverFailure(e));
                }
                tracing::warn!(
                    failures = self.observer_failures,
                    max,
                    error = %e,
                    "Process snapshot failed, no recovery this tick"
                );
                return Ok(TickReport {
                    snapshot: None,
                    actions: Vec::new(),
                    recovery_performed: false,
                    next_sleep: self.config.poll_interval(),
                });
            }
        };

        let alive = snapshot.alive_roles();
        let dead = snapshot.dead_roles();
        if alive.is_empty() {
            tracing::warn!(dead = ?dead, "No supervised application is running");
        } else {
            tracing::info!(alive = ?alive, dead = ?dead, "Tick");
        }

        let mut actions = Vec::with_capacity(roles.len());
        for role in roles {
            let action = if snapshot.is_alive(role) {
                RoleAction::Alive
            } else {
                self.evaluate_dead_role(role, &snapshot, &actions)
            };
            actions.push((role, action));
        }

        let recovery_performed = actions.iter().any(|(_, action)| action.is_attempt());
        let next_sleep = if recovery_performed {
            self.config.post_recovery_interval()
        } else {
            self.config.poll_interval()
        };
        tracing::info!(
            recovery_performed,
            next_check_secs = next_sleep.as_secs(),
            "Tick complete"
        );

        Ok(TickReport {
            snapshot: Some(snapshot),
            actions,
            recovery_performed,
            next_sleep,
        })
    }

    fn evaluate_dead_role(
        &mut self,
        role: Role,
        snapshot: &Snapshot,
        earlier: &[(Role, RoleAction)],
    ) -> RoleAction {
        if let Some(dep) = graph::dependency(role) {
            if dep.mode == DependencyMode::Gate && !snapshot.is_alive(dep.role) {
                tracing::info!(role = %role, dependency = %dep.role, "Down, waiting for dependency");
                return RoleAction::DependencyUnmet {
                    dependency: dep.role,
                };
            }
        }

        let now = self.clock.now();
        match self.policy.decide(role, now) {
            Decision::Permit => {}
            Decision::Cooldown => {
                tracing::info!(role = %role, "Down, recovery cooling down");
                return RoleAction::Cooldown;
            }
            Decision::Exhausted => {
                tracing::warn!(role = %role, "Down, recovery attempts exhausted");
                return RoleAction::Exhausted;
            }
        }

        tracing::warn!(role = %role, "Down, attempting recovery");
        let outcome = self.recover(role, earlier);

        let result = match outcome {
            LaunchOutcome::Skipped(reason) => {
                tracing::warn!(role = %role, "Recovery skipped: {}", reason);
                return RoleAction::LaunchSkipped {
                    reason: reason.to_string(),
                };
            }
            LaunchOutcome::Started { pid } => Ok(pid),
            LaunchOutcome::Failed(reason) => Err(reason),
        };

        let finished = self.clock.now();
        self.policy.record_attempt(role, finished);
        let attempts = self
            .policy
            .state(role)
            .map(|state| state.attempt_count)
            .unwrap_or_default();

        match result {
            Ok(pid) => {
                tracing::info!(role = %role, pid, attempts, at = %finished.to_rfc3339(), "Recovery succeeded");
                RoleAction::Recovered
            }
            Err(reason) => {
                tracing::error!(role = %role, attempts, at = %finished.to_rfc3339(), "Recovery failed: {}", reason);
                RoleAction::RecoveryFailed {
                    reason: reason.to_string(),
                }
            }
        }
    }

    /// One recovery attempt. A bring-up prerequisite that is down is
    /// launched first, under its own recovery policy; if the policy refuses
    /// or the prerequisite was already attempted this tick, the attempt is
    /// skipped. A prerequisite that cannot be confirmed fails the attempt.
    fn recover(&mut self, role: Role, earlier: &[(Role, RoleAction)]) -> LaunchOutcome {
        if let Some(dep) = graph::dependency(role) {
            if dep.mode == DependencyMode::BringUp {
                let alive = match self.registry.get(dep.role) {
                    Some(app) => match self.observer().is_alive(&app.pattern) {
                        Ok(alive) => alive,
                        Err(e) => return LaunchOutcome::Skipped(SupervisorError::ObserverFailure(e)),
                    },
                    None => false,
                };

                if !alive {
                    if let Some(skip) = self.bring_up(role, dep.role, earlier) {
                        return skip;
                    }
                }
            }
        }

        self.launcher()
            .launch_and_confirm(role, self.config.liveness_timeout())
    }

    /// Start `prerequisite` ahead of `role`. Returns the outcome to report
    /// for `role` when it must not proceed.
    fn bring_up(
        &mut self,
        role: Role,
        prerequisite: Role,
        earlier: &[(Role, RoleAction)],
    ) -> Option<LaunchOutcome> {
        let unmet = || {
            LaunchOutcome::Skipped(SupervisorError::DependencyUnmet {
                role,
                dependency: prerequisite,
            })
        };

        let attempted = earlier
            .iter()
            .any(|(r, action)| *r == prerequisite && action.is_attempt());
        if attempted {
            tracing::info!(role = %role, prerequisite = %prerequisite, "Prerequisite already attempted this tick");
            return Some(unmet());
        }
        match self.policy.decide(prerequisite, self.clock.now()) {
            Decision::Permit => {}
            decision => {
                tracing::info!(role = %role, prerequisite = %prerequisite, ?decision, "Prerequisite recovery not permitted");
                return Some(unmet());
            }
        }

        tracing::warn!(role = %role, prerequisite = %prerequisite, "Prerequisite down, starting it first");
        let outcome = self
            .launcher()
            .launch_and_confirm(prerequisite, self.config.prerequisite_wait());
        if !matches!(outcome, LaunchOutcome::Skipped(_)) {
            self.policy.record_attempt(prerequisite, self.clock.now());
        }

        match outcome {
            LaunchOutcome::Started { .. } => None,
            LaunchOutcome::Skipped(reason) | LaunchOutcome::Failed(reason) => {
                Some(LaunchOutcome::Failed(SupervisorError::LaunchFailed {
                    role,
                    reason: format!("prerequisite {} not started: {}", prerequisite, reason),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Clock;
    use crate::mock::{ManualClock, MockHost, SpawnBehavior};
    use crate::models::{ManagedApplication, SupervisorConfig};
    use crate::registry::AppRegistry;

    fn supervisor(host: &MockHost) -> Supervisor {
        let registry = AppRegistry::resolve_with(
            [Role::Launcher, Role::VrRuntime]
                .iter()
                .map(|role| {
                    ManagedApplication::builtin(*role)
                        .with_candidates([format!("/apps/{}", role.as_str())])
                })
                .collect(),
            |_| true,
        );
        Supervisor::with_clock(
            registry,
            SupervisorConfig::default(),
            Box::new(host.clone()),
            Box::new(ManualClock::new()),
        )
    }

    #[test]
    fn bring_up_charges_the_prerequisite() {
        let host = MockHost::new();
        host.on_spawn("/apps/launcher", SpawnBehavior::Appears("steam.exe".into()));
        host.on_spawn("/apps/vr_runtime", SpawnBehavior::Appears("vrserver.exe".into()));
        let mut supervisor = supervisor(&host);

        let outcome = supervisor.recover(Role::VrRuntime, &[]);

        assert!(outcome.is_started());
        assert_eq!(supervisor.policy().state(Role::Launcher).unwrap().attempt_count, 1);
        assert_eq!(
            host.spawned(),
            vec![
                std::path::PathBuf::from("/apps/launcher"),
                std::path::PathBuf::from("/apps/vr_runtime")
            ]
        );
    }

    #[test]
    fn bring_up_respects_the_prerequisite_cooldown() {
        let host = MockHost::new();
        let mut supervisor = supervisor(&host);
        let now = supervisor.clock.now();
        supervisor.policy.record_attempt(Role::Launcher, now);

        let outcome = supervisor.recover(Role::VrRuntime, &[]);

        assert!(matches!(
            outcome,
            LaunchOutcome::Skipped(SupervisorError::DependencyUnmet { .. })
        ));
        assert!(host.spawned().is_empty());
        assert_eq!(supervisor.policy().state(Role::Launcher).unwrap().attempt_count, 1);
    }

    #[test]
    fn bring_up_skips_a_prerequisite_attempted_this_tick() {
        let host = MockHost::new();
        let mut supervisor = supervisor(&host);
        let earlier = [(
            Role::Launcher,
            RoleAction::RecoveryFailed {
                reason: "timed out".into(),
            },
        )];

        let outcome = supervisor.recover(Role::VrRuntime, &earlier);

        assert!(matches!(outcome, LaunchOutcome::Skipped(_)));
        assert!(host.spawned().is_empty());
    }
}
