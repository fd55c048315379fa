use serde::Serialize;

use super::Supervisor;
use crate::error::SupervisorError;
use crate::graph;
use crate::launcher::LaunchOutcome;
use crate::models::Role;

/// How one role fared in the startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Already running when its turn came; nothing was launched.
    AlreadyRunning,
    Started,
    /// At least one launch attempt was made and none was confirmed.
    Failed,
    /// Every slot was skipped (dependency down, observer unavailable or
    /// shutdown) and nothing was launched.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartupStep {
    pub role: Role,
    pub outcome: StepOutcome,
    /// Launch attempts actually made.
    pub attempts: u32,
    /// Slots skipped because a dependency was not running.
    pub skips: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    pub steps: Vec<StartupStep>,
    /// Resolved roles observed running once the sequence finished.
    pub alive: usize,
    /// Resolved roles.
    pub total: usize,
    pub cancelled: bool,
}

impl StartupReport {
    pub fn success(&self) -> bool {
        !self.cancelled && self.alive == self.total
    }

    /// `N/M`, as reported at the end of the sequence.
    pub fn tally(&self) -> String {
        format!("{}/{}", self.alive, self.total)
    }

    pub fn step(&self, role: Role) -> Option<&StartupStep> {
        self.steps.iter().find(|step| step.role == role)
    }
}

impl Supervisor {
    /// Run the one-shot, dependency-ordered startup sequence.
    ///
    /// Waits `startup_delay` first, then visits every resolved role in
    /// startup order. A role that is already running is left alone. A failed
    /// role never aborts the sequence; its dependents simply find their
    /// dependency down when they re-check it.
    pub fn run_startup(&mut self) -> StartupReport {
        let roles = self.registry.available_roles();
        tracing::info!(roles = ?roles, "Startup sequence starting");

        let mut steps = Vec::with_capacity(roles.len());
        let delay = self.config.startup_delay();
        if !delay.is_zero() {
            tracing::info!(seconds = delay.as_secs(), "Waiting for the system to settle");
        }
        let mut cancelled = !self.pause(delay);

        for role in roles.iter().copied() {
            if cancelled || self.shutdown.is_triggered() {
                cancelled = true;
                break;
            }
            let step = self.start_role(role);
            match step.outcome {
                StepOutcome::AlreadyRunning => tracing::info!(role = %role, "Already running"),
                StepOutcome::Started => tracing::info!(role = %role, attempts = step.attempts, "Started"),
                StepOutcome::Failed => {
                    tracing::warn!(role = %role, attempts = step.attempts, "Failed to start")
                }
                StepOutcome::Skipped => tracing::warn!(role = %role, skips = step.skips, "Skipped"),
            }
            steps.push(step);
            if self.shutdown.is_triggered() {
                cancelled = true;
                break;
            }
        }

        let alive = match self.observer().snapshot(&self.registry, &roles) {
            Ok(snapshot) => snapshot.alive_roles().len(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not take final snapshot");
                0
            }
        };

        let report = StartupReport {
            steps,
            alive,
            total: roles.len(),
            cancelled,
        };

        if report.success() {
            tracing::info!(tally = %report.tally(), "Startup sequence complete: {} succeeded", report.tally());
        } else if cancelled {
            tracing::warn!(tally = %report.tally(), "Startup sequence cancelled: {} succeeded", report.tally());
        } else {
            tracing::warn!(
                tally = %report.tally(),
                failed = report.total - report.alive,
                "Startup sequence incomplete: {} succeeded",
                report.tally()
            );
        }
        report
    }

    fn start_role(&self, role: Role) -> StartupStep {
        let mut step = StartupStep {
            role,
            outcome: StepOutcome::Skipped,
            attempts: 0,
            skips: 0,
        };
        let Some(app) = self.registry.available(role) else {
            return step;
        };

        match self.observer().is_alive(&app.pattern) {
            Ok(true) => {
                step.outcome = StepOutcome::AlreadyRunning;
                return step;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(role = %role, error = %e, "Cannot observe processes, not launching");
                return step;
            }
        }

        let slots = self.config.retry_attempts;
        let launcher = self.launcher();

        for slot in 1..=slots {
            if slot > 1 && !self.pause(self.config.retry_delay()) {
                break;
            }

            if let Some(unmet) = self.unmet_dependency(role) {
                step.skips += 1;
                tracing::warn!(role = %role, slot, slots, "{}; slot skipped", unmet);
                continue;
            }

            match launcher.launch_and_confirm(role, self.config.liveness_timeout()) {
                LaunchOutcome::Started { .. } => {
                    step.attempts += 1;
                    step.outcome = StepOutcome::Started;
                    if !self.pause(app.settle) {
                        tracing::info!(role = %role, "Shutdown requested while settling");
                    }
                    return step;
                }
                LaunchOutcome::Skipped(reason) => {
                    step.skips += 1;
                    tracing::warn!(role = %role, slot, slots, "{}; slot skipped", reason);
                }
                LaunchOutcome::Failed(reason) => {
                    step.attempts += 1;
                    tracing::warn!(role = %role, slot, slots, "Start attempt {}/{} failed: {}", slot, slots, reason);
                }
            }
        }

        if step.attempts > 0 {
            step.outcome = StepOutcome::Failed;
        }
        step
    }

    /// Live check of `role`'s dependency, whatever its mode. During startup
    /// every dependency acts as a gate.
    fn unmet_dependency(&self, role: Role) -> Option<SupervisorError> {
        let dependency = graph::dependency(role)?;
        let unmet = SupervisorError::DependencyUnmet {
            role,
            dependency: dependency.role,
        };
        let Some(dep_app) = self.registry.get(dependency.role) else {
            return Some(unmet);
        };
        match self.observer().is_alive(&dep_app.pattern) {
            Ok(true) => None,
            Ok(false) => Some(unmet),
            Err(e) => Some(SupervisorError::ObserverFailure(e)),
        }
    }
}
