//! The supervisor: owns the registry, the recovery bookkeeping and the OS
//! seams, and drives the startup sequence and the monitoring loop.
//!
//! Only one of the two procedures runs at a time. The monitoring loop is the
//! single writer of recovery state, so no locking is involved.

mod monitor;
mod startup;

pub use monitor::{RoleAction, TickReport};
pub use startup::{StartupReport, StartupStep, StepOutcome};

use std::time::Duration;

use serde::Serialize;

use crate::error::SupervisorError;
use crate::host::{sleep_cancellable, Clock, ProcessHost, ShutdownFlag, SystemClock};
use crate::launcher::ProcessLauncher;
use crate::models::{ApplicationSummary, Role, SupervisorConfig};
use crate::observer::ProcessObserver;
use crate::policy::{RecoveryPolicy, RecoveryState};
use crate::registry::AppRegistry;

/// Point-in-time view of one role for status output.
#[derive(Debug, Clone, Serialize)]
pub struct RoleStatus {
    #[serde(flatten)]
    pub application: ApplicationSummary,
    pub alive: bool,
    pub recovery: Option<RecoveryState>,
}

pub struct Supervisor {
    registry: AppRegistry,
    config: SupervisorConfig,
    policy: RecoveryPolicy,
    host: Box<dyn ProcessHost>,
    clock: Box<dyn Clock>,
    shutdown: ShutdownFlag,
    observer_failures: u32,
}

impl Supervisor {
    /// Create a supervisor on the wall clock.
    pub fn new(registry: AppRegistry, config: SupervisorConfig, host: Box<dyn ProcessHost>) -> Self {
        Self::with_clock(registry, config, host, Box::new(SystemClock))
    }

    /// Create a supervisor with an explicit clock. Useful for testing.
    pub fn with_clock(
        registry: AppRegistry,
        config: SupervisorConfig,
        host: Box<dyn ProcessHost>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let policy = RecoveryPolicy::from_config(&config);
        Self {
            registry,
            config,
            policy,
            host,
            clock,
            shutdown: ShutdownFlag::new(),
            observer_failures: 0,
        }
    }

    /// Replace the shutdown flag, e.g. with one shared with a signal handler.
    pub fn with_shutdown(mut self, shutdown: ShutdownFlag) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    pub fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    fn launcher(&self) -> ProcessLauncher<'_> {
        ProcessLauncher::new(
            self.host.as_ref(),
            &self.registry,
            self.clock.as_ref(),
            &self.shutdown,
        )
    }

    fn observer(&self) -> ProcessObserver<'_> {
        ProcessObserver::new(self.host.as_ref())
    }

    /// Cancellable sleep. Returns `false` if shutdown was requested.
    fn pause(&self, duration: Duration) -> bool {
        sleep_cancellable(self.clock.as_ref(), &self.shutdown, duration)
    }

    /// Liveness for every registered role, resolved or not.
    pub fn status(&self) -> Result<Vec<RoleStatus>, SupervisorError> {
        let roles: Vec<Role> = self.registry.iter().map(|app| app.role).collect();
        let snapshot = self.observer().snapshot(&self.registry, &roles)?;

        Ok(self
            .registry
            .iter()
            .map(|app| RoleStatus {
                application: ApplicationSummary::from(app),
                alive: snapshot.is_alive(app.role),
                recovery: self.policy.state(app.role).cloned(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ManualClock, MockHost};
    use crate::models::ManagedApplication;

    #[test]
    fn status_reports_unresolved_roles_too() {
        let registry = AppRegistry::resolve_with(
            vec![
                ManagedApplication::builtin(Role::Launcher).with_candidates(["/apps/steam"]),
                ManagedApplication::builtin(Role::TargetApp).with_candidates(["/missing"]),
            ],
            |p| p.starts_with("/apps"),
        );
        let host = MockHost::with_running(["steam.exe"]);
        let supervisor = Supervisor::with_clock(
            registry,
            SupervisorConfig::default(),
            Box::new(host),
            Box::new(ManualClock::new()),
        );

        let status = supervisor.status().unwrap();
        assert_eq!(status.len(), 2);
        assert!(status[0].alive);
        assert!(status[0].application.resolved_path.is_some());
        assert!(!status[1].alive);
        assert!(status[1].application.resolved_path.is_none());
    }
}
