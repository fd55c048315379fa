//! Spawning applications with their role-specific launch policy.

use std::time::Duration;

use crate::error::SupervisorError;
use crate::graph;
use crate::host::{sleep_cancellable, Clock, ProcessHost, ShutdownFlag};
use crate::models::{LaunchVariant, ManagedApplication, Role};
use crate::observer::ProcessObserver;
use crate::registry::AppRegistry;

/// Result of one launch call.
///
/// `Skipped` means no spawn was issued, so it is never charged as a recovery
/// attempt. `Failed` covers both a spawn error and a process that never
/// showed up.
#[derive(Debug)]
pub enum LaunchOutcome {
    Started { pid: u32 },
    Skipped(SupervisorError),
    Failed(SupervisorError),
}

impl LaunchOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

pub struct ProcessLauncher<'a> {
    host: &'a dyn ProcessHost,
    registry: &'a AppRegistry,
    clock: &'a dyn Clock,
    shutdown: &'a ShutdownFlag,
}

impl<'a> ProcessLauncher<'a> {
    pub fn new(
        host: &'a dyn ProcessHost,
        registry: &'a AppRegistry,
        clock: &'a dyn Clock,
        shutdown: &'a ShutdownFlag,
    ) -> Self {
        Self {
            host,
            registry,
            clock,
            shutdown,
        }
    }

    fn observer(&self) -> ProcessObserver<'a> {
        ProcessObserver::new(self.host)
    }

    /// Spawn `role`'s application, applying its launch variant.
    pub fn launch(&self, role: Role) -> LaunchOutcome {
        let Some(app) = self.registry.available(role) else {
            return LaunchOutcome::Skipped(SupervisorError::PathUnresolved(role));
        };

        match app.variant {
            LaunchVariant::Plain => {}
            LaunchVariant::RequiresLiveDependency => {
                if let Some(skip) = self.check_live_dependency(role) {
                    return LaunchOutcome::Skipped(skip);
                }
            }
            LaunchVariant::TerminateBeforeRelaunch { grace, settle } => {
                match self.host.terminate_matching(&app.pattern, grace) {
                    Ok(count) => {
                        tracing::info!(role = %role, terminated = count, "Cleared stale processes before relaunch")
                    }
                    Err(e) => {
                        return LaunchOutcome::Failed(SupervisorError::LaunchFailed {
                            role,
                            reason: e.to_string(),
                        })
                    }
                }
                if !sleep_cancellable(self.clock, self.shutdown, settle) {
                    return LaunchOutcome::Skipped(SupervisorError::LaunchFailed {
                        role,
                        reason: "shutdown requested".into(),
                    });
                }
            }
        }

        self.spawn(app)
    }

    fn check_live_dependency(&self, role: Role) -> Option<SupervisorError> {
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

    fn spawn(&self, app: &ManagedApplication) -> LaunchOutcome {
        let Some(path) = app.resolved_path.as_deref() else {
            return LaunchOutcome::Skipped(SupervisorError::PathUnresolved(app.role));
        };
        tracing::info!(role = %app.role, path = %path.display(), args = ?app.args, "Launching");

        match self.host.spawn(path, &app.args) {
            Ok(pid) => LaunchOutcome::Started { pid },
            Err(e) => LaunchOutcome::Failed(SupervisorError::LaunchFailed {
                role: app.role,
                reason: e.to_string(),
            }),
        }
    }

    /// Poll once per second until `role` is observed running, with the last
    /// poll at `timeout`. Returns `false` on timeout or shutdown.
    pub fn wait_for_liveness(&self, role: Role, timeout: Duration) -> bool {
        let Some(app) = self.registry.get(role) else {
            return false;
        };
        let observer = self.observer();
        let seconds = timeout.as_secs();

        for elapsed in 0..=seconds {
            match observer.is_alive(&app.pattern) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => tracing::debug!(role = %role, error = %e, "Liveness poll failed"),
            }
            if elapsed == seconds
                || !sleep_cancellable(self.clock, self.shutdown, Duration::from_secs(1))
            {
                break;
            }
        }
        false
    }

    /// Launch `role` and wait for it to appear. A spawn that never shows up
    /// becomes `Failed(LivenessTimeout)`.
    pub fn launch_and_confirm(&self, role: Role, timeout: Duration) -> LaunchOutcome {
        match self.launch(role) {
            LaunchOutcome::Started { pid } => {
                if self.wait_for_liveness(role, timeout) {
                    tracing::info!(role = %role, pid, "Confirmed running");
                    LaunchOutcome::Started { pid }
                } else {
                    LaunchOutcome::Failed(SupervisorError::LivenessTimeout(role))
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{HostCall, ManualClock, MockHost, SpawnBehavior};

    fn registry() -> AppRegistry {
        AppRegistry::resolve_with(
            Role::ALL
                .iter()
                .map(|role| {
                    ManagedApplication::builtin(*role)
                        .with_candidates([format!("/apps/{}", role.as_str())])
                })
                .collect(),
            |_| true,
        )
    }

    #[test]
    fn launcher_role_spawns_with_silent_flag() {
        let host = MockHost::new();
        let (registry, clock, flag) = (registry(), ManualClock::new(), ShutdownFlag::new());
        let launcher = ProcessLauncher::new(&host, &registry, &clock, &flag);

        assert!(launcher.launch(Role::Launcher).is_started());
        assert_eq!(
            host.actions(),
            vec![HostCall::Spawn {
                path: "/apps/launcher".into(),
                args: vec!["-silent".into()],
            }]
        );
    }

    #[test]
    fn target_app_is_skipped_without_runtime() {
        let host = MockHost::new();
        let (registry, clock, flag) = (registry(), ManualClock::new(), ShutdownFlag::new());
        let launcher = ProcessLauncher::new(&host, &registry, &clock, &flag);

        let outcome = launcher.launch(Role::TargetApp);
        assert!(matches!(
            outcome,
            LaunchOutcome::Skipped(SupervisorError::DependencyUnmet { .. })
        ));
        assert!(host.spawned().is_empty());
    }

    #[test]
    fn target_app_launches_when_runtime_alive() {
        let host = MockHost::with_running(["vrserver.exe"]);
        let (registry, clock, flag) = (registry(), ManualClock::new(), ShutdownFlag::new());
        let launcher = ProcessLauncher::new(&host, &registry, &clock, &flag);

        assert!(launcher.launch(Role::TargetApp).is_started());
        assert_eq!(host.spawned(), vec![std::path::PathBuf::from("/apps/target_app")]);
    }

    #[test]
    fn streaming_client_terminates_then_pauses_then_spawns() {
        let host = MockHost::new();
        let (registry, clock, flag) = (registry(), ManualClock::new(), ShutdownFlag::new());
        let launcher = ProcessLauncher::new(&host, &registry, &clock, &flag);

        assert!(launcher.launch(Role::StreamingClient).is_started());
        assert_eq!(
            host.actions(),
            vec![
                HostCall::Terminate {
                    pattern: "VirtualDesktop.Streamer".into()
                },
                HostCall::Spawn {
                    path: "/apps/streaming_client".into(),
                    args: vec![],
                },
            ]
        );
        assert_eq!(clock.slept(), Duration::from_secs(2));
    }

    #[test]
    fn spawn_error_is_a_failure() {
        let host = MockHost::new();
        host.on_spawn("/apps/vr_runtime", SpawnBehavior::Fails);
        let (registry, clock, flag) = (registry(), ManualClock::new(), ShutdownFlag::new());
        let launcher = ProcessLauncher::new(&host, &registry, &clock, &flag);

        assert!(matches!(
            launcher.launch(Role::VrRuntime),
            LaunchOutcome::Failed(SupervisorError::LaunchFailed { .. })
        ));
    }

    #[test]
    fn wait_for_liveness_polls_once_per_second() {
        let host = MockHost::new();
        host.on_spawn(
            "/apps/vr_runtime",
            SpawnBehavior::AppearsAfter {
                name: "vrserver.exe".into(),
                listings: 3,
            },
        );
        let (registry, clock, flag) = (registry(), ManualClock::new(), ShutdownFlag::new());
        let launcher = ProcessLauncher::new(&host, &registry, &clock, &flag);

        let outcome = launcher.launch_and_confirm(Role::VrRuntime, Duration::from_secs(30));
        assert!(outcome.is_started());
        assert_eq!(clock.slept(), Duration::from_secs(3));
    }

    #[test]
    fn silent_spawn_times_out() {
        let host = MockHost::new();
        let (registry, clock, flag) = (registry(), ManualClock::new(), ShutdownFlag::new());
        let launcher = ProcessLauncher::new(&host, &registry, &clock, &flag);

        let outcome = launcher.launch_and_confirm(Role::VrRuntime, Duration::from_secs(5));
        assert!(matches!(
            outcome,
            LaunchOutcome::Failed(SupervisorError::LivenessTimeout(Role::VrRuntime))
        ));
        assert_eq!(clock.slept(), Duration::from_secs(5));
    }

    #[test]
    fn last_poll_happens_at_the_timeout() {
        let host = MockHost::new();
        host.on_spawn(
            "/apps/vr_runtime",
            SpawnBehavior::AppearsAfter {
                name: "vrserver.exe".into(),
                listings: 5,
            },
        );
        let (registry, clock, flag) = (registry(), ManualClock::new(), ShutdownFlag::new());
        let launcher = ProcessLauncher::new(&host, &registry, &clock, &flag);

        let outcome = launcher.launch_and_confirm(Role::VrRuntime, Duration::from_secs(5));
        assert!(outcome.is_started());
        assert_eq!(clock.slept(), Duration::from_secs(5));
    }

    #[test]
    fn zero_timeout_checks_once_without_sleeping() {
        let host = MockHost::new();
        let (registry, clock, flag) = (registry(), ManualClock::new(), ShutdownFlag::new());
        let launcher = ProcessLauncher::new(&host, &registry, &clock, &flag);

        assert!(!launcher.wait_for_liveness(Role::Launcher, Duration::ZERO));
        assert!(clock.sleeps().is_empty());
        assert_eq!(host.calls(), vec![HostCall::List]);
    }

    #[test]
    fn wait_for_liveness_stops_on_shutdown() {
        let host = MockHost::new();
        let (registry, clock, flag) = (registry(), ManualClock::new(), ShutdownFlag::new());
        clock.trigger_at(clock.now() + chrono::Duration::seconds(2), flag.clone());
        let launcher = ProcessLauncher::new(&host, &registry, &clock, &flag);

        assert!(!launcher.wait_for_liveness(Role::Launcher, Duration::from_secs(30)));
        assert_eq!(clock.slept(), Duration::from_secs(2));
    }
}
