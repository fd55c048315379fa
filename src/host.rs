//! The real OS process table, backed by `sysinfo`.

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use supervisor_core::observer::matches_pattern;
use supervisor_core::{HostError, ProcessHost};
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, Signal, System};

#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;

/// How often `terminate_matching` re-reads the table while waiting.
const TERMINATE_POLL: Duration = Duration::from_millis(250);

pub struct SystemHost {
    system: Mutex<System>,
    /// Children spawned by this host, kept until they have been reaped.
    children: Mutex<Vec<Child>>,
}

impl SystemHost {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            children: Mutex::new(Vec::new()),
        }
    }

    /// Collect the exit status of children that have finished, so they do
    /// not linger as zombies under their application's name.
    fn reap(&self) {
        let Ok(mut children) = self.children.lock() else {
            return;
        };
        children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = child.id(), %status, "Child exited");
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::debug!(pid = child.id(), error = %e, "Could not poll child");
                false
            }
        });
    }

    fn refreshed(&self) -> Result<std::sync::MutexGuard<'_, System>, HostError> {
        self.reap();
        let mut system = self
            .system
            .lock()
            .map_err(|_| HostError::ProcessTable("process table lock poisoned".into()))?;
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::new());
        Ok(system)
    }

    /// Processes that are actually running. Zombies left by other parents
    /// have exited and are not counted.
    fn live(system: &System) -> impl Iterator<Item = (&Pid, &Process)> {
        system
            .processes()
            .iter()
            .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
    }

    fn matching_pids(system: &System, pattern: &str) -> Vec<Pid> {
        Self::live(system)
            .filter(|(_, process)| matches_pattern(&process.name().to_string_lossy(), pattern))
            .map(|(pid, _)| *pid)
            .collect()
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessHost for SystemHost {
    fn running_process_names(&self) -> Result<Vec<String>, HostError> {
        let system = self.refreshed()?;
        let names: Vec<String> = Self::live(&system)
            .map(|(_, process)| process.name().to_string_lossy().into_owned())
            .collect();

        // A live system always has at least this process.
        if names.is_empty() {
            return Err(HostError::ProcessTable("process listing came back empty".into()));
        }
        Ok(names)
    }

    fn spawn(&self, path: &Path, args: &[String]) -> Result<u32, HostError> {
        let mut command = Command::new(path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = path.parent() {
            command.current_dir(dir);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(DETACHED_PROCESS);
        }

        let child = command.spawn().map_err(|source| HostError::Spawn {
            path: path.to_path_buf(),
            source,
        })?;
        let pid = child.id();
        if let Ok(mut children) = self.children.lock() {
            children.push(child);
        }
        Ok(pid)
    }

    fn terminate_matching(&self, pattern: &str, timeout: Duration) -> Result<usize, HostError> {
        let targets = {
            let system = self.refreshed()?;
            let pids = Self::matching_pids(&system, pattern);
            for pid in &pids {
                if let Some(process) = system.process(*pid) {
                    // `None` means the platform has no SIGTERM equivalent.
                    if process.kill_with(Signal::Term).is_none() {
                        process.kill();
                    }
                }
            }
            pids
        };

        if targets.is_empty() {
            return Ok(0);
        }
        tracing::debug!(pattern, count = targets.len(), "Termination requested");

        let deadline = Instant::now() + timeout;
        loop {
            let system = self.refreshed()?;
            let remaining = Self::matching_pids(&system, pattern)
                .into_iter()
                .filter(|pid| targets.contains(pid))
                .count();
            if remaining == 0 {
                return Ok(targets.len());
            }
            if Instant::now() >= deadline {
                return Err(HostError::Terminate {
                    pattern: pattern.to_string(),
                    reason: format!("{} process(es) still running after {:?}", remaining, timeout),
                });
            }
            drop(system);
            std::thread::sleep(TERMINATE_POLL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_at_least_the_current_process() {
        let host = SystemHost::new();
        let names = host.running_process_names().unwrap();
        assert!(!names.is_empty());
    }

    #[test]
    fn spawning_a_missing_binary_is_a_spawn_error() {
        let host = SystemHost::new();
        let err = host
            .spawn(Path::new("/definitely/not/here/vr-app"), &[])
            .unwrap_err();
        assert!(matches!(err, HostError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn exited_children_disappear_from_the_table() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("vrsupexitq");
        std::fs::copy("/bin/true", &exe).unwrap();
        let host = SystemHost::new();

        host.spawn(&exe, &[]).unwrap();

        let mut listed = true;
        for _ in 0..40 {
            listed = host
                .running_process_names()
                .unwrap()
                .iter()
                .any(|name| matches_pattern(name, "vrsupexitq"));
            if !listed {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(!listed);
        assert_eq!(
            host.terminate_matching("vrsupexitq", Duration::from_secs(1))
                .unwrap(),
            0
        );
        assert!(host.children.lock().unwrap().is_empty());
    }

    #[test]
    fn terminating_nothing_returns_zero() {
        let host = SystemHost::new();
        let count = host
            .terminate_matching("no-such-process-name-4f2a9c", Duration::from_secs(1))
            .unwrap();
        assert_eq!(count, 0);
    }
}
