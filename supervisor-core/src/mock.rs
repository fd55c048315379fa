//! Test doubles for the process host and the clock.
//!
//! Both are cheap to clone and share their state, so a test can hand one
//! clone to the supervisor and keep another to script and inspect it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::HostError;
use crate::host::{Clock, ProcessHost, ShutdownFlag};
use crate::observer::matches_pattern;

/// What happens in the mock process table when a path is spawned.
#[derive(Debug, Clone)]
pub enum SpawnBehavior {
    /// The named process shows up immediately.
    Appears(String),
    /// The named process shows up after this many further listings.
    AppearsAfter { name: String, listings: u32 },
    /// The spawn call itself errors.
    Fails,
    /// The spawn succeeds but nothing ever shows up.
    Silent,
}

/// A call made against [`MockHost`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    List,
    Spawn { path: PathBuf, args: Vec<String> },
    Terminate { pattern: String },
}

#[derive(Debug, Default)]
struct HostState {
    running: Vec<String>,
    behaviors: HashMap<PathBuf, SpawnBehavior>,
    pending: Vec<(String, u32)>,
    failing_listings: u32,
    calls: Vec<HostCall>,
    next_pid: u32,
}

/// Scriptable in-memory process table.
#[derive(Debug, Clone, Default)]
pub struct MockHost {
    state: Arc<Mutex<HostState>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock with some processes already running.
    pub fn with_running<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let host = Self::new();
        for name in names {
            host.start(name);
        }
        host
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().expect("mock host lock poisoned")
    }

    /// Add a running process.
    pub fn start(&self, name: impl Into<String>) {
        self.state().running.push(name.into());
    }

    /// Remove every running process with exactly this name.
    pub fn stop(&self, name: &str) {
        self.state().running.retain(|n| n != name);
    }

    pub fn on_spawn(&self, path: impl Into<PathBuf>, behavior: SpawnBehavior) {
        self.state().behaviors.insert(path.into(), behavior);
    }

    /// Make the next `count` listings fail.
    pub fn fail_listings(&self, count: u32) {
        self.state().failing_listings = count;
    }

    pub fn running(&self) -> Vec<String> {
        self.state().running.clone()
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.state().calls.clone()
    }

    /// Paths spawned so far, in order.
    pub fn spawned(&self) -> Vec<PathBuf> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                HostCall::Spawn { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Calls other than listings, in order.
    pub fn actions(&self) -> Vec<HostCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| !matches!(call, HostCall::List))
            .cloned()
            .collect()
    }
}

impl ProcessHost for MockHost {
    fn running_process_names(&self) -> Result<Vec<String>, HostError> {
        let mut state = self.state();
        state.calls.push(HostCall::List);

        if state.failing_listings > 0 {
            state.failing_listings -= 1;
            return Err(HostError::ProcessTable("mock: listing failed".into()));
        }

        let mut appeared = Vec::new();
        state.pending.retain_mut(|(name, listings)| {
            if *listings == 0 {
                appeared.push(name.clone());
                false
            } else {
                *listings -= 1;
                true
            }
        });
        state.running.extend(appeared);

        Ok(state.running.clone())
    }

    fn spawn(&self, path: &Path, args: &[String]) -> Result<u32, HostError> {
        let mut state = self.state();
        state.calls.push(HostCall::Spawn {
            path: path.to_path_buf(),
            args: args.to_vec(),
        });

        let behavior = state.behaviors.get(path).cloned();
        match behavior {
            Some(SpawnBehavior::Fails) => {
                return Err(HostError::Spawn {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "mock spawn failure"),
                })
            }
            Some(SpawnBehavior::Appears(name)) => state.running.push(name),
            Some(SpawnBehavior::AppearsAfter { name, listings }) => {
                state.pending.push((name, listings))
            }
            Some(SpawnBehavior::Silent) | None => {}
        }

        state.next_pid += 1;
        Ok(1000 + state.next_pid)
    }

    fn terminate_matching(&self, pattern: &str, _timeout: Duration) -> Result<usize, HostError> {
        let mut state = self.state();
        state.calls.push(HostCall::Terminate {
            pattern: pattern.to_string(),
        });
        let before = state.running.len();
        state.running.retain(|name| !matches_pattern(name, pattern));
        Ok(before - state.running.len())
    }
}

#[derive(Debug)]
struct ClockState {
    now: DateTime<Utc>,
    sleeps: Vec<Duration>,
    trigger: Option<(DateTime<Utc>, ShutdownFlag)>,
}

/// Clock whose sleeps advance time instantly.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ClockState>>,
}

impl ManualClock {
    /// Starts at 2024-01-01T00:00:00Z.
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::starting_at(start)
    }

    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                now,
                sleeps: Vec::new(),
                trigger: None,
            })),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ClockState> {
        self.state.lock().expect("manual clock lock poisoned")
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state();
        state.now += chrono::Duration::from_std(duration).expect("duration out of range");
        Self::maybe_trigger(&mut state);
    }

    /// Raise `flag` once the clock reaches `at`.
    pub fn trigger_at(&self, at: DateTime<Utc>, flag: ShutdownFlag) {
        let mut state = self.state();
        state.trigger = Some((at, flag));
        Self::maybe_trigger(&mut state);
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state().sleeps.clone()
    }

    /// Total time slept so far.
    pub fn slept(&self) -> Duration {
        self.state().sleeps.iter().sum()
    }

    fn maybe_trigger(state: &mut ClockState) {
        if let Some((at, flag)) = &state.trigger {
            if state.now >= *at {
                flag.trigger();
            }
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state().now
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.state();
        state.sleeps.push(duration);
        state.now += chrono::Duration::from_std(duration).expect("duration out of range");
        Self::maybe_trigger(&mut state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_behaviors_update_the_table() {
        let host = MockHost::new();
        host.on_spawn("/apps/steam", SpawnBehavior::Appears("steam".into()));
        host.on_spawn("/apps/broken", SpawnBehavior::Fails);

        host.spawn(Path::new("/apps/steam"), &[]).unwrap();
        assert!(host.spawn(Path::new("/apps/broken"), &[]).is_err());
        host.spawn(Path::new("/apps/unknown"), &[]).unwrap();

        assert_eq!(host.running(), vec!["steam".to_string()]);
        assert_eq!(host.spawned().len(), 3);
    }

    #[test]
    fn delayed_processes_appear_after_listings() {
        let host = MockHost::new();
        host.on_spawn(
            "/apps/vr",
            SpawnBehavior::AppearsAfter {
                name: "vrserver".into(),
                listings: 2,
            },
        );
        host.spawn(Path::new("/apps/vr"), &[]).unwrap();

        assert!(host.running_process_names().unwrap().is_empty());
        assert!(host.running_process_names().unwrap().is_empty());
        assert_eq!(host.running_process_names().unwrap(), vec!["vrserver"]);
    }

    #[test]
    fn failing_listings_recover() {
        let host = MockHost::with_running(["steam"]);
        host.fail_listings(1);
        assert!(host.running_process_names().is_err());
        assert!(host.running_process_names().is_ok());
    }

    #[test]
    fn terminate_removes_matching_names_case_insensitively() {
        let host = MockHost::with_running(["VirtualDesktop.Streamer", "steam"]);
        let killed = host
            .terminate_matching("virtualdesktop.streamer", Duration::from_secs(10))
            .unwrap();
        assert_eq!(killed, 1);
        assert_eq!(host.running(), vec!["steam".to_string()]);
    }

    #[test]
    fn manual_clock_records_sleeps() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_secs(5));
        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.now() - start, chrono::Duration::seconds(15));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);
    }
}
