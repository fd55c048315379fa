//! Seams between the supervisor and the machine it runs on.
//!
//! `ProcessHost` is the OS process surface, `Clock` is wall time plus
//! blocking sleep, and `ShutdownFlag` is the cooperative cancellation signal
//! checked at every suspension point.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::HostError;

/// Process listing, spawning and termination.
pub trait ProcessHost: Send {
    /// Names of every process currently running.
    fn running_process_names(&self) -> Result<Vec<String>, HostError>;

    /// Spawn `path` detached from the supervisor. Returns the new pid.
    fn spawn(&self, path: &Path, args: &[String]) -> Result<u32, HostError>;

    /// Ask every process whose name contains `pattern` (case-insensitive) to
    /// exit, waiting up to `timeout` for them to go. Returns how many
    /// processes were signalled.
    fn terminate_matching(&self, pattern: &str, timeout: Duration) -> Result<usize, HostError>;
}

/// Source of time for cooldowns and sleeps.
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `chrono::Utc` and `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sleep for `duration` in steps of at most one second, stopping early once
/// `shutdown` is raised. Returns `false` if the sleep was cut short.
pub fn sleep_cancellable(clock: &dyn Clock, shutdown: &ShutdownFlag, duration: Duration) -> bool {
    const STEP: Duration = Duration::from_secs(1);

    let mut remaining = duration;
    while !remaining.is_zero() {
        if shutdown.is_triggered() {
            return false;
        }
        let step = remaining.min(STEP);
        clock.sleep(step);
        remaining -= step;
    }
    !shutdown.is_triggered()
}
