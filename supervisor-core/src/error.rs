use std::path::PathBuf;

use thiserror::Error;

use crate::models::Role;

/// Errors raised by the OS process surface.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Process table unavailable: {0}")]
    ProcessTable(String),

    #[error("Failed to spawn {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to terminate processes matching '{pattern}': {reason}")]
    Terminate { pattern: String, reason: String },
}

/// Per-role supervision errors.
///
/// `LaunchFailed` and `LivenessTimeout` are charged as attempts by the
/// recovery policy. `DependencyUnmet` and `CooldownActive` are skips and are
/// never charged.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("No candidate path exists for {0}")]
    PathUnresolved(Role),

    #[error("Failed to launch {role}: {reason}")]
    LaunchFailed { role: Role, reason: String },

    #[error("{0} was launched but never observed running")]
    LivenessTimeout(Role),

    #[error("{role} needs {dependency} running")]
    DependencyUnmet { role: Role, dependency: Role },

    #[error("{0} recovery is cooling down or exhausted")]
    CooldownActive(Role),

    #[error("Process observer failed: {0}")]
    ObserverFailure(#[from] HostError),
}

impl SupervisorError {
    /// Whether this error consumes a recovery attempt.
    pub fn is_charged(&self) -> bool {
        matches!(self, Self::LaunchFailed { .. } | Self::LivenessTimeout(_))
    }
}
