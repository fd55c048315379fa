use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use super::role::Role;

/// How a role's application is (re)started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchVariant {
    /// Spawn the resolved path with the role's arguments.
    Plain,
    /// Refuse to spawn unless the role's dependency is observed alive.
    RequiresLiveDependency,
    /// Terminate any process matching the role's pattern, wait up to `grace`
    /// for it to exit, pause for `settle`, then spawn.
    ///
    /// Used for applications that wedge instead of exiting.
    TerminateBeforeRelaunch { grace: Duration, settle: Duration },
}

/// A supervised application: one per role.
///
/// `resolved_path` is filled in once, when the [`crate::AppRegistry`] is
/// built, and never changes afterwards. An application without one is
/// unavailable for the rest of the run.
#[derive(Debug, Clone)]
pub struct ManagedApplication {
    pub role: Role,
    /// Filesystem locations to probe, in priority order.
    pub candidates: Vec<PathBuf>,
    pub resolved_path: Option<PathBuf>,
    /// Case-insensitive substring matched against running process names.
    pub pattern: String,
    pub args: Vec<String>,
    pub variant: LaunchVariant,
    /// Pause after a successful startup launch before moving on.
    pub settle: Duration,
}

impl ManagedApplication {
    pub fn new(role: Role, pattern: impl Into<String>) -> Self {
        Self {
            role,
            candidates: Vec::new(),
            resolved_path: None,
            pattern: pattern.into(),
            args: Vec::new(),
            variant: LaunchVariant::Plain,
            settle: Duration::ZERO,
        }
    }

    pub fn with_candidates<I, P>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_variant(mut self, variant: LaunchVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn is_available(&self) -> bool {
        self.resolved_path.is_some()
    }

    /// The built-in application for `role`, with the default install
    /// locations as candidates.
    pub fn builtin(role: Role) -> Self {
        let app = match role {
            Role::Launcher => ManagedApplication::new(role, "Steam")
                .with_args(["-silent"])
                .with_settle(Duration::from_secs(5)),
            Role::StreamingClient => ManagedApplication::new(role, "VirtualDesktop.Streamer")
                .with_variant(LaunchVariant::TerminateBeforeRelaunch {
                    grace: Duration::from_secs(10),
                    settle: Duration::from_secs(2),
                })
                .with_settle(Duration::from_secs(3)),
            Role::VrRuntime => {
                ManagedApplication::new(role, "vrserver").with_settle(Duration::from_secs(10))
            }
            Role::TargetApp => ManagedApplication::new(role, "VRChat")
                .with_variant(LaunchVariant::RequiresLiveDependency),
        };
        app.with_candidates(default_candidates(role))
    }
}

/// Default install locations per role, most common first.
pub fn default_candidates(role: Role) -> Vec<PathBuf> {
    const STEAM_ROOTS: [&str; 4] = [
        r"C:\Program Files (x86)\Steam",
        r"C:\Program Files\Steam",
        r"D:\Steam",
        r"E:\Steam",
    ];

    match role {
        Role::Launcher => STEAM_ROOTS
            .iter()
            .map(|root| PathBuf::from(format!(r"{root}\Steam.exe")))
            .collect(),
        Role::StreamingClient => {
            let mut paths = vec![
                PathBuf::from(
                    r"C:\Program Files\Virtual Desktop Streamer\VirtualDesktop.Streamer.exe",
                ),
                PathBuf::from(
                    r"C:\Program Files (x86)\Virtual Desktop Streamer\VirtualDesktop.Streamer.exe",
                ),
            ];
            if let Some(local) = home_relative(r"AppData\Local\Virtual Desktop Streamer") {
                paths.push(local.join("VirtualDesktop.Streamer.exe"));
            }
            paths
        }
        Role::VrRuntime => STEAM_ROOTS
            .iter()
            .map(|root| {
                PathBuf::from(format!(
                    r"{root}\steamapps\common\SteamVR\bin\win64\vrstartup.exe"
                ))
            })
            .collect(),
        Role::TargetApp => {
            let mut paths: Vec<PathBuf> = STEAM_ROOTS
                .iter()
                .map(|root| PathBuf::from(format!(r"{root}\steamapps\common\VRChat\VRChat.exe")))
                .collect();
            paths.push(PathBuf::from(
                r"C:\Program Files\Oculus\Software\vrchat-vrchat\VRChat.exe",
            ));
            paths.push(PathBuf::from(
                r"C:\Program Files (x86)\Oculus\Software\vrchat-vrchat\VRChat.exe",
            ));
            paths
        }
    }
}

fn home_relative(suffix: &str) -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(|home| PathBuf::from(home).join(suffix))
}

/// Serializable view of an application for status output.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationSummary {
    pub role: Role,
    pub name: &'static str,
    pub pattern: String,
    pub resolved_path: Option<PathBuf>,
}

impl From<&ManagedApplication> for ApplicationSummary {
    fn from(app: &ManagedApplication) -> Self {
        Self {
            role: app.role,
            name: app.role.display_name(),
            pattern: app.pattern.clone(),
            resolved_path: app.resolved_path.clone(),
        }
    }
}
