//! The fixed dependency order between roles.
//!
//! ```text
//! Launcher ──(bring-up)──▶ VR-Runtime ──(gate)──▶ Target-App
//! Streaming-Client (independent)
//! ```

use crate::models::Role;

/// What to do when a role's dependency is not running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyMode {
    /// Skip the role until the dependency comes up on its own.
    Gate,
    /// Recovery launches the dependency first, then the role.
    BringUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub role: Role,
    pub mode: DependencyMode,
}

/// The single predecessor of `role`, if it has one.
pub fn dependency(role: Role) -> Option<Dependency> {
    match role {
        Role::Launcher | Role::StreamingClient => None,
        Role::VrRuntime => Some(Dependency {
            role: Role::Launcher,
            mode: DependencyMode::BringUp,
        }),
        Role::TargetApp => Some(Dependency {
            role: Role::VrRuntime,
            mode: DependencyMode::Gate,
        }),
    }
}

/// Roles in the order they are started and evaluated.
pub fn startup_order() -> [Role; 4] {
    [
        Role::Launcher,
        Role::StreamingClient,
        Role::VrRuntime,
        Role::TargetApp,
    ]
}

/// Position of `role` in [`startup_order`].
pub fn order_index(role: Role) -> usize {
    startup_order()
        .iter()
        .position(|r| *r == role)
        .unwrap_or(usize::MAX)
}
