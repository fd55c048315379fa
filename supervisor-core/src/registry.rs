//! Path resolution and the application registry.
//!
//! Resolution happens exactly once, when the registry is built: each role's
//! candidates are probed in order and the first existing path wins. A role
//! with no existing candidate stays unavailable for the rest of the run.

use std::path::{Path, PathBuf};

use crate::error::SupervisorError;
use crate::graph;
use crate::models::{ManagedApplication, Role};

/// Return the first candidate for which `exists` holds.
pub fn resolve_first<F>(candidates: &[PathBuf], exists: F) -> Option<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    candidates.iter().find(|path| exists(path.as_path())).cloned()
}

/// The supervised applications, one per role, in startup order.
#[derive(Debug, Clone)]
pub struct AppRegistry {
    apps: Vec<ManagedApplication>,
}

impl AppRegistry {
    /// Resolve candidates against the real filesystem.
    pub fn resolve(apps: Vec<ManagedApplication>) -> Self {
        Self::resolve_with(apps, |path| path.exists())
    }

    /// Resolve candidates with a custom existence check.
    pub fn resolve_with<F>(apps: Vec<ManagedApplication>, exists: F) -> Self
    where
        F: Fn(&Path) -> bool,
    {
        let mut apps: Vec<ManagedApplication> = apps
            .into_iter()
            .map(|mut app| {
                app.resolved_path = resolve_first(&app.candidates, &exists);
                match &app.resolved_path {
                    Some(path) => {
                        tracing::info!(role = %app.role, path = %path.display(), "Application found")
                    }
                    None => {
                        let err = SupervisorError::PathUnresolved(app.role);
                        tracing::warn!(
                            role = %app.role,
                            candidates = app.candidates.len(),
                            "{}; excluded from startup and monitoring",
                            err
                        )
                    }
                }
                app
            })
            .collect();

        apps.sort_by_key(|app| graph::order_index(app.role));
        apps.dedup_by_key(|app| app.role);
        Self { apps }
    }

    /// The application for `role`, resolved or not.
    pub fn get(&self, role: Role) -> Option<&ManagedApplication> {
        self.apps.iter().find(|app| app.role == role)
    }

    /// The application for `role` if it has a resolved path.
    pub fn available(&self, role: Role) -> Option<&ManagedApplication> {
        self.get(role).filter(|app| app.is_available())
    }

    pub fn is_available(&self, role: Role) -> bool {
        self.available(role).is_some()
    }

    /// Resolved roles, in startup order.
    pub fn available_roles(&self) -> Vec<Role> {
        self.apps
            .iter()
            .filter(|app| app.is_available())
            .map(|app| app.role)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedApplication> {
        self.apps.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.available_roles().is_empty()
    }
}
