//! Liveness checks against the live process table.
//!
//! A role is alive when any running process name contains its pattern,
//! ignoring case. This is a substring match on purpose: the Launcher pattern
//! `Steam` also matches helper processes such as `steamwebhelper`, and that
//! looseness is part of the observed behavior.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::HostError;
use crate::host::ProcessHost;
use crate::models::Role;
use crate::registry::AppRegistry;

/// Case-insensitive substring match of `pattern` within `name`.
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

/// Liveness of every evaluated role, taken from a single process listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    alive: BTreeMap<Role, bool>,
}

impl Snapshot {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Role, bool)>,
    {
        Self {
            alive: pairs.into_iter().collect(),
        }
    }

    /// Roles not present in the snapshot count as dead.
    pub fn is_alive(&self, role: Role) -> bool {
        self.alive.get(&role).copied().unwrap_or(false)
    }

    pub fn alive_roles(&self) -> Vec<Role> {
        self.alive.iter().filter(|(_, a)| **a).map(|(r, _)| *r).collect()
    }

    pub fn dead_roles(&self) -> Vec<Role> {
        self.alive.iter().filter(|(_, a)| !**a).map(|(r, _)| *r).collect()
    }

    pub fn len(&self) -> usize {
        self.alive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }
}

/// Answers liveness questions through a [`ProcessHost`].
pub struct ProcessObserver<'a> {
    host: &'a dyn ProcessHost,
}

impl<'a> ProcessObserver<'a> {
    pub fn new(host: &'a dyn ProcessHost) -> Self {
        Self { host }
    }

    /// Whether any running process matches `pattern`.
    pub fn is_alive(&self, pattern: &str) -> Result<bool, HostError> {
        let names = self.host.running_process_names()?;
        Ok(names.iter().any(|name| matches_pattern(name, pattern)))
    }

    /// Liveness for every role in `roles`, from one process listing.
    pub fn snapshot(&self, registry: &AppRegistry, roles: &[Role]) -> Result<Snapshot, HostError> {
        let names = self.host.running_process_names()?;
        let alive = roles.iter().filter_map(|role| {
            registry.get(*role).map(|app| {
                let alive = names.iter().any(|name| matches_pattern(name, &app.pattern));
                (*role, alive)
            })
        });
        Ok(Snapshot::from_pairs(alive))
    }
}
