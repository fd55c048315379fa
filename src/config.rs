use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use supervisor_core::{ManagedApplication, Role, SupervisorConfig};

const APP_NAME: &str = "vr-supervisor";
const CONFIG_FILE: &str = "config.json";

/// On-disk configuration.
///
/// ```json
/// {
///   "supervisor": { "poll_interval_secs": 15 },
///   "applications": { "target_app": ["D:\\Games\\VRChat\\VRChat.exe"] }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub supervisor: SupervisorConfig,
    /// Candidate paths per role. Replaces the built-in candidates for the
    /// roles it names.
    pub applications: BTreeMap<Role, Vec<PathBuf>>,
}

impl FileConfig {
    /// Load from `path`, or from the default location when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// The built-in applications, with candidate overrides applied.
    pub fn applications(&self) -> Vec<ManagedApplication> {
        Role::ALL
            .iter()
            .map(|role| {
                let app = ManagedApplication::builtin(*role);
                match self.applications.get(role) {
                    Some(candidates) => app.with_candidates(candidates.iter().cloned()),
                    None => app,
                }
            })
            .collect()
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}
