//! Per-user login entry that runs the startup sequence.
//!
//! Windows gets a `.cmd` in the Startup folder, everything else an XDG
//! autostart `.desktop` file. Neither needs elevated privileges.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

const ENTRY_NAME: &str = "vr-supervisor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFormat {
    /// Batch file for the Windows Startup folder.
    Cmd,
    /// XDG autostart desktop entry.
    Desktop,
}

impl EntryFormat {
    pub fn platform() -> Self {
        if cfg!(windows) {
            Self::Cmd
        } else {
            Self::Desktop
        }
    }

    fn file_name(self) -> String {
        match self {
            Self::Cmd => format!("{}.cmd", ENTRY_NAME),
            Self::Desktop => format!("{}.desktop", ENTRY_NAME),
        }
    }

    fn render(self, exe: &Path) -> String {
        match self {
            Self::Cmd => format!(
                "@echo off\r\nstart \"\" \"{}\" run-startup\r\n",
                exe.display()
            ),
            Self::Desktop => format!(
                "[Desktop Entry]\n\
                 Type=Application\n\
                 Name=VR Supervisor\n\
                 Comment=Start the VR session applications in order\n\
                 Exec=\"{}\" run-startup\n\
                 Terminal=false\n\
                 X-GNOME-Autostart-enabled=true\n",
                exe.display()
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AutorunStatus {
    pub installed: bool,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Autorun {
    dir: PathBuf,
    format: EntryFormat,
}

impl Autorun {
    /// Entry in `dir`, in this platform's format.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self::with_format(dir, EntryFormat::platform())
    }

    pub fn with_format(dir: impl Into<PathBuf>, format: EntryFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    /// The per-user login folder for this platform.
    pub fn default_location() -> Result<Self> {
        let config =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        let dir = if cfg!(windows) {
            config
                .join("Microsoft")
                .join("Windows")
                .join("Start Menu")
                .join("Programs")
                .join("Startup")
        } else {
            config.join("autostart")
        };
        Ok(Self::at(dir))
    }

    pub fn entry_path(&self) -> PathBuf {
        self.dir.join(self.format.file_name())
    }

    /// Write (or overwrite) the entry so `exe run-startup` runs at login.
    pub fn install(&self, exe: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.entry_path();
        fs::write(&path, self.format.render(exe))
            .with_context(|| format!("Failed to write autorun entry {}", path.display()))?;
        tracing::info!(path = %path.display(), "Autorun installed");
        Ok(path)
    }

    /// Remove the entry. Returns whether there was one.
    pub fn uninstall(&self) -> Result<bool> {
        let path = self.entry_path();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Autorun not installed, nothing to remove");
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove autorun entry {}", path.display()))?;
        tracing::info!(path = %path.display(), "Autorun removed");
        Ok(true)
    }

    pub fn status(&self) -> AutorunStatus {
        let path = self.entry_path();
        AutorunStatus {
            installed: path.is_file(),
            path,
        }
    }
}
