//! Configuration file support.
//!
//! The configuration lives at `<data root>/config.toml`. A missing file means
//! defaults; environment variables override individual settings:
//! - `RUNWAY_TEMP` - temp root
//! - `RUNWAY_DATA` - persistent data root
//! - `RUNWAY_CLASSPATH` - extra resolved library locations (path-separated)

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::diagnostic::suggestions;

/// Environment variable overriding the temp root.
pub const ENV_TEMP: &str = "RUNWAY_TEMP";

/// Environment variable overriding the data root.
pub const ENV_DATA: &str = "RUNWAY_DATA";

/// Environment variable listing extra resolved locations.
pub const ENV_CLASSPATH: &str = "RUNWAY_CLASSPATH";

/// Name of the configuration file inside the data root.
pub const CONFIG_FILE: &str = "config.toml";

/// Runway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Temp and data locations
    pub workspace: WorkspaceConfig,

    /// Single-instance settings
    pub instance: InstanceConfig,

    /// Bundled native libraries
    pub natives: NativesConfig,

    /// Resolved library locations
    pub classpath: ClasspathConfig,
}

/// Workspace-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Temp root (defaults to the OS temp directory)
    pub temp_root: Option<PathBuf>,

    /// Persistent data root (defaults to the platform data directory)
    pub data_root: Option<PathBuf>,

    /// Age after which leftover run artifacts are swept
    pub obsolete_after_secs: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        WorkspaceConfig {
            temp_root: None,
            data_root: None,
            obsolete_after_secs: 2 * 24 * 60 * 60,
        }
    }
}

/// Single-instance configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Skip the instance lock even in interactive mode
    pub allow_multiple: bool,
}

/// Native library configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NativesConfig {
    /// Archive or directory holding the bundled libraries
    pub bundle: Option<PathBuf>,

    /// Subtree inside the bundle (defaults to `natives/<os>/<arch>`)
    pub subtree: Option<String>,

    /// Version stamp written into the export folder
    pub version: Option<String>,

    /// Help page shown when a library fails to load
    pub help_url: String,
}

impl Default for NativesConfig {
    fn default() -> Self {
        NativesConfig {
            bundle: None,
            subtree: None,
            version: None,
            help_url: suggestions::NATIVE_HELP_URL.to_string(),
        }
    }
}

/// Resolved-location configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClasspathConfig {
    /// Extra locations appended after the environment entries
    pub entries: Vec<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<OsString>,
    {
        if let Some(temp) = lookup(ENV_TEMP).filter(|v| !v.is_empty()) {
            self.workspace.temp_root = Some(PathBuf::from(temp));
        }
        if let Some(data) = lookup(ENV_DATA).filter(|v| !v.is_empty()) {
            self.workspace.data_root = Some(PathBuf::from(data));
        }
        if let Some(cp) = lookup(ENV_CLASSPATH) {
            let mut entries: Vec<PathBuf> = std::env::split_paths(&cp)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            entries.append(&mut self.classpath.entries);
            self.classpath.entries = entries;
        }
    }
}
