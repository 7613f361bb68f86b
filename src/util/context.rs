//! Runtime context.
//!
//! Built once at startup from the configuration file, the environment and
//! the platform probe, then handed to every component by reference.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use directories::ProjectDirs;
use serde::Serialize;

use crate::core::error::BootError;
use crate::core::instance::LOCK_FILE;
use crate::core::platform::{PlatformInfo, RunType};
use crate::core::workspace::LIBS_DIR;
use crate::native::{default_version, ExportLayout};
use crate::resources::classpath::PENDING_FILE;
use crate::resources::ClasspathIndex;
use crate::util::config::{Config, CONFIG_FILE, ENV_DATA};

/// Bundle names looked up next to the executable when none is configured.
const BUNDLE_CANDIDATES: &[&str] = &["natives", "natives.zip", "natives.jar", "natives.tar.gz"];

static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("org", "runway", "Runway"));

/// Default persistent data root for this platform.
pub fn default_data_root() -> PathBuf {
    match PROJECT_DIRS.as_ref() {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => std::env::temp_dir().join("Runway").join("data"),
    }
}

/// Configuration, platform and resolved locations of this run.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    config: Config,
    platform: PlatformInfo,
    temp_root: PathBuf,
    data_root: PathBuf,
    bundle: Option<PathBuf>,
}

impl RuntimeContext {
    /// Context for the running process.
    ///
    /// An unreadable config file is reported and replaced by defaults.
    pub fn new() -> Self {
        let data_root = std::env::var_os(ENV_DATA)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_root);
        let mut config = match read_config(&data_root.join(CONFIG_FILE)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}", e);
                Config::default()
            }
        };
        config.apply_env(|key| std::env::var_os(key));
        Self::from_parts(config, PlatformInfo::detect())
    }

    /// Context from explicit parts. Unset roots fall back to platform defaults.
    pub fn from_parts(config: Config, platform: PlatformInfo) -> Self {
        let temp_root = config
            .workspace
            .temp_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let data_root = config
            .workspace
            .data_root
            .clone()
            .unwrap_or_else(default_data_root);
        let bundle = config
            .natives
            .bundle
            .clone()
            .or_else(|| find_bundle(platform.executable.as_deref()));

        RuntimeContext {
            config,
            platform,
            temp_root,
            data_root,
            bundle,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn platform(&self) -> &PlatformInfo {
        &self.platform
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn lib_root(&self) -> PathBuf {
        self.data_root.join(LIBS_DIR)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.temp_root.join(LOCK_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_root.join(CONFIG_FILE)
    }

    /// Archive or folder holding the bundled native libraries.
    pub fn bundle(&self) -> Option<&Path> {
        self.bundle.as_deref()
    }

    pub fn run_type(&self) -> RunType {
        RunType::of(self.bundle())
    }

    pub fn export_layout(&self) -> ExportLayout {
        let natives = &self.config.natives;
        ExportLayout {
            family: self.platform.family,
            libs_root: self.lib_root(),
            subtree: natives
                .subtree
                .clone()
                .unwrap_or_else(|| self.platform.natives_subtree()),
            version: natives
                .version
                .clone()
                .unwrap_or_else(|| default_version(self.bundle())),
            help_url: natives.help_url.clone(),
        }
    }

    /// Location index seeded from the bundle, the executable's folder and
    /// the configured entries.
    pub fn classpath(&self) -> ClasspathIndex {
        let mut seeds = Vec::new();
        seeds.extend(self.bundle.clone());
        if let Some(dir) = self.platform.executable.as_deref().and_then(Path::parent) {
            seeds.push(dir.to_path_buf());
        }
        seeds.extend(self.config.classpath.entries.iter().cloned());
        ClasspathIndex::new(seeds, Some(self.data_root.join(PENDING_FILE)))
    }

    /// Summary of this run's environment.
    pub fn environment_report(
        &self,
        classpath: &ClasspathIndex,
        filter: Option<&str>,
    ) -> EnvironmentReport {
        EnvironmentReport {
            version: self.platform.app_version.to_string(),
            os: self.platform.describe(),
            arch: self.platform.arch.to_string(),
            runtime: self.platform.runtime.version.clone(),
            run_type: self.run_type().to_string(),
            running_in_project: self.platform.running_in_project(),
            temp_root: self.temp_root.clone(),
            data_root: self.data_root.clone(),
            lib_folder: self.export_layout().folder(),
            bundle: self.bundle.clone(),
            classpath: classpath
                .dump(filter)
                .into_iter()
                .map(|(idx, entry)| (idx, entry.to_string()))
                .collect(),
        }
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Read the config file; a missing file means defaults.
pub fn read_config(path: &Path) -> Result<Config, BootError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    Config::load(path).map_err(|e| BootError::Config {
        path: path.to_path_buf(),
        reason: format!("{:#}", e),
    })
}

fn find_bundle(executable: Option<&Path>) -> Option<PathBuf> {
    let dir = executable?.parent()?;
    BUNDLE_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.exists())
}

/// What `runway env` prints.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentReport {
    pub version: String,
    pub os: String,
    pub arch: String,
    pub runtime: String,
    pub run_type: String,
    pub running_in_project: bool,
    pub temp_root: PathBuf,
    pub data_root: PathBuf,
    pub lib_folder: PathBuf,
    pub bundle: Option<PathBuf>,
    pub classpath: Vec<(usize, String)>,
}

impl fmt::Display for EnvironmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "runway {} running {}", self.version, self.run_type)?;
        writeln!(f, "  os:         {}", self.os)?;
        writeln!(f, "  runtime:    {}", self.runtime)?;
        if self.running_in_project {
            writeln!(f, "  (running in a build tree)")?;
        }
        writeln!(f, "  temp root:  {}", self.temp_root.display())?;
        writeln!(f, "  data root:  {}", self.data_root.display())?;
        writeln!(f, "  lib folder: {}", self.lib_folder.display())?;
        match &self.bundle {
            Some(bundle) => writeln!(f, "  bundle:     {}", bundle.display())?,
            None => writeln!(f, "  bundle:     (none)")?,
        }
        writeln!(f, "  classpath:")?;
        for (idx, entry) in &self.classpath {
            writeln!(f, "  {:3}: {}", idx, entry)?;
        }
        Ok(())
    }
}
