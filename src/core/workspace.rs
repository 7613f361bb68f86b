//! Temp and data directories.
//!
//! Each run gets a private `Runway_<pid>_<random>` directory below the temp
//! root. Leftovers from earlier runs are swept once they are old enough or
//! their owning process is gone.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::core::error::{BootError, BootResult};
use crate::util::fs::{ensure_dir, modified_age, remove_path};

/// Name prefix of every run artifact in the temp root.
pub const RUN_PREFIX: &str = "Runway_";

/// File written and deleted to prove the temp root is usable.
pub const PROBE_FILE: &str = "tempTest.txt";

/// Subdirectory of the data root holding exported libraries.
pub const LIBS_DIR: &str = "libs";

static RUN_ARTIFACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Runway_(\d+)_").expect("run artifact pattern is valid"));

/// Directories owned by this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub temp_root: PathBuf,
    pub data_root: PathBuf,
    pub lib_root: PathBuf,
    /// Fresh, private to this process.
    pub process_temp_dir: PathBuf,
}

/// Artifacts removed by a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    pub kept: usize,
}

/// Whether a process id belongs to a running process.
pub type Liveness = fn(u32) -> bool;

/// Owner of the temp and data directories.
#[derive(Debug)]
pub struct WorkspaceManager {
    temp_root: PathBuf,
    data_root: PathBuf,
    layout: Option<WorkspaceLayout>,
    liveness: Liveness,
}

impl WorkspaceManager {
    pub fn new(temp_root: impl Into<PathBuf>, data_root: impl Into<PathBuf>) -> Self {
        WorkspaceManager {
            temp_root: temp_root.into(),
            data_root: data_root.into(),
            layout: None,
            liveness: process_alive,
        }
    }

    /// Replace the process liveness probe used by [`sweep_obsolete`](Self::sweep_obsolete).
    pub fn with_liveness(mut self, liveness: Liveness) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    pub fn layout(&self) -> Option<&WorkspaceLayout> {
        self.layout.as_ref()
    }

    /// Verify the temp root and create this run's private directory.
    ///
    /// Calling again returns the layout created by the first call.
    pub fn prepare_temp_workspace(&mut self) -> BootResult<WorkspaceLayout> {
        if let Some(layout) = &self.layout {
            return Ok(layout.clone());
        }

        ensure_dir(&self.temp_root)
            .map_err(|e| BootError::workspace(&self.temp_root, format!("{:#}", e)))?;
        let probe = self.temp_root.join(PROBE_FILE);
        fs::write(&probe, b"")
            .and_then(|_| fs::remove_file(&probe))
            .map_err(|e| BootError::workspace(&self.temp_root, e))?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}_", RUN_PREFIX, std::process::id()))
            .tempdir_in(&self.temp_root)
            .map_err(|e| BootError::workspace(&self.temp_root, e))?
            .keep();

        let data_root = self.persistent_data_root()?;
        let layout = WorkspaceLayout {
            temp_root: self.temp_root.clone(),
            lib_root: data_root.join(LIBS_DIR),
            data_root,
            process_temp_dir: dir,
        };
        tracing::debug!(dir = %layout.process_temp_dir.display(), "process temp folder created");
        self.layout = Some(layout.clone());
        Ok(layout)
    }

    /// The persistent data root, created if absent.
    pub fn persistent_data_root(&self) -> BootResult<PathBuf> {
        ensure_dir(&self.data_root)
            .map_err(|e| BootError::workspace(&self.data_root, format!("{:#}", e)))?;
        Ok(self.data_root.clone())
    }

    /// Delete run artifacts older than `max_age` or owned by a dead process.
    ///
    /// This run's own directory is never touched.
    pub fn sweep_obsolete(&self, max_age: Duration) -> SweepReport {
        let mut report = SweepReport::default();
        let own = self.layout.as_ref().map(|l| l.process_temp_dir.as_path());
        let Ok(entries) = fs::read_dir(&self.temp_root) else {
            return report;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(RUN_PREFIX) || Some(path.as_path()) == own {
                continue;
            }
            let owner = owner_pid(&name);
            if owner == Some(std::process::id()) {
                report.kept += 1;
                continue;
            }

            let expired = modified_age(&path).is_some_and(|age| age > max_age);
            let orphaned = owner.is_some_and(|pid| !(self.liveness)(pid));
            if !(expired || orphaned) {
                report.kept += 1;
                continue;
            }
            match remove_path(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), expired, orphaned, "swept");
                    report.removed.push(path);
                }
                Err(e) => {
                    tracing::debug!("could not sweep {}: {:#}", path.display(), e);
                    report.kept += 1;
                }
            }
        }
        report
    }

    /// Remove this run's private directory. Only cleanup calls this.
    pub fn remove_own(&mut self) {
        if let Some(layout) = &self.layout {
            if let Err(e) = remove_path(&layout.process_temp_dir) {
                tracing::warn!("could not remove temp folder: {:#}", e);
            }
        }
    }
}

/// Pid encoded in a run artifact name.
fn owner_pid(name: &str) -> Option<u32> {
    RUN_ARTIFACT
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Liveness via the OS process table.
pub fn process_alive(pid: u32) -> bool {
    use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};

    let system =
        System::new_with_specifics(RefreshKind::new().with_processes(ProcessRefreshKind::new()));
    system.process(Pid::from_u32(pid)).is_some()
}
