//! Test doubles and fixtures for Runway unit tests.
//!
//! The fakes record what the code under test asked of them so tests can
//! assert on call counts and ordering without touching the OS loader or a
//! real terminal.
//!
//! # Example
//!
//! ```rust,ignore
//! use runway::test_support::{natives_bundle, FakeLoader};
//!
//! #[test]
//! fn test_example() {
//!     let loader = FakeLoader::new().failing("libbroken.so");
//!     // hand `Box::new(loader.clone())` to a provisioner...
//!     assert_eq!(loader.count(), 0);
//! }
//! ```

pub mod fixtures;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};

pub use fixtures::*;

use crate::core::lifecycle::{CleanupPhase, ProgressReporter, Subsystem};
use crate::native::NativeLoader;
use crate::util::config::Config;

/// Config rooted below `base`: temp in `base/temp`, data in `base/data`.
pub fn test_config(base: &Path) -> Config {
    let mut config = Config::default();
    config.workspace.temp_root = Some(base.join("temp"));
    config.workspace.data_root = Some(base.join("data"));
    config.natives.help_url = "https://example.com/help".to_string();
    config
}

/// Loader that records every path instead of calling the OS.
#[derive(Debug, Clone, Default)]
pub struct FakeLoader {
    calls: Arc<Mutex<Vec<PathBuf>>>,
    failing: Option<String>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every load of a file named `file_name`.
    pub fn failing(mut self, file_name: &str) -> Self {
        self.failing = Some(file_name.to_string());
        self
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

impl NativeLoader for FakeLoader {
    fn load(&self, path: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        if name.is_some() && name == self.failing {
            bail!("undefined symbol: fake_init");
        }
        Ok(())
    }
}

/// Reporter that keeps every message, prefixed with its kind.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn action(&self, msg: &str) {
        self.messages.lock().unwrap().push(format!("action: {msg}"));
    }

    fn step(&self, msg: &str) {
        self.messages.lock().unwrap().push(format!("step: {msg}"));
    }
}

/// Subsystem that appends its name to a shared journal on cleanup.
#[derive(Debug, Clone)]
pub struct RecordingSubsystem {
    name: String,
    phase: CleanupPhase,
    journal: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingSubsystem {
    pub fn new(name: &str, phase: CleanupPhase, journal: &Arc<Mutex<Vec<String>>>) -> Self {
        RecordingSubsystem {
            name: name.to_string(),
            phase,
            journal: Arc::clone(journal),
            fail: false,
        }
    }

    /// Record the call, then report an error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Subsystem for RecordingSubsystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn phase(&self) -> CleanupPhase {
        self.phase
    }

    fn cleanup(&self) -> Result<()> {
        self.journal.lock().unwrap().push(self.name.clone());
        if self.fail {
            bail!("{} refused to close", self.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_loader_records_and_fails() {
        let loader = FakeLoader::new().failing("libbad.so");
        let shared = loader.clone();

        loader.load(Path::new("/x/libgood.so")).unwrap();
        assert!(loader.load(Path::new("/x/libbad.so")).is_err());

        assert_eq!(shared.count(), 2);
        assert_eq!(shared.calls()[0], PathBuf::from("/x/libgood.so"));
    }

    #[test]
    fn test_recording_subsystem() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let sub = RecordingSubsystem::new("overlay", CleanupPhase::Overlays, &journal).failing();
        assert!(sub.cleanup().is_err());
        assert_eq!(*journal.lock().unwrap(), vec!["overlay".to_string()]);
    }
}
