//! OS dynamic loading seam.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};

/// Loads a shared library from a real filesystem path.
pub trait NativeLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<()>;
}

/// Loader backed by the OS dynamic linker.
///
/// Handles are kept for the life of the process; a loaded library is never
/// unloaded.
#[derive(Debug, Default)]
pub struct SystemLoader {
    handles: Mutex<Vec<libloading::Library>>,
}

impl SystemLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NativeLoader for SystemLoader {
    fn load(&self, path: &Path) -> Result<()> {
        // SAFETY: runs the library's initialisers. Only libraries exported
        // from the application's own bundle reach this point.
        let library = unsafe { libloading::Library::new(path) }
            .with_context(|| format!("failed to load {}", path.display()))?;
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(library);
        tracing::debug!(path = %path.display(), "native library loaded");
        Ok(())
    }
}
