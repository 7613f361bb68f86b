//! Export-then-load provisioning of bundled native libraries.
//!
//! Libraries are copied out of the bundle into `<data root>/libs/natives_<version>`
//! once per version. The folder is trusted only when it carries a version
//! marker with the expected content; the marker is written after every file,
//! so an interrupted export leaves no marker and is redone on the next run.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::loader::NativeLoader;
use crate::core::error::{BootError, BootResult};
use crate::core::platform::OsFamily;
use crate::resources::ResourceCatalog;
use crate::util::fs::{remove_path, write_string};
use crate::util::{hash, process};

/// Marker file inside an export folder holding its version.
pub const VERSION_MARKER: &str = ".runway-version";

/// Name prefix of export folders below the libs root.
pub const EXPORT_PREFIX: &str = "natives_";

/// Version stamp for a bundle: the package version, plus a short digest of
/// the bundle when it is a single archive file.
pub fn default_version(bundle: Option<&Path>) -> String {
    let base = env!("CARGO_PKG_VERSION");
    match bundle.filter(|b| b.is_file()).map(hash::sha256_file) {
        Some(Ok(digest)) => format!("{}-{}", base, hash::short(&digest)),
        _ => base.to_string(),
    }
}

/// Where and how libraries are exported.
#[derive(Debug, Clone)]
pub struct ExportLayout {
    pub family: OsFamily,
    /// Parent of all export folders (`<data root>/libs`).
    pub libs_root: PathBuf,
    /// Bundle subtree holding this platform's libraries.
    pub subtree: String,
    pub version: String,
    pub help_url: String,
}

impl ExportLayout {
    pub fn folder(&self) -> PathBuf {
        self.libs_root
            .join(format!("{}{}", EXPORT_PREFIX, self.version))
    }
}

/// Per-process state of one library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRecord {
    pub canonical_name: String,
    pub platform_file_name: String,
    /// Set once, never cleared.
    pub loaded: bool,
    pub source_path: PathBuf,
}

/// Exports bundled libraries and loads each at most once per process.
pub struct NativeLibraryProvisioner {
    layout: ExportLayout,
    bundle: Option<ResourceCatalog>,
    loader: Box<dyn NativeLoader>,
    records: Mutex<HashMap<String, Arc<Mutex<LibraryRecord>>>>,
    exported: Mutex<bool>,
}

impl NativeLibraryProvisioner {
    pub fn new(
        layout: ExportLayout,
        bundle: Option<ResourceCatalog>,
        loader: Box<dyn NativeLoader>,
    ) -> Self {
        NativeLibraryProvisioner {
            layout,
            bundle,
            loader,
            records: Mutex::new(HashMap::new()),
            exported: Mutex::new(false),
        }
    }

    pub fn layout(&self) -> &ExportLayout {
        &self.layout
    }

    pub fn export_folder(&self) -> PathBuf {
        self.layout.folder()
    }

    /// Make sure the export folder is complete for this version.
    pub fn ensure_exported(&self) -> BootResult<PathBuf> {
        let mut exported = self.exported.lock().unwrap_or_else(|p| p.into_inner());
        let folder = self.layout.folder();
        if *exported {
            return Ok(folder);
        }

        if self.marker_matches(&folder) {
            tracing::debug!(folder = %folder.display(), "export folder is current");
        } else {
            self.export(&folder)?;
        }
        self.remove_stale_exports();
        *exported = true;
        Ok(folder)
    }

    fn marker_matches(&self, folder: &Path) -> bool {
        fs::read_to_string(folder.join(VERSION_MARKER))
            .map(|v| v.trim() == self.layout.version)
            .unwrap_or(false)
    }

    fn export(&self, folder: &Path) -> BootResult<()> {
        let fail = |reason: String| BootError::LibraryLoadFailed {
            library: folder.display().to_string(),
            reason,
            help_url: self.layout.help_url.clone(),
        };

        if folder.exists() {
            tracing::debug!(folder = %folder.display(), "export folder outdated or incomplete, wiping");
        }
        remove_path(folder).map_err(|e| fail(format!("{:#}", e)))?;

        let bundle = self
            .bundle
            .as_ref()
            .ok_or_else(|| fail("no native library bundle configured".to_string()))?;
        let manifest = bundle
            .list(&self.layout.subtree, None)
            .map_err(|e| fail(e.to_string()))?;
        if manifest.is_empty() {
            return Err(fail(format!(
                "{} holds no libraries below {}",
                bundle.source(),
                self.layout.subtree
            )));
        }

        tracing::info!(
            version = %self.layout.version,
            folder = %folder.display(),
            "exporting native libraries"
        );
        let report = bundle
            .extract_to(&self.layout.subtree, &manifest, folder)
            .map_err(|e| fail(e.to_string()));
        let report = match report {
            Ok(report) if report.is_complete() => report,
            Ok(report) => {
                let _ = remove_path(folder);
                return Err(fail(format!("{} of {} files failed to export", report.failed, manifest.file_count())));
            }
            Err(e) => {
                let _ = remove_path(folder);
                return Err(e);
            }
        };

        write_string(&folder.join(VERSION_MARKER), &self.layout.version).map_err(|e| {
            let _ = remove_path(folder);
            fail(format!("{:#}", e))
        })?;
        tracing::debug!(files = report.extracted, "native libraries exported");
        Ok(())
    }

    /// Remove export folders left by other versions.
    fn remove_stale_exports(&self) {
        let current = format!("{}{}", EXPORT_PREFIX, self.layout.version);
        let Ok(entries) = fs::read_dir(&self.layout.libs_root) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(EXPORT_PREFIX) && name != current {
                match remove_path(&entry.path()) {
                    Ok(()) => tracing::debug!(folder = %name, "removed stale export folder"),
                    Err(e) => tracing::warn!("could not remove stale export folder {}: {:#}", name, e),
                }
            }
        }
    }

    fn record(&self, name: &str) -> Arc<Mutex<LibraryRecord>> {
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        records
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(LibraryRecord {
                    canonical_name: name.to_string(),
                    platform_file_name: self.layout.family.library_file_name(name),
                    loaded: false,
                    source_path: PathBuf::new(),
                }))
            })
            .clone()
    }

    /// Load `name` unless this process already did.
    ///
    /// Returns `true` when this call performed the load, `false` when the
    /// library was already loaded. Concurrent calls for the same name are
    /// serialized, so the OS loader sees at most one request per name.
    pub fn ensure_loaded(&self, name: &str) -> BootResult<bool> {
        let record = self.record(name);
        let mut record = record.lock().unwrap_or_else(|p| p.into_inner());
        if record.loaded {
            return Ok(false);
        }

        let folder = self.ensure_exported()?;
        let path = folder.join(&record.platform_file_name);
        if !path.is_file() {
            return Err(self.load_failed(&record.platform_file_name, &path, "not found in export folder".to_string()));
        }
        if let Err(e) = self.loader.load(&path) {
            return Err(self.load_failed(&record.platform_file_name, &path, format!("{:#}", e)));
        }

        record.loaded = true;
        record.source_path = path;
        tracing::debug!(library = %record.platform_file_name, "loaded");
        Ok(true)
    }

    fn load_failed(&self, file_name: &str, path: &Path, reason: String) -> BootError {
        tracing::error!(
            library = file_name,
            path = %path.display(),
            "problem with native library: {}",
            reason
        );
        let mut reason = reason;
        if self.layout.family == OsFamily::Unix && path.is_file() {
            if let Some(missing) = process::missing_dependencies(path) {
                for dep in &missing {
                    tracing::error!(dependency = %dep, "not found");
                }
                if !missing.is_empty() {
                    reason = format!("{} (missing: {})", reason, missing.join(", "));
                }
            }
        }
        tracing::error!("probably dependent libraries are missing, see {}", self.layout.help_url);
        BootError::LibraryLoadFailed {
            library: file_name.to_string(),
            reason,
            help_url: self.layout.help_url.clone(),
        }
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        let records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        records
            .get(name)
            .map(|r| r.lock().unwrap_or_else(|p| p.into_inner()).loaded)
            .unwrap_or(false)
    }

    /// Snapshot of every library requested so far, sorted by name.
    pub fn records(&self) -> Vec<LibraryRecord> {
        let records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        let mut out: Vec<LibraryRecord> = records
            .values()
            .map(|r| r.lock().unwrap_or_else(|p| p.into_inner()).clone())
            .collect();
        out.sort_by(|a, b| a.canonical_name.cmp(&b.canonical_name));
        out
    }

    /// Loader search-path variable and its value with the export folder first.
    ///
    /// Meant for spawning children that load the exported libraries
    /// themselves; the running process's own search path is left alone.
    pub fn loader_search_path(&self) -> BootResult<(&'static str, OsString)> {
        let var = self.layout.family.loader_path_var();
        let value = prepend_path(&self.layout.folder(), std::env::var_os(var)).map_err(|e| {
            BootError::LibraryLoadFailed {
                library: self.layout.folder().display().to_string(),
                reason: e.to_string(),
                help_url: self.layout.help_url.clone(),
            }
        })?;
        Ok((var, value))
    }
}

fn prepend_path(
    first: &Path,
    existing: Option<OsString>,
) -> Result<OsString, std::env::JoinPathsError> {
    let mut paths = vec![first.to_path_buf()];
    if let Some(existing) = existing {
        paths.extend(std::env::split_paths(&existing).filter(|p| p != first));
    }
    std::env::join_paths(paths)
}
