//! Index of the library locations the process was started with.
//!
//! The list is built once, on first query, and never refreshed. Locations
//! appended later are recorded in `<data root>/classpath.pending` and only
//! show up in the index of the next launch.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use url::Url;

use super::archive::ArchiveKind;
use crate::core::error::{BootError, BootResult};
use crate::util::fs::{ensure_dir, slashify};

/// File in the data root holding locations deferred to the next launch.
pub const PENDING_FILE: &str = "classpath.pending";

/// One resolved location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClasspathEntry {
    uri: Url,
}

impl ClasspathEntry {
    /// Entry for a filesystem path, made absolute against the working directory.
    pub fn from_path(path: &Path) -> Option<Self> {
        let absolute = std::path::absolute(path).ok()?;
        Url::from_file_path(absolute)
            .ok()
            .map(|uri| ClasspathEntry { uri })
    }

    /// Entry from a `file:` URI or a plain path.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match Url::parse(raw) {
            Ok(uri) if uri.scheme() == "file" => Some(ClasspathEntry { uri }),
            _ => Self::from_path(Path::new(raw)),
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn path(&self) -> PathBuf {
        self.uri
            .to_file_path()
            .unwrap_or_else(|_| PathBuf::from(self.uri.path()))
    }

    pub fn is_archive(&self) -> bool {
        ArchiveKind::detect(&self.path()).is_some()
    }

    fn slashified(&self) -> String {
        slashify(&self.path())
    }
}

impl fmt::Display for ClasspathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slashified())
    }
}

/// Result of [`ClasspathIndex::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Already resolvable; carries the matching location.
    AlreadyPresent(PathBuf),
    /// Recorded for the next launch.
    Deferred,
}

/// Lazily built, first-match-wins location index.
#[derive(Debug)]
pub struct ClasspathIndex {
    seeds: Vec<PathBuf>,
    pending_file: Option<PathBuf>,
    entries: OnceLock<Vec<ClasspathEntry>>,
    deferred: Vec<PathBuf>,
}

impl ClasspathIndex {
    /// Index over `seeds`, plus whatever an earlier run left in `pending_file`.
    pub fn new(seeds: Vec<PathBuf>, pending_file: Option<PathBuf>) -> Self {
        ClasspathIndex {
            seeds,
            pending_file,
            entries: OnceLock::new(),
            deferred: Vec::new(),
        }
    }

    /// Snapshot of the resolved locations, built on first call.
    pub fn entries(&self) -> &[ClasspathEntry] {
        self.entries.get_or_init(|| self.build())
    }

    fn build(&self) -> Vec<ClasspathEntry> {
        let mut raw: Vec<String> = self
            .seeds
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        if let Some(pending) = self.pending_file.as_deref() {
            if let Ok(text) = std::fs::read_to_string(pending) {
                raw.extend(text.lines().map(str::to_string));
            }
        }

        let mut entries: Vec<ClasspathEntry> = Vec::new();
        for item in raw {
            match ClasspathEntry::parse(&item) {
                Some(entry) if !entries.contains(&entry) => entries.push(entry),
                Some(_) => {}
                None if item.trim().is_empty() => {}
                None => tracing::debug!(entry = %item, "ignoring unusable location"),
            }
        }
        tracing::debug!(count = entries.len(), "classpath index built");
        entries
    }

    /// First location whose path contains `needle`, ignoring case.
    ///
    /// With `must_be_archive`, only archives whose file name contains the
    /// needle qualify, and a name where the needle directly follows a digit
    /// is skipped (`opencv4java` does not match `java`).
    pub fn locate(&self, needle: &str, must_be_archive: bool) -> Option<PathBuf> {
        self.locate_excluding(needle, must_be_archive, &[])
    }

    /// [`locate`](Self::locate), skipping locations containing any of `exclude`.
    pub fn locate_excluding(
        &self,
        needle: &str,
        must_be_archive: bool,
        exclude: &[&str],
    ) -> Option<PathBuf> {
        let needle = needle.replace('\\', "/").to_lowercase();
        let exclude: Vec<String> = exclude.iter().map(|e| e.to_lowercase()).collect();

        self.entries()
            .iter()
            .find(|entry| {
                let path = entry.slashified().to_lowercase();
                if !path.contains(&needle) || exclude.iter().any(|e| path.contains(e)) {
                    return false;
                }
                if !must_be_archive {
                    return true;
                }
                let name = entry
                    .path()
                    .file_name()
                    .map(|n| n.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                entry.is_archive() && name.contains(&needle) && !digit_prefixed(&name, &needle)
            })
            .map(ClasspathEntry::path)
    }

    /// Request `location` be resolvable.
    ///
    /// The running process cannot extend its own resolved set, so a location
    /// not already present is persisted for the next launch. Presence is
    /// decided on the absolute path, not by substring.
    pub fn append(&mut self, location: &str) -> BootResult<AppendOutcome> {
        let entry = ClasspathEntry::parse(location)
            .ok_or_else(|| BootError::unavailable(location, "not a usable location"))?;
        let path = entry.path();
        if self.entries().iter().any(|e| e.path() == path) {
            return Ok(AppendOutcome::AlreadyPresent(path));
        }
        if !path.exists() {
            tracing::warn!(path = %path.display(), "deferred location does not exist (yet)");
        }

        if let Some(pending) = self.pending_file.as_deref() {
            if !self.deferred.contains(&path) {
                persist(pending, &path)?;
            }
        }
        tracing::debug!(path = %path.display(), "append deferred to next launch");
        if !self.deferred.contains(&path) {
            self.deferred.push(path);
        }
        Ok(AppendOutcome::Deferred)
    }

    /// Locations deferred during this run.
    pub fn deferred(&self) -> &[PathBuf] {
        &self.deferred
    }

    /// Entries whose path contains `filter` (ignoring case), numbered by
    /// their position in the full list.
    pub fn dump(&self, filter: Option<&str>) -> Vec<(usize, &ClasspathEntry)> {
        let filter = filter.unwrap_or_default().to_uppercase();
        self.entries()
            .iter()
            .enumerate()
            .filter(|(_, e)| filter.is_empty() || e.to_string().to_uppercase().contains(&filter))
            .collect()
    }
}

fn digit_prefixed(name: &str, needle: &str) -> bool {
    name.match_indices(needle)
        .any(|(idx, _)| idx > 0 && name.as_bytes()[idx - 1].is_ascii_digit())
}

fn persist(pending: &Path, path: &Path) -> BootResult<()> {
    if let Some(parent) = pending.parent() {
        ensure_dir(parent).map_err(|e| BootError::workspace(parent, format!("{:#}", e)))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(pending)
        .map_err(|e| BootError::workspace(pending, e))?;
    writeln!(file, "{}", path.display()).map_err(|e| BootError::workspace(pending, e))
}
