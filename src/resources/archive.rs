//! Archive addressing: resources are entries inside a zip or tar container.
//!
//! Every walk is a single forward pass over the container in a fixed order:
//! central-directory order for zip, stream order for tar. Listing and
//! extraction both depend on this. A manifest produced by [`list`] lists
//! files in that order, and [`extract_to`] merge-joins it against a fresh
//! pass without ever rewinding.

use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::ControlFlow;
use std::path::Path;

use flate2::read::GzDecoder;

use super::manifest::{split_path, ManifestBuilder, ResourceFilter, ResourceManifest, CONTENT_FILE};
use super::tree::resolve;
use super::ExtractReport;
use crate::core::error::{BootError, BootResult};
use crate::util::fs::copy_to_file;

/// Container formats understood in archive mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.zip` and `.jar`
    Zip,
    /// `.tar`
    Tar,
    /// `.tar.gz` and `.tgz`
    TarGz,
}

impl ArchiveKind {
    /// Detect the container format from the file name.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") || name.ends_with(".jar") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else {
            None
        }
    }
}

/// Entry callback: `(name, is_dir, contents)`.
type Visitor<'a> = dyn FnMut(&str, bool, &mut dyn Read) -> BootResult<ControlFlow<()>> + 'a;

/// Walk the container once, in archive order, until the visitor breaks.
fn stream(path: &Path, kind: ArchiveKind, visit: &mut Visitor<'_>) -> BootResult<()> {
    let file = File::open(path).map_err(|e| BootError::unavailable(display(path), e))?;
    match kind {
        ArchiveKind::Zip => stream_zip(path, file, visit),
        ArchiveKind::Tar => stream_tar(path, BufReader::new(file), visit),
        ArchiveKind::TarGz => stream_tar(path, GzDecoder::new(BufReader::new(file)), visit),
    }
}

/// Zip entries in central-directory order.
///
/// The central directory carries sizes for entries written with a trailing
/// data descriptor, which is how `jar` and most streaming writers emit them.
fn stream_zip(path: &Path, file: File, visit: &mut Visitor<'_>) -> BootResult<()> {
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| BootError::unavailable(display(path), e))?;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| BootError::unavailable(display(path), e))?;
        let name = entry.name().replace('\\', "/");
        let is_dir = entry.is_dir();
        if visit(&name, is_dir, &mut entry)?.is_break() {
            break;
        }
    }
    Ok(())
}

fn stream_tar<R: Read>(path: &Path, reader: R, visit: &mut Visitor<'_>) -> BootResult<()> {
    let mut archive = tar::Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|e| BootError::unavailable(display(path), e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| BootError::unavailable(display(path), e))?;
        let name = entry
            .path()
            .map_err(|e| BootError::unavailable(display(path), e))?
            .to_string_lossy()
            .replace('\\', "/");
        let name = name.trim_start_matches("./").to_string();
        let is_dir = entry.header().entry_type().is_dir();
        if visit(&name, is_dir, &mut entry)?.is_break() {
            break;
        }
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Normalize a subtree to the entry-name prefix it selects (`"lib/"`, or `""`).
fn prefix_of(subtree: &str) -> String {
    let trimmed = subtree.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Path of `name` relative to `prefix`, if it lies below it and is safe.
fn relative<'n>(name: &'n str, prefix: &str) -> Option<&'n str> {
    let rel = name.strip_prefix(prefix)?.trim_end_matches('/');
    if rel.is_empty() || rel.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
        return None;
    }
    Some(rel)
}

/// Read one entry by its full name. `None` if the container lacks it.
pub fn read_entry(path: &Path, kind: ArchiveKind, name: &str) -> BootResult<Option<Vec<u8>>> {
    let name = name.trim_start_matches('/');
    if kind == ArchiveKind::Zip {
        let file = File::open(path).map_err(|e| BootError::unavailable(display(path), e))?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| BootError::unavailable(display(path), e))?;
        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(BootError::unavailable(display(path), e)),
        };
        let mut buf = Vec::new();
        entry
            .read_to_end(&mut buf)
            .map_err(|e| BootError::unavailable(name, e))?;
        return Ok(Some(buf));
    }

    let mut found = None;
    stream(path, kind, &mut |entry, is_dir, contents| {
        if is_dir || entry != name {
            return Ok(ControlFlow::Continue(()));
        }
        let mut buf = Vec::new();
        contents
            .read_to_end(&mut buf)
            .map_err(|e| BootError::unavailable(entry, e))?;
        found = Some(buf);
        Ok(ControlFlow::Break(()))
    })?;
    Ok(found)
}

/// List `subtree`, preferring a stored content manifest over a full scan.
pub fn list(
    path: &Path,
    kind: ArchiveKind,
    subtree: &str,
    filter: Option<&ResourceFilter<'_>>,
) -> BootResult<ResourceManifest> {
    let content = format!("{}{}", prefix_of(subtree), CONTENT_FILE);
    if let Some(bytes) = read_entry(path, kind, &content)? {
        let text = String::from_utf8_lossy(&bytes);
        match ResourceManifest::parse(&text, subtree) {
            Ok(manifest) => {
                tracing::debug!(archive = %path.display(), subtree, "using content manifest");
                return Ok(match filter {
                    Some(filter) => manifest.filtered(filter),
                    None => manifest,
                });
            }
            Err(e) => tracing::debug!(error = %e, "falling back to full scan"),
        }
    }
    scan(path, kind, subtree, filter)
}

/// Full single-pass listing of `subtree`, ignoring any stored manifest.
pub fn scan(
    path: &Path,
    kind: ArchiveKind,
    subtree: &str,
    filter: Option<&ResourceFilter<'_>>,
) -> BootResult<ResourceManifest> {
    tracing::debug!(archive = %path.display(), subtree, "scanning archive");
    let prefix = prefix_of(subtree);
    let mut builder = ManifestBuilder::new(filter);
    stream(path, kind, &mut |name, is_dir, _| {
        if !is_dir {
            if let Some(rel) = relative(name, &prefix) {
                let (dir, file) = split_path(rel);
                builder.push(dir, file);
            }
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(builder.finish())
}

/// Every non-directory entry name, in stream order.
pub fn list_files(path: &Path, kind: ArchiveKind) -> BootResult<Vec<String>> {
    let mut names = Vec::new();
    stream(path, kind, &mut |name, is_dir, _| {
        if !is_dir {
            names.push(name.to_string());
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(names)
}

/// Extract the manifest's files from `subtree` into `dest` in one pass.
///
/// Manifest order must match stream order. Entries the cursor is not
/// waiting for are skipped; manifest files never reached count as failures.
pub fn extract_to(
    path: &Path,
    kind: ArchiveKind,
    subtree: &str,
    manifest: &ResourceManifest,
    dest: &Path,
) -> BootResult<ExtractReport> {
    let expected = manifest.paths();
    let prefix = prefix_of(subtree);
    let mut report = ExtractReport::default();
    let mut cursor = 0;

    if !expected.is_empty() {
        stream(path, kind, &mut |name, is_dir, contents| {
            if is_dir {
                return Ok(ControlFlow::Continue(()));
            }
            let Some(rel) = relative(name, &prefix) else {
                return Ok(ControlFlow::Continue(()));
            };
            if rel != expected[cursor] {
                return Ok(ControlFlow::Continue(()));
            }
            match copy_to_file(contents, &resolve(dest, rel)) {
                Ok(_) => report.extracted += 1,
                Err(e) => {
                    tracing::debug!(entry = name, error = %format!("{:#}", e), "extract failed");
                    report.failed += 1;
                }
            }
            cursor += 1;
            if cursor == expected.len() {
                Ok(ControlFlow::Break(()))
            } else {
                Ok(ControlFlow::Continue(()))
            }
        })?;
    }

    let missed = expected.len() - cursor;
    if missed > 0 {
        tracing::debug!(
            missed,
            next = expected[cursor].as_str(),
            "manifest entries not found in stream order"
        );
        report.failed += missed;
    }
    Ok(report)
}
