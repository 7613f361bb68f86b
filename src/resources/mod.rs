//! Resource catalog.
//!
//! Resources live either on a loose directory tree or inside an archive. The
//! [`ResourceCatalog`] hides the difference: both modes list into the same
//! [`ResourceManifest`] format and extract from it.

pub mod archive;
pub mod classpath;
pub mod manifest;
pub mod tree;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use archive::ArchiveKind;
pub use classpath::{AppendOutcome, ClasspathEntry, ClasspathIndex};
pub use manifest::{ManifestEntry, ResourceFilter, ResourceManifest, CONTENT_FILE};

use crate::core::error::{BootError, BootResult};
use crate::util::fs::{copy_to_file, write_string};

/// Outcome of an extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub extracted: usize,
    pub failed: usize,
}

impl ExtractReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Where a catalog reads its resources from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSource {
    /// Loose directory tree
    Tree(PathBuf),
    /// Zip or tar container
    Archive { path: PathBuf, kind: ArchiveKind },
}

impl ResourceSource {
    pub fn path(&self) -> &Path {
        match self {
            ResourceSource::Tree(path) => path,
            ResourceSource::Archive { path, .. } => path,
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, ResourceSource::Archive { .. })
    }
}

impl fmt::Display for ResourceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceSource::Tree(path) => write!(f, "folder {}", path.display()),
            ResourceSource::Archive { path, .. } => write!(f, "archive {}", path.display()),
        }
    }
}

/// Text decodings supported by [`ResourceCatalog::read_as_text`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1, one byte per char
    Latin1,
}

impl TextEncoding {
    fn decode(self, bytes: Vec<u8>) -> Result<String, String> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes).map_err(|e| e.to_string()),
            TextEncoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "" | "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            other => Err(format!("unsupported encoding: {}", other)),
        }
    }
}

/// Ready-made filters.
pub mod filters {
    /// Accept every directory and the files whose name contains `needle`.
    pub fn name_contains(needle: impl Into<String>) -> impl Fn(&str, &str) -> bool {
        let needle = needle.into();
        move |_dir: &str, name: &str| name.is_empty() || name.contains(needle.as_str())
    }
}

/// Unified view over one resource source.
#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    source: ResourceSource,
}

impl ResourceCatalog {
    /// Open a directory or a recognised archive.
    pub fn open(path: impl AsRef<Path>) -> BootResult<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(ResourceCatalog {
                source: ResourceSource::Tree(path.to_path_buf()),
            });
        }
        if !path.is_file() {
            return Err(BootError::unavailable(path.display().to_string(), "does not exist"));
        }
        match ArchiveKind::detect(path) {
            Some(kind) => Ok(ResourceCatalog {
                source: ResourceSource::Archive {
                    path: path.to_path_buf(),
                    kind,
                },
            }),
            None => Err(BootError::unavailable(
                path.display().to_string(),
                "neither a folder nor a supported archive",
            )),
        }
    }

    pub fn source(&self) -> &ResourceSource {
        &self.source
    }

    /// List `subtree`, using its stored content manifest when present.
    pub fn list(
        &self,
        subtree: &str,
        filter: Option<&ResourceFilter<'_>>,
    ) -> BootResult<ResourceManifest> {
        match &self.source {
            ResourceSource::Archive { path, kind } => archive::list(path, *kind, subtree, filter),
            ResourceSource::Tree(root) => {
                let dir = tree::resolve(root, subtree);
                let content = dir.join(CONTENT_FILE);
                if content.is_file() {
                    match std::fs::read_to_string(&content)
                        .map_err(|e| BootError::unavailable(content.display().to_string(), e))
                        .and_then(|text| ResourceManifest::parse(&text, subtree))
                    {
                        Ok(manifest) => {
                            tracing::debug!(path = %content.display(), "using content manifest");
                            return Ok(match filter {
                                Some(filter) => manifest.filtered(filter),
                                None => manifest,
                            });
                        }
                        Err(e) => tracing::debug!(error = %e, "falling back to folder scan"),
                    }
                }
                tree::list(&dir, filter)
            }
        }
    }

    /// Full scan of `subtree`, ignoring any stored content manifest.
    fn scan(&self, subtree: &str, filter: Option<&ResourceFilter<'_>>) -> BootResult<ResourceManifest> {
        match &self.source {
            ResourceSource::Archive { path, kind } => archive::scan(path, *kind, subtree, filter),
            ResourceSource::Tree(root) => tree::list(&tree::resolve(root, subtree), filter),
        }
    }

    /// List `subtree` as full relative paths, no directory markers.
    pub fn list_paths(
        &self,
        subtree: &str,
        filter: Option<&ResourceFilter<'_>>,
    ) -> BootResult<Vec<String>> {
        Ok(self.list(subtree, filter)?.paths())
    }

    /// Scan `subtree` and store the result as `target_dir/runwaycontent`.
    pub fn write_manifest(
        &self,
        subtree: &str,
        target_dir: &Path,
        filter: Option<&ResourceFilter<'_>>,
    ) -> BootResult<ResourceManifest> {
        let manifest = self.scan(subtree, filter)?;
        let target = target_dir.join(CONTENT_FILE);
        write_string(&target, &manifest.render())
            .map_err(|e| BootError::unavailable(target.display().to_string(), format!("{:#}", e)))?;
        tracing::debug!(path = %target.display(), files = manifest.file_count(), "wrote content manifest");
        Ok(manifest)
    }

    /// Every file the source holds. Archive names are in stream order.
    pub fn list_archive_files(&self) -> BootResult<Vec<String>> {
        match &self.source {
            ResourceSource::Archive { path, kind } => archive::list_files(path, *kind),
            ResourceSource::Tree(root) => Ok(tree::list(root, None)?.paths()),
        }
    }

    /// Extract the files named by `manifest` from `subtree` into `dest`.
    pub fn extract_to(
        &self,
        subtree: &str,
        manifest: &ResourceManifest,
        dest: &Path,
    ) -> BootResult<ExtractReport> {
        let report = match &self.source {
            ResourceSource::Archive { path, kind } => {
                archive::extract_to(path, *kind, subtree, manifest, dest)?
            }
            ResourceSource::Tree(root) => {
                tree::extract_to(&tree::resolve(root, subtree), manifest, dest)
            }
        };
        tracing::debug!(
            subtree,
            dest = %dest.display(),
            extracted = report.extracted,
            failed = report.failed,
            "extracted resources"
        );
        Ok(report)
    }

    /// Bytes of `subtree/file_name`, from the source or, failing that, from
    /// the same path on the plain filesystem.
    fn read(&self, subtree: &str, file_name: &str) -> BootResult<Vec<u8>> {
        let name = manifest::join(subtree.trim_matches('/'), file_name);
        let found = match &self.source {
            ResourceSource::Archive { path, kind } => archive::read_entry(path, *kind, &name)?,
            ResourceSource::Tree(root) => tree::read(root, &name).ok(),
        };
        if let Some(bytes) = found {
            return Ok(bytes);
        }
        let direct = Path::new(subtree).join(file_name);
        std::fs::read(&direct)
            .map_err(|_| BootError::unavailable(name, "not found in source or on disk"))
    }

    /// Copy `subtree/file_name` to `out_dir/file_name`.
    pub fn extract_one(&self, subtree: &str, file_name: &str, out_dir: &Path) -> bool {
        let result = self.read(subtree, file_name).and_then(|bytes| {
            let out = tree::resolve(out_dir, file_name);
            copy_to_file(&mut bytes.as_slice(), &out)
                .map_err(|e| BootError::unavailable(out.display().to_string(), format!("{:#}", e)))
        });
        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "extract_one failed");
                false
            }
        }
    }

    /// Decode `subtree/file_name` as text.
    pub fn read_as_text(
        &self,
        subtree: &str,
        file_name: &str,
        encoding: TextEncoding,
    ) -> BootResult<String> {
        let bytes = self.read(subtree, file_name)?;
        encoding
            .decode(bytes)
            .map_err(|reason| BootError::unavailable(manifest::join(subtree, file_name), reason))
    }
}
