//! Loose-tree addressing: resources are plain files under a root directory.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::manifest::{split_path, ManifestBuilder, ResourceFilter, ResourceManifest};
use super::ExtractReport;
use crate::core::error::{BootError, BootResult};
use crate::util::fs::{copy_to_file, relative_path, slashify};

/// Resolve a `/`-separated relative path under `root`.
pub fn resolve(root: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |acc, seg| acc.join(seg))
}

/// Pre-order walk of `dir`, files before subdirectories, names sorted.
pub fn list(dir: &Path, filter: Option<&ResourceFilter<'_>>) -> BootResult<ResourceManifest> {
    if !dir.is_dir() {
        return Err(BootError::unavailable(
            dir.display().to_string(),
            "not a directory",
        ));
    }
    tracing::debug!(path = %dir.display(), "scanning folder");

    let mut builder = ManifestBuilder::new(filter);
    let mut walker = WalkDir::new(dir)
        .min_depth(1)
        .sort_by(|a, b| {
            let a_dir = a.file_type().is_dir();
            let b_dir = b.file_type().is_dir();
            a_dir.cmp(&b_dir).then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| BootError::unavailable(dir.display().to_string(), e))?;
        let rel = slashify(&relative_path(dir, entry.path()));
        if entry.file_type().is_dir() {
            if !builder.dir_accepted(&rel) {
                walker.skip_current_dir();
            }
            continue;
        }
        let (parent, name) = split_path(&rel);
        if builder.push(parent, name) {
            tracing::trace!(dir = if parent.is_empty() { "." } else { parent }, name, "adding");
        }
    }

    Ok(builder.finish())
}

/// Open a file below `root`.
pub fn open(root: &Path, rel: &str) -> BootResult<File> {
    let path = resolve(root, rel);
    File::open(&path).map_err(|e| BootError::unavailable(path.display().to_string(), e))
}

/// Copy every manifest file from `dir` into `dest`, keeping relative paths.
pub fn extract_to(dir: &Path, manifest: &ResourceManifest, dest: &Path) -> ExtractReport {
    let mut report = ExtractReport::default();
    for rel in manifest.paths() {
        let copied = open(dir, &rel).and_then(|mut file| {
            copy_to_file(&mut file, &resolve(dest, &rel))
                .map_err(|e| BootError::unavailable(rel.clone(), format!("{:#}", e)))
        });
        match copied {
            Ok(_) => report.extracted += 1,
            Err(e) => {
                tracing::debug!(error = %e, "extract skipped");
                report.failed += 1;
            }
        }
    }
    report
}

/// Read a whole file below `root`.
pub fn read(root: &Path, rel: &str) -> BootResult<Vec<u8>> {
    let path = resolve(root, rel);
    fs::read(&path).map_err(|e| BootError::unavailable(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TreeFixture;
    use tempfile::TempDir;

    #[test]
    fn test_list_files_before_subdirs() {
        let tmp = TempDir::new().unwrap();
        TreeFixture::new()
            .file("lib/sub/b.txt", "b")
            .file("lib/a.txt", "a")
            .file("lib/sub/deep/c.txt", "c")
            .file("lib/z.txt", "z")
            .write(tmp.path());

        let manifest = list(&tmp.path().join("lib"), None).unwrap();
        assert_eq!(
            manifest.lines(),
            vec!["/", "a.txt", "z.txt", "sub/", "b.txt", "sub/deep/", "c.txt"]
        );
    }

    #[test]
    fn test_list_rejected_dir_not_descended() {
        let tmp = TempDir::new().unwrap();
        TreeFixture::new()
            .file("lib/a.txt", "a")
            .file("lib/sub/keep.txt", "k")
            .file("lib/sub/deep/keep.txt", "k")
            .write(tmp.path());

        let filter = |dir: &str, name: &str| !(name.is_empty() && dir == "sub");
        let manifest = list(&tmp.path().join("lib"), Some(&filter)).unwrap();
        assert_eq!(manifest.paths(), vec!["a.txt"]);
    }

    #[test]
    fn test_list_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let err = list(&tmp.path().join("nope"), None).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_extract_to_copies_structure() {
        let tmp = TempDir::new().unwrap();
        TreeFixture::new()
            .file("lib/a.txt", "alpha")
            .file("lib/sub/b.txt", "beta")
            .write(tmp.path());
        let src = tmp.path().join("lib");
        let dest = tmp.path().join("out");

        let manifest = list(&src, None).unwrap();
        let report = extract_to(&src, &manifest, &dest);

        assert_eq!(report.extracted, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(fs::read_to_string(dest.join("sub/b.txt")).unwrap(), "beta");
    }
}
