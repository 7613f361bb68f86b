//! Filesystem utilities.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};

/// Remove a file or a directory tree, if it exists.
pub fn remove_path(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to inspect: {}", path.display()))
        }
    };
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("failed to remove: {}", path.display()))
        }
        _ => Ok(()),
    }
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// Stream `reader` into a new file at `dest`, creating parent directories.
///
/// Returns the number of bytes written.
pub fn copy_to_file(reader: &mut dyn Read, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    let mut out = fs::File::create(dest)
        .with_context(|| format!("failed to create file: {}", dest.display()))?;
    let written = io::copy(reader, &mut out)
        .with_context(|| format!("failed to write file: {}", dest.display()))?;
    out.flush()
        .with_context(|| format!("failed to flush file: {}", dest.display()))?;
    Ok(written)
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Render a relative path with forward slashes regardless of platform.
pub fn slashify(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// How long ago `path` was last modified. `None` if unknown.
pub fn modified_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    SystemTime::now().duration_since(modified).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_path_file_dir_and_missing() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("dir");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested/file.txt"), "x").unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "y").unwrap();

        remove_path(&dir).unwrap();
        remove_path(&file).unwrap();
        remove_path(&tmp.path().join("missing")).unwrap();

        assert!(!dir.exists());
        assert!(!file.exists());
    }

    #[test]
    fn test_copy_to_file_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("a/b/c.bin");
        let mut data: &[u8] = b"payload";
        let written = copy_to_file(&mut data, &dest).unwrap();
        assert_eq!(written, 7);
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn test_slashify() {
        let p = Path::new("sub").join("deep").join("x.txt");
        assert_eq!(slashify(&p), "sub/deep/x.txt");
    }

    #[test]
    fn test_modified_age_fresh_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("f");
        fs::write(&file, "").unwrap();
        let age = modified_age(&file).unwrap_or_default();
        assert!(age < Duration::from_secs(60));
    }
}
