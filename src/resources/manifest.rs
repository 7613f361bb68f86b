//! Compact content manifest.
//!
//! A manifest is a flattened pre-order walk of a resource subtree, one entry
//! per line:
//!
//! ```text
//! /
//! a.txt
//! sub/
//! b.txt
//! ```
//!
//! A line ending in `/` is a directory marker; every following bare name
//! belongs to that directory until the next marker. `/` alone is the root of
//! the listed subtree. Markers carry the full path relative to the subtree,
//! so nesting is given by emission order, not by indentation.

use std::collections::HashMap;
use std::fmt;

use crate::core::error::{BootError, BootResult};

/// File name of a manifest stored at a subtree root.
pub const CONTENT_FILE: &str = "runwaycontent";

/// Predicate over `(directory, name)`.
///
/// `directory` is relative to the listed subtree, `""` for its root. When the
/// predicate is asked about a directory itself, `name` is empty; rejecting a
/// directory skips all its descendants.
pub type ResourceFilter<'a> = dyn Fn(&str, &str) -> bool + 'a;

/// One line of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEntry {
    /// Directory marker; `""` is the subtree root.
    Dir(String),
    /// File name relative to the most recent marker.
    File(String),
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestEntry::Dir(d) if d.is_empty() => f.write_str("/"),
            ManifestEntry::Dir(d) => write!(f, "{}/", d),
            ManifestEntry::File(name) => f.write_str(name),
        }
    }
}

/// Ordered manifest entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceManifest {
    entries: Vec<ManifestEntry>,
}

impl ResourceManifest {
    /// Build a manifest from raw entries.
    pub fn from_entries(entries: Vec<ManifestEntry>) -> Self {
        ResourceManifest { entries }
    }

    /// Parse manifest text.
    ///
    /// A marker naming `subtree` itself is read as the root marker. Blank
    /// lines are ignored and `\r\n` terminators are accepted.
    pub fn parse(text: &str, subtree: &str) -> BootResult<Self> {
        let subtree = subtree.trim_matches('/');
        let mut entries = Vec::new();

        for (idx, raw) in text.split('\n').enumerate() {
            let line = raw.trim_end_matches('\r').trim();
            if line.is_empty() {
                continue;
            }
            let corrupt = || BootError::ManifestCorrupt {
                line: idx + 1,
                content: raw.to_string(),
            };

            if let Some(dir) = line.strip_suffix('/') {
                if dir.is_empty() || dir == subtree {
                    entries.push(ManifestEntry::Dir(String::new()));
                    continue;
                }
                if !is_valid_dir(dir) {
                    return Err(corrupt());
                }
                entries.push(ManifestEntry::Dir(dir.to_string()));
            } else {
                if !is_valid_name(line) {
                    return Err(corrupt());
                }
                if line == CONTENT_FILE {
                    continue;
                }
                entries.push(ManifestEntry::File(line.to_string()));
            }
        }

        Ok(ResourceManifest { entries })
    }

    /// Render as manifest text, `\n` terminated.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out
    }

    /// Entries in emission order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Lines as they would appear in the manifest file.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }

    /// Number of file entries.
    pub fn file_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, ManifestEntry::File(_)))
            .count()
    }

    /// Iterate `(directory, name)` pairs for every file entry.
    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        let mut dir = "";
        self.entries.iter().filter_map(move |entry| match entry {
            ManifestEntry::Dir(d) => {
                dir = d.as_str();
                None
            }
            ManifestEntry::File(name) => Some((dir, name.as_str())),
        })
    }

    /// Full relative path of every file, `/`-separated.
    pub fn paths(&self) -> Vec<String> {
        self.files().map(|(dir, name)| join(dir, name)).collect()
    }

    /// Apply a filter, dropping rejected files and whole rejected directories.
    pub fn filtered(&self, filter: &ResourceFilter<'_>) -> Self {
        let mut builder = ManifestBuilder::new(Some(filter));
        for (dir, name) in self.files() {
            builder.push(dir, name);
        }
        builder.finish()
    }
}

/// Incremental manifest writer shared by the tree and archive walkers.
///
/// Files must be pushed in the order the source yields them. The builder
/// starts with the root marker, even if nothing is accepted, and emits a new
/// marker whenever the directory changes, so its output replays in the same
/// order.
pub struct ManifestBuilder<'f> {
    entries: Vec<ManifestEntry>,
    current: String,
    filter: Option<&'f ResourceFilter<'f>>,
    verdicts: HashMap<String, bool>,
}

impl<'f> ManifestBuilder<'f> {
    pub fn new(filter: Option<&'f ResourceFilter<'f>>) -> Self {
        ManifestBuilder {
            entries: vec![ManifestEntry::Dir(String::new())],
            current: String::new(),
            filter,
            verdicts: HashMap::new(),
        }
    }

    /// Whether `dir` and all its ancestors pass the filter.
    ///
    /// Each directory is asked at most once.
    pub fn dir_accepted(&mut self, dir: &str) -> bool {
        let Some(filter) = self.filter else {
            return true;
        };
        if dir.is_empty() {
            return true;
        }
        let mut end = 0;
        for segment in dir.split('/') {
            end += segment.len();
            let prefix = &dir[..end];
            let accepted = *self
                .verdicts
                .entry(prefix.to_string())
                .or_insert_with(|| filter(prefix, ""));
            if !accepted {
                return false;
            }
            end += 1;
        }
        true
    }

    /// Offer a file. Returns whether it was recorded.
    pub fn push(&mut self, dir: &str, name: &str) -> bool {
        if name.is_empty() || name == CONTENT_FILE {
            return false;
        }
        if !self.dir_accepted(dir) {
            return false;
        }
        if let Some(filter) = self.filter {
            if !filter(dir, name) {
                return false;
            }
        }
        if self.current != dir {
            self.entries.push(ManifestEntry::Dir(dir.to_string()));
            self.current = dir.to_string();
        }
        self.entries.push(ManifestEntry::File(name.to_string()));
        true
    }

    pub fn finish(self) -> ResourceManifest {
        ResourceManifest {
            entries: self.entries,
        }
    }
}

/// Split a `/`-separated relative path into `(directory, name)`.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Join a directory and a name with `/`.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
        && name != "."
        && name != ".."
}

fn is_valid_dir(dir: &str) -> bool {
    !dir.starts_with('/') && dir.split('/').all(is_valid_name_segment)
}

fn is_valid_name_segment(segment: &str) -> bool {
    !segment.is_empty() && is_valid_name(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResourceManifest {
        ResourceManifest::from_entries(vec![
            ManifestEntry::Dir(String::new()),
            ManifestEntry::File("a.txt".into()),
            ManifestEntry::Dir("sub".into()),
            ManifestEntry::File("b.txt".into()),
            ManifestEntry::Dir("sub/deep".into()),
            ManifestEntry::File("c.bin".into()),
        ])
    }

    #[test]
    fn test_render_and_parse() {
        let manifest = sample();
        let text = manifest.render();
        assert_eq!(text, "/\na.txt\nsub/\nb.txt\nsub/deep/\nc.bin\n");
        assert_eq!(ResourceManifest::parse(&text, "lib").unwrap(), manifest);
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            sample().paths(),
            vec!["a.txt", "sub/b.txt", "sub/deep/c.bin"]
        );
    }

    #[test]
    fn test_parse_crlf_and_self_entry() {
        let text = "/\r\nrunwaycontent\r\nx.dll\r\n\r\n";
        let manifest = ResourceManifest::parse(text, "").unwrap();
        assert_eq!(manifest.paths(), vec!["x.dll"]);
    }

    #[test]
    fn test_parse_subtree_marker_is_root() {
        let manifest = ResourceManifest::parse("lib/\na.txt\n", "/lib").unwrap();
        assert_eq!(manifest.entries()[0], ManifestEntry::Dir(String::new()));
        assert_eq!(manifest.paths(), vec!["a.txt"]);
    }

    #[test]
    fn test_parse_rejects_traversal() {
        let err = ResourceManifest::parse("/\n../evil/\nx\n", "lib").unwrap_err();
        assert!(matches!(err, BootError::ManifestCorrupt { line: 2, .. }));

        let err = ResourceManifest::parse("/\nsub/file.txt\n", "lib").unwrap_err();
        assert!(matches!(err, BootError::ManifestCorrupt { line: 2, .. }));
    }

    #[test]
    fn test_builder_emits_root_first() {
        let mut builder = ManifestBuilder::new(None);
        builder.push("sub", "b.txt");
        builder.push("", "a.txt");
        assert_eq!(builder.finish().lines(), vec!["/", "sub/", "b.txt", "/", "a.txt"]);
    }

    #[test]
    fn test_builder_root_marker_without_files() {
        let reject_all = |_: &str, name: &str| name.is_empty();
        let mut builder = ManifestBuilder::new(Some(&reject_all));
        assert!(!builder.push("sub", "b.txt"));
        let manifest = builder.finish();
        assert!(manifest.is_empty());
        assert_eq!(manifest.render(), "/\n");
        assert_eq!(ManifestBuilder::new(None).finish().lines(), vec!["/"]);
    }

    #[test]
    fn test_rejected_dir_skips_descendants() {
        let filter = |dir: &str, name: &str| !(name.is_empty() && dir == "sub");
        let filtered = sample().filtered(&filter);
        assert_eq!(filtered.paths(), vec!["a.txt"]);
    }

    #[test]
    fn test_rejected_dir_asked_once() {
        use std::cell::Cell;
        let calls = Cell::new(0);
        let filter = |dir: &str, name: &str| {
            if name.is_empty() {
                calls.set(calls.get() + 1);
                return dir != "skip";
            }
            true
        };
        let mut builder = ManifestBuilder::new(Some(&filter));
        assert!(!builder.push("skip", "1"));
        assert!(!builder.push("skip", "2"));
        assert!(!builder.push("skip/inner", "3"));
        assert!(builder.push("keep", "4"));
        assert_eq!(calls.get(), 2);
    }
}
