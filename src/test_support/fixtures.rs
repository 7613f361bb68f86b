//! Fixture builders for resource sources.
//!
//! Each builder keeps its files in insertion order, which is also the order
//! an archive stream yields them.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

type Files = Vec<(String, Vec<u8>)>;

/// Loose directory tree.
#[derive(Debug, Clone, Default)]
pub struct TreeFixture {
    files: Files,
}

impl TreeFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: &str, contents: impl AsRef<[u8]>) -> Self {
        self.files.push((path.to_string(), contents.as_ref().to_vec()));
        self
    }

    /// Write every file below `base`.
    pub fn write(&self, base: &Path) {
        for (path, contents) in &self.files {
            let target = base.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(target, contents).unwrap();
        }
    }
}

/// Zip (or jar) archive.
#[derive(Debug, Clone, Default)]
pub struct ZipFixture {
    files: Files,
}

impl ZipFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: &str, contents: impl AsRef<[u8]>) -> Self {
        self.files.push((path.to_string(), contents.as_ref().to_vec()));
        self
    }

    /// Write the archive as `dir/name` and return its path.
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        for (entry, contents) in &self.files {
            zip.start_file(entry.as_str(), SimpleFileOptions::default())
                .unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    /// Write through a non-seekable sink, as `jar` does. Every entry then
    /// carries a data descriptor instead of sizes in its local header.
    pub fn write_streamed(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut zip = ZipWriter::new_stream(File::create(&path).unwrap());
        for (entry, contents) in &self.files {
            zip.start_file(entry.as_str(), SimpleFileOptions::default())
                .unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
        path
    }
}

/// Tar archive, plain or gzipped.
#[derive(Debug, Clone, Default)]
pub struct TarFixture {
    files: Files,
}

impl TarFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: &str, contents: impl AsRef<[u8]>) -> Self {
        self.files.push((path.to_string(), contents.as_ref().to_vec()));
        self
    }

    fn append_all<W: Write>(&self, builder: &mut tar::Builder<W>) {
        for (entry, contents) in &self.files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, entry, contents.as_slice())
                .unwrap();
        }
    }

    /// Write an uncompressed `.tar` as `dir/name`.
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut builder = tar::Builder::new(File::create(&path).unwrap());
        self.append_all(&mut builder);
        builder.into_inner().unwrap().flush().unwrap();
        path
    }

    /// Write a gzipped tar as `dir/name`.
    pub fn write_gz(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        self.append_all(&mut builder);
        builder.into_inner().unwrap().finish().unwrap();
        path
    }
}

/// Bundle of fake native libraries laid out as `natives/<os>/<arch>/`.
pub fn natives_bundle(dir: &Path, subtree: &str, libs: &[&str]) -> PathBuf {
    let mut zip = ZipFixture::new();
    for lib in libs {
        zip = zip.file(&format!("{}/{}", subtree, lib), format!("binary {}", lib));
    }
    zip.write(dir, "bundle.zip")
}
