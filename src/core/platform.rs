//! Host platform queries.
//!
//! Pure detection of OS family, architecture and host runtime. Nothing here
//! mutates process state.

use std::fmt;
use std::path::{Path, PathBuf};

/// Operating system family, as far as library naming is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Windows,
    Mac,
    /// Linux and the other Unix-family systems.
    Unix,
}

impl OsFamily {
    /// Detect the family of the running host.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            OsFamily::Windows
        } else if cfg!(target_os = "macos") {
            OsFamily::Mac
        } else {
            OsFamily::Unix
        }
    }

    /// Short lowercase tag used in bundle subtrees.
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Windows => "windows",
            OsFamily::Mac => "mac",
            OsFamily::Unix => "linux",
        }
    }

    /// Platform-specific file name for a shared library.
    ///
    /// `opencv` becomes `opencv.dll`, `libopencv.dylib` or `libopencv.so`.
    pub fn library_file_name(&self, name: &str) -> String {
        match self {
            OsFamily::Windows => format!("{}.dll", name),
            OsFamily::Mac => format!("lib{}.dylib", name),
            OsFamily::Unix => format!("lib{}.so", name),
        }
    }

    /// Environment variable the OS loader consults for extra search paths.
    pub fn loader_path_var(&self) -> &'static str {
        match self {
            OsFamily::Windows => "PATH",
            OsFamily::Mac => "DYLD_LIBRARY_PATH",
            OsFamily::Unix => "LD_LIBRARY_PATH",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The runtime hosting this process.
///
/// A compiled binary cannot extend its own loader search path once started,
/// so appends to the resolved-location list are always deferred to the next
/// launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRuntime {
    /// Minimum toolchain version the binary was built for.
    pub version: String,
}

impl HostRuntime {
    fn current() -> Self {
        let version = option_env!("CARGO_PKG_RUST_VERSION")
            .filter(|v| !v.is_empty())
            .unwrap_or("unknown");
        HostRuntime {
            version: version.to_string(),
        }
    }

    /// Whether new library locations can be added while the process runs.
    pub fn supports_runtime_append(&self) -> bool {
        false
    }
}

/// How the running binary was deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunType {
    /// Resources come from a packaged archive next to the executable.
    Archive,
    /// Resources come from a loose directory tree.
    Tree,
    /// Location could not be determined.
    Other,
}

impl RunType {
    /// Classify a resource bundle location.
    pub fn of(bundle: Option<&Path>) -> Self {
        match bundle {
            Some(p) if p.is_dir() => RunType::Tree,
            Some(p) if p.is_file() => RunType::Archive,
            _ => RunType::Other,
        }
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunType::Archive => write!(f, "from an archive"),
            RunType::Tree => write!(f, "from a directory tree"),
            RunType::Other => write!(f, "from an unknown location"),
        }
    }
}

/// Snapshot of the host platform.
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub family: OsFamily,
    /// CPU architecture (`x86_64`, `aarch64`, ...).
    pub arch: &'static str,
    /// Human-readable OS name and version, when the host reports one.
    pub os_version: Option<String>,
    pub runtime: HostRuntime,
    /// Version of this application.
    pub app_version: &'static str,
    /// Absolute path of the running executable.
    pub executable: Option<PathBuf>,
}

impl PlatformInfo {
    /// Probe the current host.
    pub fn detect() -> Self {
        PlatformInfo {
            family: OsFamily::current(),
            arch: std::env::consts::ARCH,
            os_version: sysinfo::System::long_os_version(),
            runtime: HostRuntime::current(),
            app_version: env!("CARGO_PKG_VERSION"),
            executable: std::env::current_exe().ok(),
        }
    }

    /// Bundle subtree holding the libraries for this platform.
    pub fn natives_subtree(&self) -> String {
        format!("natives/{}/{}", self.family, self.arch)
    }

    /// Whether the executable sits in a build output directory (`target/...`).
    pub fn running_in_project(&self) -> bool {
        self.executable
            .as_deref()
            .map(|exe| exe.ancestors().any(|a| a.file_name().is_some_and(|n| n == "target")))
            .unwrap_or(false)
    }

    /// One-line description for logs and the environment report.
    pub fn describe(&self) -> String {
        format!(
            "{} {} ({})",
            self.family,
            self.arch,
            self.os_version.as_deref().unwrap_or("version unknown")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_file_names() {
        assert_eq!(OsFamily::Windows.library_file_name("opencv"), "opencv.dll");
        assert_eq!(OsFamily::Mac.library_file_name("opencv"), "libopencv.dylib");
        assert_eq!(OsFamily::Unix.library_file_name("opencv"), "libopencv.so");
    }

    #[test]
    fn test_loader_path_var() {
        assert_eq!(OsFamily::Windows.loader_path_var(), "PATH");
        assert_eq!(OsFamily::Unix.loader_path_var(), "LD_LIBRARY_PATH");
    }

    #[test]
    fn test_detect_matches_consts() {
        let info = PlatformInfo::detect();
        assert_eq!(info.arch, std::env::consts::ARCH);
        assert!(info.natives_subtree().starts_with("natives/"));
        assert!(!info.runtime.supports_runtime_append());
    }

    #[test]
    fn test_run_type() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert_eq!(RunType::of(Some(tmp.path())), RunType::Tree);
        let file = tmp.path().join("bundle.zip");
        std::fs::write(&file, b"PK").unwrap();
        assert_eq!(RunType::of(Some(&file)), RunType::Archive);
        assert_eq!(RunType::of(None), RunType::Other);
    }
}
