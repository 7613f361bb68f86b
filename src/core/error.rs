//! Error taxonomy for the bootstrap core.
//!
//! Components catch filesystem and archive failures at their boundary and
//! convert them into one of these kinds; no raw `io::Error` crosses a
//! component contract.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Exit code for a normal termination.
pub const EXIT_NORMAL: i32 = 0;

/// Exit code used when another interactive instance holds the workspace lock.
pub const EXIT_ALREADY_RUNNING: i32 = 1;

/// Codes at or above this threshold are raised to the caller as
/// [`BootError::Fatal`] instead of terminating the process directly.
pub const FATAL_THRESHOLD: i32 = 999;

/// Result alias used throughout the core.
pub type BootResult<T> = std::result::Result<T, BootError>;

/// Error raised by the bootstrap core.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum BootError {
    /// The temp or data root cannot be used.
    #[error("workspace not usable: {path}: {reason}")]
    #[diagnostic(
        code(runway::workspace::unusable),
        help("check permissions and free space, or point RUNWAY_TEMP / RUNWAY_DATA elsewhere")
    )]
    WorkspaceUnusable { path: PathBuf, reason: String },

    /// Another interactive instance holds the exclusive lock.
    #[error("already running (lock held: {})", lock.display())]
    #[diagnostic(
        code(runway::instance::already_running),
        help("close the other instance, or use --batch / --allow-multiple")
    )]
    AlreadyRunning { lock: PathBuf, pid: Option<u32> },

    /// A manifest or file entry could not be located in any addressing mode.
    #[error("resource not available: {resource}")]
    #[diagnostic(code(runway::resources::unavailable))]
    ResourceUnavailable { resource: String, reason: String },

    /// A native library could not be exported or loaded.
    #[error("problem with native library: {library}: {reason}")]
    #[diagnostic(code(runway::natives::load_failed))]
    LibraryLoadFailed {
        library: String,
        reason: String,
        help_url: String,
    },

    /// A manifest line is malformed.
    #[error("manifest corrupt at line {line}: {content:?}")]
    #[diagnostic(code(runway::resources::manifest_corrupt))]
    ManifestCorrupt { line: usize, content: String },

    /// The configuration file exists but could not be read or parsed.
    #[error("invalid configuration {}: {reason}", path.display())]
    #[diagnostic(code(runway::config::invalid))]
    Config { path: PathBuf, reason: String },

    /// Unrecoverable failure raised to the caller instead of exiting.
    #[error("FATAL: {message}")]
    #[diagnostic(code(runway::fatal))]
    Fatal { code: i32, message: String },
}

impl BootError {
    pub(crate) fn workspace(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        BootError::WorkspaceUnusable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unavailable(resource: impl Into<String>, reason: impl ToString) -> Self {
        BootError::ResourceUnavailable {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether callers may recover from this error with a fallback.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BootError::ResourceUnavailable { .. } | BootError::ManifestCorrupt { .. }
        )
    }

    /// The process exit code a caller should use when terminating on this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            BootError::AlreadyRunning { .. } => EXIT_ALREADY_RUNNING,
            BootError::Fatal { code, .. } => *code,
            BootError::ResourceUnavailable { .. }
            | BootError::ManifestCorrupt { .. }
            | BootError::Config { .. } => 1,
            BootError::WorkspaceUnusable { .. } | BootError::LibraryLoadFailed { .. } => {
                FATAL_THRESHOLD
            }
        }
    }

    /// Convert to a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BootError::WorkspaceUnusable { path, reason } => {
                Diagnostic::error(format!("temp folder not usable: {}", path.display()))
                    .with_context(reason.clone())
                    .with_suggestion(suggestions::WORKSPACE)
            }
            BootError::AlreadyRunning { lock, pid } => {
                let mut diag = Diagnostic::error("Terminating: already running")
                    .with_location(lock.clone());
                if let Some(pid) = pid {
                    diag = diag.with_context(format!("lock owned by pid {}", pid));
                }
                diag.with_suggestion(suggestions::ALREADY_RUNNING)
            }
            BootError::ResourceUnavailable { resource, reason } => {
                Diagnostic::warning(format!("resource not accessible: {}", resource))
                    .with_context(reason.clone())
            }
            BootError::LibraryLoadFailed {
                library,
                reason,
                help_url,
            } => Diagnostic::error(format!("problem with native library: {}", library))
                .with_context(reason.clone())
                .with_context("probably dependent libraries are missing")
                .with_suggestion(suggestions::SAVE_AND_RESTART)
                .with_suggestion(format!("see: {}", help_url)),
            BootError::ManifestCorrupt { line, content } => {
                Diagnostic::warning(format!("manifest line {} is malformed", line))
                    .with_context(format!("content: {:?}", content))
            }
            BootError::Config { path, reason } => {
                Diagnostic::error(format!("invalid configuration: {}", reason))
                    .with_location(path.clone())
            }
            BootError::Fatal { message, .. } => Diagnostic::error(format!("FATAL: {}", message)),
        }
    }
}
