//! Process bootstrap core.
//!
//! - Platform probing and run classification
//! - Temp and data workspace management
//! - Single-instance guard
//! - Lifecycle coordination and ordered cleanup

pub mod error;
pub mod instance;
pub mod lifecycle;
pub mod platform;
pub mod workspace;

pub use error::{BootError, BootResult, EXIT_ALREADY_RUNNING, EXIT_NORMAL, FATAL_THRESHOLD};
pub use instance::{LockState, SingleInstanceGuard, LOCK_FILE};
pub use lifecycle::{
    CleanupPhase, LifecycleCoordinator, LifecycleState, NullReporter, ProgressReporter,
    StartOptions, Subsystem,
};
pub use platform::{HostRuntime, OsFamily, PlatformInfo, RunType};
pub use workspace::{SweepReport, WorkspaceLayout, WorkspaceManager};
