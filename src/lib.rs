//! Runway - process bootstrap and native library provisioning
//!
//! Prepares a private temp workspace, keeps interactive runs single-instance,
//! reads bundled resources from archives or directory trees, exports native
//! libraries to a versioned folder and loads them once per process.

pub mod core;
pub mod native;
pub mod resources;
pub mod util;

/// Fakes and fixtures for unit tests.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    BootError, BootResult, LifecycleCoordinator, PlatformInfo, StartOptions, WorkspaceManager,
};
pub use native::NativeLibraryProvisioner;
pub use resources::{ResourceCatalog, ResourceManifest};
pub use util::context::RuntimeContext;
