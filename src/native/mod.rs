//! Native library provisioning.
//!
//! OS loaders need a real file, so bundled libraries are first exported to a
//! versioned folder and then loaded from there.

pub mod loader;
pub mod provisioner;

pub use loader::{NativeLoader, SystemLoader};
pub use provisioner::{
    default_version, ExportLayout, LibraryRecord, NativeLibraryProvisioner, VERSION_MARKER,
};
