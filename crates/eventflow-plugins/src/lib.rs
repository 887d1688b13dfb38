//! # EventFlow Plugins
//!
//! Filesystem plugin discovery, dynamic loading, and lifecycle
//! reconciliation for the eventflow dispatch core.
//!
//! [`PluginLoader`] turns a set of directories into a map of
//! [`PluginDescriptor`]s and, on demand, loaded plugin instances.
//! [`PluginManager`] owns the reconciliation loop: on every [`reload`],
//! it diffs newly discovered descriptors against what is currently
//! loaded, keeping object identity for unchanged plugins and only
//! reloading what actually changed on disk or in configuration.
//!
//! [`reload`]: PluginManager::reload

pub mod descriptor;
pub mod error;
pub mod loader;
pub mod manager;

pub use descriptor::PluginDescriptor;
pub use error::{PluginError, PluginResult};
pub use loader::{HOST_ABI_REQUIREMENT, HOST_ABI_VERSION, LoadedModule, PluginLoader};
pub use manager::{PluginManager, PluginStatus};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::descriptor::PluginDescriptor;
    pub use crate::error::{PluginError, PluginResult};
    pub use crate::loader::PluginLoader;
    pub use crate::manager::{PluginManager, PluginStatus};
}
