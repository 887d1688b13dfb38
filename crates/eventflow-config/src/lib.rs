//! # EventFlow Config
//!
//! A YAML-backed configuration store for the eventflow dispatch core.
//!
//! [`ConfigStore`] owns the on-disk representation of [`EventConfig`]: it
//! loads and caches the document, applies deep-merge patches, and writes
//! updates atomically so a crash mid-save can never corrupt the file a
//! running process depends on.

pub mod error;
pub mod schema;
pub mod store;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use schema::{EventConfig, MarketplaceSettings, PluginSettings, RouteConfig};
pub use store::{ConfigStore, deep_merge};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::error::{ConfigError, ConfigResult};
    pub use crate::schema::{EventConfig, MarketplaceSettings, PluginSettings, RouteConfig};
    pub use crate::store::ConfigStore;
}
