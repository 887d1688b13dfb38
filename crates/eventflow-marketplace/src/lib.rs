//! # EventFlow Marketplace
//!
//! A marketplace-backed plugin installer for the eventflow dispatch core:
//! [`MarketplaceClient`] talks to a remote plugin catalog, and
//! [`PluginInstaller`] downloads, checksum-verifies, extracts and
//! registers the plugins it lists (or any plugin reachable by a direct
//! URL).

pub mod client;
pub mod error;
pub mod installer;

pub use client::{MarketplaceClient, MarketplacePluginMetadata};
pub use error::{InstallError, InstallResult, MarketplaceError, MarketplaceResult};
pub use installer::{PluginInstallRequest, PluginInstaller};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::client::{MarketplaceClient, MarketplacePluginMetadata};
    pub use crate::error::{InstallError, InstallResult, MarketplaceError, MarketplaceResult};
    pub use crate::installer::{PluginInstallRequest, PluginInstaller};
}
