//! The capability contract implemented by dynamically loaded plugins.

use async_trait::async_trait;
use std::sync::Arc;

use crate::handler::Handler;

/// Static metadata a plugin reports about itself.
///
/// This is distinct from the filesystem-derived [`PluginDescriptor`] in
/// `eventflow-plugins`: metadata is whatever the plugin author chooses to
/// surface, descriptors are what the loader observed on disk.
#[derive(Debug, Clone, Default)]
pub struct PluginMetadata {
    pub version: Option<String>,
    pub description: Option<String>,
}

/// A plugin that contributes one or more [`Handler`]s to the event bus.
///
/// Implementors are instantiated once per load and kept alive for as long
/// as the plugin manager considers their descriptor unchanged; `on_load`
/// and `on_unload` bracket that lifetime.
#[async_trait]
pub trait EventHandlerPlugin: Send + Sync {
    /// The plugin's unique name.
    fn name(&self) -> &str;

    /// The handlers this plugin contributes. Called once per load; the
    /// manager does not call this again unless the plugin is reloaded.
    fn get_handlers(&self) -> Vec<Arc<dyn Handler>>;

    /// Optional descriptive metadata, surfaced through status reporting.
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::default()
    }

    /// Called once the plugin has been registered and enabled.
    async fn on_load(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }

    /// Called before the plugin is dropped, on disable or on reload.
    ///
    /// Failures here are logged and swallowed: the plugin's handlers are
    /// removed from the registry regardless of whether this succeeds.
    async fn on_unload(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}
