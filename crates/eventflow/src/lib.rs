//! # EventFlow
//!
//! A plugin-driven, configuration-reconciled event dispatch core for
//! commerce-management backends.
//!
//! ## Overview
//!
//! EventFlow is built around four cooperating pieces:
//!
//! - **Event bus** (`eventflow_core`): a concrete [`Event`] record and a
//!   publish/subscribe [`EventBus`] that aggregates handler failures
//!   instead of short-circuiting on the first one.
//! - **Configuration store** (`eventflow_config`): a YAML-backed
//!   [`EventConfig`] with deep-merge updates and atomic writes, so route
//!   and plugin settings can change without restarting the process.
//! - **Plugin manager** (`eventflow_plugins`): filesystem discovery and
//!   dynamic loading of `eventflow_plugin_entry` shared libraries, with a
//!   reconciliation pass that preserves loaded plugin identity across
//!   reloads when nothing on disk changed.
//! - **Marketplace installer** (`eventflow_marketplace`): downloads,
//!   checksum-verifies, and extracts plugins from a remote catalog.
//!
//! `#[emit_on_success]` (`eventflow_macros`) bridges domain service code to
//! the bus: a decorated `async fn` publishes an event derived from its
//! return value after it completes successfully, without the method body
//! threading a bus handle through every call site.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use eventflow::prelude::*;
//! use std::sync::Arc;
//!
//! #[emit_on_success(event_type = "order_created")]
//! async fn create_order(request: CreateOrderRequest) -> Result<Order, OrderError> {
//!     // ...
//! #   unimplemented!()
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     eventflow_runtime::init_eventflow();
//!
//!     let bus = Arc::new(EventBus::new());
//!     set_event_bus(bus.clone()).expect("set once at startup");
//!
//!     let config_store = Arc::new(ConfigStore::new("eventflow.yaml"));
//!     let loader = PluginLoader::new();
//!     loader.set_directories(vec!["plugins".into()]);
//!     let manager = Arc::new(PluginManager::new(bus, config_store.clone(), loader));
//!     manager.reload().await.expect("initial plugin load");
//!     set_plugin_manager(manager).expect("set once at startup");
//! }
//! ```

pub use eventflow_config;
pub use eventflow_core;
pub use eventflow_macros;
pub use eventflow_marketplace;
pub use eventflow_plugins;
pub use eventflow_runtime;

pub use eventflow_macros::emit_on_success;

/// Prelude module for convenient imports.
pub mod prelude {
    // Event bus - the core publish/subscribe primitive.
    pub use eventflow_core::{Event, EventBus, EventHandlerPlugin, EventType, Handler, PluginMetadata};

    // Configuration store and schema.
    pub use eventflow_config::{ConfigStore, EventConfig, MarketplaceSettings, PluginSettings, RouteConfig};

    // Plugin loading and reconciliation.
    pub use eventflow_plugins::{PluginDescriptor, PluginLoader, PluginManager, PluginStatus};

    // Marketplace installer.
    pub use eventflow_marketplace::{MarketplaceClient, PluginInstallRequest, PluginInstaller};

    // Process-wide singleton accessors, used by application startup code
    // and by `#[emit_on_success]`-decorated service methods.
    pub use eventflow_runtime::runtime::{
        get_config_store, get_event_bus, get_marketplace_client, get_plugin_manager, set_config_store,
        set_event_bus, set_marketplace_client, set_plugin_manager,
    };

    // The attribute macro that turns a successful service call into a
    // published event.
    pub use eventflow_macros::emit_on_success;
}
