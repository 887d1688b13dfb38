//! Process-wide singletons for the event bus, plugin manager,
//! configuration store, and marketplace client.
//!
//! These replace module-level globals: each component is set exactly
//! once during startup and read everywhere else, including from inside
//! the `#[emit_on_success]`-generated code, which has no way to thread a
//! bus handle through an arbitrary call site.

use std::sync::{Arc, OnceLock};

use eventflow_config::ConfigStore;
use eventflow_core::EventBus;
use eventflow_marketplace::MarketplaceClient;
use eventflow_plugins::PluginManager;

use crate::error::{RuntimeError, RuntimeResult};

static EVENT_BUS: OnceLock<Arc<EventBus>> = OnceLock::new();
static PLUGIN_MANAGER: OnceLock<Arc<PluginManager>> = OnceLock::new();
static CONFIG_STORE: OnceLock<Arc<ConfigStore>> = OnceLock::new();
static MARKETPLACE_CLIENT: OnceLock<Arc<MarketplaceClient>> = OnceLock::new();

/// Registers the process-wide event bus. May only be called once.
pub fn set_event_bus(bus: Arc<EventBus>) -> RuntimeResult<()> {
    EVENT_BUS
        .set(bus)
        .map_err(|_| RuntimeError::AlreadyInitialized { component: "event_bus" })
}

/// Returns the process-wide event bus, if initialized.
pub fn get_event_bus() -> RuntimeResult<Arc<EventBus>> {
    EVENT_BUS
        .get()
        .cloned()
        .ok_or(RuntimeError::NotInitialized { component: "event_bus" })
}

/// Registers the process-wide plugin manager. May only be called once.
pub fn set_plugin_manager(manager: Arc<PluginManager>) -> RuntimeResult<()> {
    PLUGIN_MANAGER
        .set(manager)
        .map_err(|_| RuntimeError::AlreadyInitialized { component: "plugin_manager" })
}

/// Returns the process-wide plugin manager, if initialized.
pub fn get_plugin_manager() -> RuntimeResult<Arc<PluginManager>> {
    PLUGIN_MANAGER
        .get()
        .cloned()
        .ok_or(RuntimeError::NotInitialized { component: "plugin_manager" })
}

/// Registers the process-wide configuration store. May only be called once.
pub fn set_config_store(store: Arc<ConfigStore>) -> RuntimeResult<()> {
    CONFIG_STORE
        .set(store)
        .map_err(|_| RuntimeError::AlreadyInitialized { component: "config_store" })
}

/// Returns the process-wide configuration store, if initialized.
pub fn get_config_store() -> RuntimeResult<Arc<ConfigStore>> {
    CONFIG_STORE
        .get()
        .cloned()
        .ok_or(RuntimeError::NotInitialized { component: "config_store" })
}

/// Registers the process-wide marketplace client. May only be called once.
pub fn set_marketplace_client(client: Arc<MarketplaceClient>) -> RuntimeResult<()> {
    MARKETPLACE_CLIENT
        .set(client)
        .map_err(|_| RuntimeError::AlreadyInitialized { component: "marketplace_client" })
}

/// Returns the process-wide marketplace client, if initialized.
pub fn get_marketplace_client() -> RuntimeResult<Arc<MarketplaceClient>> {
    MARKETPLACE_CLIENT
        .get()
        .cloned()
        .ok_or(RuntimeError::NotInitialized { component: "marketplace_client" })
}

#[cfg(test)]
mod tests {
    use super::*;

    // `OnceLock` statics are process-global, so a single test owns the
    // full get-before-set / set-once / set-twice sequence for a given
    // singleton rather than splitting it across tests that `cargo test`
    // could otherwise interleave in either order.
    #[test]
    fn config_store_singleton_lifecycle() {
        match get_config_store() {
            Err(RuntimeError::NotInitialized { component }) => assert_eq!(component, "config_store"),
            other => panic!("unexpected result before initialisation: {other:?}"),
        }

        let store = Arc::new(ConfigStore::new(std::env::temp_dir().join("eventflow-runtime-test.yaml")));
        set_config_store(store.clone()).expect("first set must succeed");
        assert!(matches!(
            set_config_store(store),
            Err(RuntimeError::AlreadyInitialized { component: "config_store" })
        ));
        assert!(get_config_store().is_ok());
    }
}
