//! A minimal plugin library exercising the `eventflow_plugin_entry` ABI
//! contract.
//!
//! Logs every `order_created` and `order_state_changed` event it is handed.
//! Build with `cargo build -p eventflow-sample-plugin` and drop the
//! resulting `libeventflow_sample_plugin.{so,dylib,dll}` into a directory
//! watched by a [`eventflow_plugins::PluginManager`].

use std::os::raw::c_char;
use std::sync::Arc;

use async_trait::async_trait;
use eventflow_core::{Event, EventHandlerPlugin, Handler, PluginMetadata};
use tracing::info;

struct SampleOrderHandler;

#[async_trait]
impl Handler for SampleOrderHandler {
    fn name(&self) -> &str {
        "sample_order_handler"
    }

    fn can_handle(&self, event: &Event) -> bool {
        matches!(event.event_type.as_str(), "order_created" | "order_state_changed")
    }

    async fn handle(&self, event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(event_type = %event.event_type, idempotency_key = %event.idempotency_key(), "sample plugin observed event");
        Ok(())
    }
}

struct SamplePlugin;

#[async_trait]
impl EventHandlerPlugin for SamplePlugin {
    fn name(&self) -> &str {
        "sample-plugin"
    }

    fn get_handlers(&self) -> Vec<Arc<dyn Handler>> {
        vec![Arc::new(SampleOrderHandler)]
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            description: Some("Logs order lifecycle events for demonstration.".to_string()),
        }
    }

    async fn on_load(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("sample plugin loaded");
        Ok(())
    }

    async fn on_unload(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("sample plugin unloaded");
        Ok(())
    }
}

/// Reports the ABI version this library was built against.
///
/// The returned pointer is a static, process-lifetime C string; the host
/// must not attempt to free it.
#[unsafe(no_mangle)]
pub extern "C" fn eventflow_plugin_abi_version() -> *const c_char {
    static VERSION: &str = "1.0.0\0";
    VERSION.as_ptr() as *const c_char
}

/// Constructs the plugin instance.
///
/// Ownership transfers to the caller, which reclaims it with
/// `Box::from_raw` before converting it into an `Arc`.
#[unsafe(no_mangle)]
pub extern "C" fn eventflow_plugin_entry() -> *mut dyn EventHandlerPlugin {
    let boxed: Box<dyn EventHandlerPlugin> = Box::new(SamplePlugin);
    Box::into_raw(boxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_version_matches_host_requirement_string() {
        let ptr = eventflow_plugin_abi_version();
        let version = unsafe { std::ffi::CStr::from_ptr(ptr) }.to_str().unwrap();
        assert_eq!(version, "1.0.0");
    }

    #[tokio::test]
    async fn sample_handler_accepts_order_events_only() {
        let handler = SampleOrderHandler;
        let order_event = Event::new("order_created", Default::default());
        let other_event = Event::new("payment_captured", Default::default());

        assert!(handler.can_handle(&order_event));
        assert!(!handler.can_handle(&other_event));
        assert!(handler.handle(&order_event).await.is_ok());
    }
}
