//! # EventFlow Core
//!
//! The core engine of the eventflow dispatch system.
//!
//! This crate provides the fundamental building blocks shared by every
//! other eventflow crate: the concrete [`Event`] record, the
//! publish/subscribe [`EventBus`], and the [`Handler`]/[`EventHandlerPlugin`]
//! traits that plugins implement against.
//!
//! ## Design
//!
//! Events are a single concrete, immutable struct rather than a type-erased
//! trait object: producers attach a free-form payload under `data` and
//! `metadata`, and consumers route on `event_type`. This keeps the bus
//! simple and makes events trivially serializable for logging or transport
//! across a plugin boundary.
//!
//! ```rust,ignore
//! use eventflow_core::{Event, EventBus, Handler};
//! use std::sync::Arc;
//!
//! struct LoggingHandler;
//!
//! #[async_trait::async_trait]
//! impl Handler for LoggingHandler {
//!     fn name(&self) -> &str {
//!         "logging"
//!     }
//!
//!     async fn handle(&self, event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!         println!("saw {}", event.event_type);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = EventBus::new();
//!     bus.subscribe("order_created", Arc::new(LoggingHandler)).unwrap();
//!     bus.publish(&Event::new("order_created", Default::default())).await.unwrap();
//! }
//! ```

pub mod bus;
pub mod error;
pub mod event;
pub mod handler;
pub mod plugin;

pub use bus::EventBus;
pub use error::{EventBusError, EventBusResult, HandlerFailure};
pub use event::{Event, EventType};
pub use handler::Handler;
pub use plugin::{EventHandlerPlugin, PluginMetadata};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::bus::EventBus;
    pub use crate::error::{EventBusError, EventBusResult, HandlerFailure};
    pub use crate::event::{Event, EventType};
    pub use crate::handler::Handler;
    pub use crate::plugin::{EventHandlerPlugin, PluginMetadata};
}
