//! Eventflow Runtime - process bootstrap and singleton registry for the
//! eventflow dispatch core.
//!
//! This crate provides:
//! - Logging configuration (`LoggingBuilder`, `SpanEvents`)
//! - Process-wide singleton accessors for the event bus, plugin manager,
//!   configuration store, and marketplace client (`runtime`)
//! - The shared emission engine behind `#[emit_on_success]` (`emission`)
//!
//! # Startup
//!
//! ```ignore
//! use eventflow_runtime::{init_eventflow, runtime};
//! use eventflow_core::EventBus;
//! use std::sync::Arc;
//!
//! fn bootstrap() {
//!     init_eventflow();
//!     runtime::set_event_bus(Arc::new(EventBus::new())).expect("set once at startup");
//! }
//! ```
//!
//! Once the singletons are set, `#[emit_on_success]`-decorated service
//! methods anywhere in the process can publish events without threading a
//! bus handle through every call site.

pub mod emission;
pub mod error;
pub mod logging;
pub mod runtime;

pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents, default_eventflow_filter, init_eventflow};

// Re-export tracing for use by downstream crates and generated macro code.
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::runtime::{
        get_config_store, get_event_bus, get_marketplace_client, get_plugin_manager, set_config_store,
        set_event_bus, set_marketplace_client, set_plugin_manager,
    };
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
