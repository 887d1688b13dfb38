//! Error types for event publication and handler execution.

use thiserror::Error;

// =============================================================================
// Handler Errors
// =============================================================================

/// A single handler's failure while processing one event.
#[derive(Debug, Clone, Error)]
#[error("handler '{handler}' failed: {reason}")]
pub struct HandlerFailure {
    /// Name of the handler that failed.
    pub handler: String,
    /// The failure reason, rendered from the handler's error.
    pub reason: String,
}

impl HandlerFailure {
    pub fn new(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Event Bus Errors
// =============================================================================

/// Errors that can occur while publishing an event or resolving handlers.
#[derive(Debug, Clone, Error)]
pub enum EventBusError {
    /// One or more subscribed handlers failed while processing an event.
    ///
    /// Publication still completes: failures are aggregated rather than
    /// aborting the remaining handlers.
    #[error("{} of {} handler(s) failed", .failures.len(), .total)]
    HandlersFailed {
        /// Total number of handlers invoked for this publication.
        total: usize,
        /// The individual handler failures, in invocation order.
        failures: Vec<HandlerFailure>,
    },

    /// A handler could not be registered because another handler already
    /// holds the same name.
    #[error("a handler named '{0}' is already subscribed")]
    DuplicateHandler(String),
}

impl EventBusError {
    /// Builds a [`EventBusError::HandlersFailed`] from the results of a
    /// single publication, returning `None` when nothing failed.
    pub fn from_results(total: usize, failures: Vec<HandlerFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self::HandlersFailed { total, failures })
        }
    }
}

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;
