//! Errors for the runtime singleton registry.

use thiserror::Error;

/// Errors returned by the process-wide singleton accessors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A `set_*` accessor was called after the singleton was already set.
    #[error("{component} has already been initialised")]
    AlreadyInitialized { component: &'static str },

    /// A `get_*` accessor was called before the corresponding `set_*`.
    #[error("{component} has not been initialised; call set_{component} during startup")]
    NotInitialized { component: &'static str },
}

/// Result type for runtime singleton operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
