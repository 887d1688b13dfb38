//! Error types for plugin discovery, loading and reconciliation.

use thiserror::Error;

/// Errors that can occur while discovering, loading or managing plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The dynamic library failed to load.
    #[error("failed to load plugin library at {path}: {source}")]
    LibraryLoad {
        path: String,
        #[source]
        source: libloading::Error,
    },

    /// A plugin library was missing a required exported symbol.
    #[error("plugin library at {path} is missing required symbol '{symbol}'")]
    MissingSymbol { path: String, symbol: &'static str },

    /// The plugin's reported ABI version is incompatible with the host.
    #[error("plugin '{name}' reports ABI version {found}, host requires {expected}")]
    AbiMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// The plugin entry point returned a null or otherwise unusable
    /// instance.
    #[error("plugin '{name}' entry point returned an invalid instance")]
    InvalidInstance { name: String },

    /// Two handlers registered the same name.
    #[error("handler name '{0}' is already registered by another plugin")]
    DuplicateHandler(String),

    /// No plugin is registered under the given name.
    #[error("plugin '{0}' is not loaded")]
    NotFound(String),

    /// Underlying filesystem error.
    #[error("plugin I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying configuration error.
    #[error(transparent)]
    Config(#[from] eventflow_config::ConfigError),
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;
