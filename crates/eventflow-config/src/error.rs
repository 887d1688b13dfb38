//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading, merging and
/// validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found at the specified path.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to read the configuration file.
    #[error("failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("failed to parse YAML configuration: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Failed to render a merged configuration back to YAML.
    #[error("failed to serialize configuration: {0}")]
    SerializeError(serde_yaml::Error),

    /// Failed to load or overlay configuration via figment.
    #[error("failed to load configuration: {0}")]
    FigmentError(#[from] figment::Error),

    /// Failed to apply a JSON merge patch to the current configuration.
    #[error("failed to merge configuration patch: {0}")]
    MergeError(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {message}")]
    ValidationError { message: String },

    /// Missing required field.
    #[error("missing required configuration field: {field}")]
    MissingField { field: String },

    /// A plugin name referenced in `routes` or `plugins` is empty.
    #[error("plugin or handler name must not be empty")]
    EmptyName,

    /// A configured timeout or retry value was negative.
    #[error("invalid configuration: {field} must not be negative, got {value}")]
    NegativeValue { field: String, value: i64 },

    /// Invalid URL format.
    #[error("invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
