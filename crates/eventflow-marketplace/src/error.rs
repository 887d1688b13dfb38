//! Error types for the marketplace client and plugin installer.

use thiserror::Error;

/// Errors returned by [`crate::client::MarketplaceClient`].
#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// The marketplace integration is disabled in configuration.
    #[error("marketplace integration is disabled")]
    Disabled,

    /// The HTTP request itself failed, or the server returned a non-2xx
    /// status.
    #[error("marketplace request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response body was not the JSON shape expected.
    #[error("unexpected marketplace response: {0}")]
    InvalidResponse(String),
}

/// Result type for marketplace client operations.
pub type MarketplaceResult<T> = Result<T, MarketplaceError>;

/// Errors returned by [`crate::installer::PluginInstaller`].
#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Marketplace(#[from] MarketplaceError),

    #[error(transparent)]
    Config(#[from] eventflow_config::ConfigError),

    #[error(transparent)]
    Plugin(#[from] eventflow_plugins::PluginError),

    #[error("I/O error during plugin install: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to download plugin archive: {0}")]
    Download(#[from] reqwest::Error),

    #[error("failed to extract plugin archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("install request did not specify a source URL and the marketplace client is disabled")]
    MarketplaceDisabled,

    #[error("marketplace metadata for plugin '{0}' did not include a download URL")]
    MissingDownloadUrl(String),

    #[error("no configured plugin directory is writable")]
    NoWritableDirectory,

    #[error("plugin '{0}' is not installed in any configured plugin directory")]
    NotInstalled(String),

    #[error("archive entry '{0}' would extract outside the target directory")]
    PathTraversal(String),

    #[error("checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("checksum verification task panicked")]
    ChecksumTaskFailed,

    #[error("failed to install plugin dependencies: {0}")]
    DependencyInstallFailed(String),
}

/// Result type for plugin installation operations.
pub type InstallResult<T> = Result<T, InstallError>;
