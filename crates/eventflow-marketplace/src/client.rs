//! HTTP client for the plugin marketplace.

use std::time::Duration;

use eventflow_config::MarketplaceSettings;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::{MarketplaceError, MarketplaceResult};

/// Metadata the marketplace reports about a single plugin listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplacePluginMetadata {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub checksum_sha256: Option<String>,
}

/// A thin wrapper over a marketplace HTTP API. A fresh [`reqwest::Client`]
/// is built per request rather than held across the struct's lifetime, so
/// the configured timeout always reflects the caller's current settings.
pub struct MarketplaceClient {
    base_url: Option<String>,
    api_key: Option<String>,
    enabled: bool,
    timeout: Duration,
}

impl MarketplaceClient {
    pub fn new(settings: &MarketplaceSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            enabled: settings.enabled,
            timeout: Duration::from_secs(settings.download_timeout_seconds),
        }
    }

    /// Whether this client is configured to talk to a marketplace at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Lists every plugin the marketplace offers. Returns an empty list
    /// when the integration is disabled rather than erroring.
    pub async fn list_plugins(&self) -> MarketplaceResult<Vec<MarketplacePluginMetadata>> {
        if !self.enabled {
            return Ok(Vec::new());
        }

        let url = self.build_url("/plugins")?;
        let response = self.request(Method::GET, &url).await?;
        response.json().await.map_err(MarketplaceError::from)
    }

    /// Fetches metadata for a single plugin by name.
    pub async fn get_plugin_metadata(&self, name: &str) -> MarketplaceResult<MarketplacePluginMetadata> {
        if !self.enabled {
            return Err(MarketplaceError::Disabled);
        }

        let url = self.build_url(&format!("/plugins/{name}"))?;
        let response = self.request(Method::GET, &url).await?;
        response.json().await.map_err(MarketplaceError::from)
    }

    async fn request(&self, method: Method, url: &str) -> MarketplaceResult<reqwest::Response> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let mut builder = client.request(method, url).header("Accept", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder.send().await?;
        response.error_for_status().map_err(MarketplaceError::from)
    }

    fn build_url(&self, path: &str) -> MarketplaceResult<String> {
        let base = self
            .base_url
            .as_deref()
            .ok_or(MarketplaceError::Disabled)?
            .trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(format!("{base}/{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_client() -> MarketplaceClient {
        MarketplaceClient::new(&MarketplaceSettings {
            enabled: false,
            base_url: None,
            api_key: None,
            verify_signature: false,
            download_timeout_seconds: 30,
        })
    }

    #[tokio::test]
    async fn list_plugins_returns_empty_when_disabled() {
        let client = disabled_client();
        assert!(client.list_plugins().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_plugin_metadata_errors_when_disabled() {
        let client = disabled_client();
        assert!(matches!(
            client.get_plugin_metadata("sample").await,
            Err(MarketplaceError::Disabled)
        ));
    }

    #[test]
    fn build_url_joins_base_and_path_without_double_slash() {
        let client = MarketplaceClient::new(&MarketplaceSettings {
            enabled: true,
            base_url: Some("https://market.example.com/".to_string()),
            api_key: None,
            verify_signature: false,
            download_timeout_seconds: 30,
        });
        assert_eq!(
            client.build_url("/plugins").unwrap(),
            "https://market.example.com/plugins"
        );
    }
}
