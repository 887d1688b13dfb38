//! Structural validation for [`EventConfig`] beyond what serde enforces.

use crate::error::{ConfigError, ConfigResult};
use crate::schema::EventConfig;

/// Validates a whole configuration document.
pub fn validate_config(config: &EventConfig) -> ConfigResult<()> {
    validate_names("enabled_handlers", &config.enabled_handlers)?;
    validate_names("disabled_handlers", &config.disabled_handlers)?;
    validate_routes(config)?;
    validate_marketplace(config)?;
    Ok(())
}

fn validate_names(field: &str, names: &[String]) -> ConfigResult<()> {
    for name in names {
        if name.trim().is_empty() {
            return Err(ConfigError::validation(format!(
                "{field} must not contain empty handler names"
            )));
        }
    }
    Ok(())
}

fn validate_routes(config: &EventConfig) -> ConfigResult<()> {
    for (event_type, route) in &config.routes {
        if event_type.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        for handlers in route.states.values().chain(std::iter::once(&route.wildcard)) {
            validate_names(&format!("routes.{event_type}"), handlers)?;
        }
    }
    Ok(())
}

fn validate_marketplace(config: &EventConfig) -> ConfigResult<()> {
    let marketplace = &config.marketplace;
    if marketplace.enabled {
        let base_url = marketplace
            .base_url
            .as_deref()
            .unwrap_or_default()
            .trim();
        if base_url.is_empty() {
            return Err(ConfigError::missing_field("marketplace.base_url"));
        }
    }

    if marketplace.download_timeout_seconds == 0 {
        return Err(ConfigError::NegativeValue {
            field: "marketplace.download_timeout_seconds".to_string(),
            value: 0,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MarketplaceSettings;

    #[test]
    fn validate_empty_config_passes() {
        assert!(validate_config(&EventConfig::default()).is_ok());
    }

    #[test]
    fn validate_rejects_blank_handler_names() {
        let mut config = EventConfig::default();
        config.enabled_handlers.push("  ".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn validate_rejects_marketplace_enabled_without_base_url() {
        let mut config = EventConfig::default();
        config.marketplace = MarketplaceSettings {
            enabled: true,
            base_url: None,
            api_key: None,
            download_timeout_seconds: 30,
            verify_signature: false,
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = EventConfig::default();
        config.marketplace.download_timeout_seconds = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::NegativeValue { .. })
        ));
    }
}
