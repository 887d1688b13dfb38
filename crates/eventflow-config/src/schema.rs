//! The event configuration schema.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The root configuration document, loaded from and saved back to YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventConfig {
    /// Directories searched for plugin libraries, in priority order.
    #[serde(default)]
    pub plugin_directories: Vec<PathBuf>,

    /// Allow-list of handler names. Empty means every handler not
    /// explicitly disabled is enabled.
    #[serde(default)]
    pub enabled_handlers: Vec<String>,

    /// Deny-list of handler names, checked before the allow-list.
    #[serde(default)]
    pub disabled_handlers: Vec<String>,

    /// Per-event-type routing tables.
    #[serde(default)]
    pub routes: HashMap<String, RouteConfig>,

    /// Per-plugin settings, keyed by plugin name.
    #[serde(default)]
    pub plugins: HashMap<String, PluginSettings>,

    /// Marketplace client configuration.
    #[serde(default)]
    pub marketplace: MarketplaceSettings,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            plugin_directories: Vec::new(),
            enabled_handlers: Vec::new(),
            disabled_handlers: Vec::new(),
            routes: HashMap::new(),
            plugins: HashMap::new(),
            marketplace: MarketplaceSettings::default(),
        }
    }
}

impl EventConfig {
    /// Whether the handler named `name` should run.
    ///
    /// Resolution order: an explicit entry in `plugins` keyed directly by
    /// the handler's own name wins outright; otherwise the handler is
    /// denied if it appears on `disabled_handlers`; otherwise, if
    /// `enabled_handlers` is non-empty, only names on that list are
    /// enabled; otherwise the handler defaults to enabled.
    pub fn is_handler_enabled(&self, name: &str) -> bool {
        if let Some(settings) = self.plugins.get(name) {
            if let Some(enabled) = settings.enabled {
                return enabled;
            }
        }

        if self.disabled_handlers.iter().any(|h| h == name) {
            return false;
        }

        if !self.enabled_handlers.is_empty() {
            return self.enabled_handlers.iter().any(|h| h == name);
        }

        true
    }

    /// Resolves the ordered list of handler names routed to `event_type`
    /// (optionally narrowed by `state_id`).
    ///
    /// When `state_id` is given, handlers matched by that concrete state
    /// come before wildcard handlers. When `state_id` is absent, every
    /// state's handler list is flattened into the union, in insertion
    /// order, followed by the wildcard handlers. Duplicates are dropped,
    /// keeping the first occurrence.
    pub fn get_handlers_for_route(&self, event_type: &str, state_id: Option<&str>) -> Vec<String> {
        let mut resolved = Vec::new();
        let mut seen = HashSet::new();

        let Some(route) = self.routes.get(event_type) else {
            return resolved;
        };

        let mut push_all = |handlers: &[String], resolved: &mut Vec<String>| {
            for handler in handlers {
                if seen.insert(handler.clone()) {
                    resolved.push(handler.clone());
                }
            }
        };

        match state_id {
            Some(state_id) => {
                if let Some(handlers) = route.states.get(state_id) {
                    push_all(handlers, &mut resolved);
                }
            }
            None => {
                for handlers in route.states.values() {
                    push_all(handlers, &mut resolved);
                }
            }
        }

        push_all(&route.wildcard, &mut resolved);

        resolved
    }

    /// Whether `plugin_name` is enabled. Defaults to `true` when the
    /// plugin has no recorded settings or leaves `enabled` unset.
    pub fn is_plugin_enabled(&self, plugin_name: &str) -> bool {
        self.plugins
            .get(plugin_name)
            .and_then(|settings| settings.enabled)
            .unwrap_or(true)
    }
}

/// Routing table for a single event type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Handlers routed to a specific state value (e.g. an order status).
    #[serde(default)]
    pub states: HashMap<String, Vec<String>>,

    /// Handlers routed regardless of state.
    #[serde(default)]
    pub wildcard: Vec<String>,
}

/// Per-handler-or-plugin configuration entry, keyed by name in
/// [`EventConfig::plugins`]: enable flag plus an arbitrary settings bag the
/// plugin itself interprets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginSettings {
    /// Explicit enable/disable; `None` defers to the manager's default.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Free-form settings handed to the plugin on load.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

/// Marketplace client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Whether downloaded archives must carry a verifiable signature
    /// before installation proceeds.
    #[serde(default)]
    pub verify_signature: bool,

    #[serde(default = "default_download_timeout_seconds")]
    pub download_timeout_seconds: u64,
}

impl Default for MarketplaceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            api_key: None,
            verify_signature: false,
            download_timeout_seconds: default_download_timeout_seconds(),
        }
    }
}

fn default_download_timeout_seconds() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(states: &[(&str, &[&str])], wildcard: &[&str]) -> RouteConfig {
        RouteConfig {
            states: states
                .iter()
                .map(|(state, handlers)| {
                    (
                        state.to_string(),
                        handlers.iter().map(|h| h.to_string()).collect(),
                    )
                })
                .collect(),
            wildcard: wildcard.iter().map(|h| h.to_string()).collect(),
        }
    }

    #[test]
    fn get_handlers_for_route_orders_state_before_wildcard_and_dedups() {
        let mut config = EventConfig::default();
        config.routes.insert(
            "order_state_changed".to_string(),
            route(&[("shipped", &["notify_customer", "audit_log"])], &["audit_log", "metrics"]),
        );

        let handlers = config.get_handlers_for_route("order_state_changed", Some("shipped"));
        assert_eq!(handlers, vec!["notify_customer", "audit_log", "metrics"]);
    }

    #[test]
    fn get_handlers_for_route_unknown_event_type_is_empty() {
        let config = EventConfig::default();
        assert!(config.get_handlers_for_route("unknown", None).is_empty());
    }

    #[test]
    fn get_handlers_for_route_with_no_state_id_unions_every_state() {
        let mut config = EventConfig::default();
        config.routes.insert(
            "order_state_changed".to_string(),
            route(
                &[("shipped", &["notify_customer"]), ("cancelled", &["refund"])],
                &["audit_log"],
            ),
        );

        let mut handlers = config.get_handlers_for_route("order_state_changed", None);
        handlers.sort();
        let mut expected = vec!["notify_customer".to_string(), "refund".to_string(), "audit_log".to_string()];
        expected.sort();
        assert_eq!(handlers, expected);
    }

    #[test]
    fn is_handler_enabled_precedence() {
        let mut config = EventConfig::default();
        config.disabled_handlers.push("blocked".to_string());
        config.enabled_handlers.push("allowed".to_string());

        let mut overridden = PluginSettings::default();
        overridden.enabled = Some(true);
        config.plugins.insert("blocked".to_string(), overridden);

        // An explicit entry keyed by handler name wins even over the deny-list.
        assert!(config.is_handler_enabled("blocked"));
        // Deny-list wins over the (empty) allow-list for handlers with no explicit entry.
        config.plugins.clear();
        config.plugins.insert("blocked".to_string(), PluginSettings::default());
        assert!(!config.is_handler_enabled("blocked"));
        // Allow-list present and non-empty: only listed names pass.
        assert!(config.is_handler_enabled("allowed"));
        assert!(!config.is_handler_enabled("not_listed"));
    }

    #[test]
    fn is_handler_enabled_defaults_true_with_empty_allow_list() {
        let config = EventConfig::default();
        assert!(config.is_handler_enabled("anything"));
    }
}
