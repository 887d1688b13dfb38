//! Loading, deep-merge updating, and atomically persisting [`EventConfig`].

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::EventConfig;
use crate::validation::validate_config;

/// A filesystem-backed configuration store.
///
/// Reads are overlaid with `EVENTFLOW_`-prefixed environment variables via
/// [`figment`], so deployment-specific overrides never require editing the
/// YAML file on disk. Writes go through a temp-file-then-rename sequence so
/// a crash mid-write never leaves a truncated configuration file behind.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    cached: RwLock<Option<EventConfig>>,
}

impl ConfigStore {
    /// Creates a store backed by the YAML file at `path`. The file is not
    /// created or touched by this constructor; loading before the file
    /// exists raises [`ConfigError::FileNotFound`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(None),
        }
    }

    /// Returns the path this store reads from and writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration, reusing the cached value when
    /// `use_cache` is `true` and a value has already been loaded.
    pub fn load(&self, use_cache: bool) -> ConfigResult<EventConfig> {
        if use_cache {
            if let Some(cached) = self.cached.read().as_ref() {
                return Ok(cached.clone());
            }
        }
        self.refresh()
    }

    /// Re-reads the configuration from disk, validates it, and refreshes
    /// the cache.
    pub fn refresh(&self) -> ConfigResult<EventConfig> {
        let config = self.read_from_disk()?;
        validate_config(&config)?;
        debug!(path = %self.path.display(), "configuration refreshed");
        *self.cached.write() = Some(config.clone());
        Ok(config)
    }

    fn read_from_disk(&self) -> ConfigResult<EventConfig> {
        if !self.path.exists() {
            return Err(ConfigError::FileNotFound(self.path.clone()));
        }

        let figment = Figment::new()
            .merge(Yaml::file(&self.path))
            .merge(Env::prefixed("EVENTFLOW_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }

    /// Validates and atomically writes `config` to disk, refreshing the
    /// cache on success.
    pub fn save(&self, config: &EventConfig) -> ConfigResult<()> {
        validate_config(config)?;
        let yaml = serde_yaml::to_string(config).map_err(ConfigError::SerializeError)?;
        self.write_atomic(&yaml)?;
        info!(path = %self.path.display(), "configuration saved");
        *self.cached.write() = Some(config.clone());
        Ok(())
    }

    fn write_atomic(&self, contents: &str) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("yaml.tmp");
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Applies a JSON merge patch on top of the current configuration and
    /// persists the result.
    ///
    /// Nested mappings are merged recursively; scalars and lists in the
    /// patch fully replace the corresponding base value (no list append).
    pub fn update(&self, patch: Value) -> ConfigResult<EventConfig> {
        let current = self.load(true)?;
        let base = serde_json::to_value(&current)?;
        let merged = deep_merge(base, patch);
        let updated: EventConfig = serde_json::from_value(merged)?;
        self.save(&updated)?;
        Ok(updated)
    }
}

/// Recursively merges `patch` into `base`.
///
/// Nested objects are merged key by key; any other value in `patch` (an
/// array, string, number, bool, or null) fully replaces the corresponding
/// value in `base` rather than being combined with it.
pub fn deep_merge(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, patch_value),
                    None => patch_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, patch) => {
            if patch.is_null() {
                warn!("deep merge patch contained an explicit null; treating as replacement");
            }
            patch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("eventflow.yaml"))
    }

    #[test]
    fn missing_file_raises_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(store.load(false).unwrap_err(), ConfigError::FileNotFound(path) if path == store.path()));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut config = EventConfig::default();
        config.plugin_directories.push(dir.path().join("plugins"));
        config.enabled_handlers.push("notify".to_string());

        store.save(&config).unwrap();
        let reloaded = store.refresh().unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn save_writes_no_leftover_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&EventConfig::default()).unwrap();
        assert!(!dir.path().join("eventflow.yaml.tmp").exists());
        assert!(dir.path().join("eventflow.yaml").exists());
    }

    #[test]
    fn update_deep_merges_nested_plugin_settings() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save(&EventConfig::default()).unwrap();
        let updated = store
            .update(json!({
                "plugins": {
                    "inventory": {
                        "enabled": true,
                        "settings": {"threshold": 5}
                    }
                }
            }))
            .unwrap();

        let plugin = updated.plugins.get("inventory").unwrap();
        assert_eq!(plugin.enabled, Some(true));
        assert_eq!(plugin.settings.get("threshold").unwrap(), 5);
    }

    #[test]
    fn deep_merge_replaces_lists_instead_of_appending() {
        let base = json!({"handlers": ["a", "b"]});
        let patch = json!({"handlers": ["c"]});
        let merged = deep_merge(base, patch);
        assert_eq!(merged, json!({"handlers": ["c"]}));
    }

    #[test]
    fn deep_merge_recurses_into_nested_objects() {
        let base = json!({"outer": {"a": 1, "b": 2}});
        let patch = json!({"outer": {"b": 3, "c": 4}});
        let merged = deep_merge(base, patch);
        assert_eq!(merged, json!({"outer": {"a": 1, "b": 3, "c": 4}}));
    }
}
