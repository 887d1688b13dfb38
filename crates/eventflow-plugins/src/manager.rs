//! Reconciliation of discovered plugins against configuration, and routing
//! of published events to the handlers plugins register.
//!
//! [`PluginManager`] is the only piece of this crate that knows how a
//! plugin's on-disk identity, its enabled state, and the routing table in
//! [`EventConfig`] combine into "which handlers run for this event". A
//! reload diffs the previous reconciliation against a fresh discovery
//! pass: plugins whose descriptor is unchanged keep their live instance,
//! only their enabled flag is toggled if configuration changed underneath
//! them.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use eventflow_config::{ConfigStore, EventConfig};
use eventflow_core::{Event, EventBus, EventHandlerPlugin, EventType, Handler};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, warn};

use crate::descriptor::PluginDescriptor;
use crate::error::PluginResult;
use crate::loader::PluginLoader;

struct LoadedPlugin {
    descriptor: PluginDescriptor,
    instance: Arc<dyn EventHandlerPlugin>,
    handler_names: Vec<String>,
    enabled: bool,
}

#[derive(Clone)]
struct RegisteredHandler {
    plugin_name: String,
    handler: Arc<dyn Handler>,
}

/// A snapshot of one plugin's reconciled state, returned by
/// [`PluginManager::get_status`].
#[derive(Debug, Clone)]
pub struct PluginStatus {
    pub enabled: bool,
    pub handlers: Vec<String>,
    pub source: String,
}

struct State {
    config: Option<EventConfig>,
    loaded: HashMap<String, LoadedPlugin>,
    handlers: HashMap<String, RegisteredHandler>,
    routed_event_types: HashSet<String>,
}

struct Inner {
    bus: Arc<EventBus>,
    config_store: Arc<ConfigStore>,
    loader: PluginLoader,
    state: AsyncMutex<State>,
}

/// Owns the full lifecycle of filesystem-discovered plugins: discovery,
/// loading, enable/disable, route subscription, and event routing.
#[derive(Clone)]
pub struct PluginManager {
    inner: Arc<Inner>,
}

impl PluginManager {
    pub fn new(bus: Arc<EventBus>, config_store: Arc<ConfigStore>, loader: PluginLoader) -> Self {
        Self {
            inner: Arc::new(Inner {
                bus,
                config_store,
                loader,
                state: AsyncMutex::new(State {
                    config: None,
                    loaded: HashMap::new(),
                    handlers: HashMap::new(),
                    routed_event_types: HashSet::new(),
                }),
            }),
        }
    }

    /// Performs the first reconciliation pass. Equivalent to [`reload`].
    ///
    /// [`reload`]: PluginManager::reload
    pub async fn initialise(&self) -> PluginResult<EventConfig> {
        self.reload().await
    }

    /// Re-reads configuration, re-discovers plugin libraries, and
    /// reconciles the loaded set and event routing against both.
    pub async fn reload(&self) -> PluginResult<EventConfig> {
        let mut state = self.inner.state.lock().await;
        self.reload_internal(&mut state).await
    }

    /// Enables a plugin by name, persists the change, and reloads.
    pub async fn enable_plugin(&self, name: &str) -> PluginResult<EventConfig> {
        self.set_plugin_enabled(name, true).await
    }

    /// Disables a plugin by name, persists the change, and reloads.
    pub async fn disable_plugin(&self, name: &str) -> PluginResult<EventConfig> {
        self.set_plugin_enabled(name, false).await
    }

    /// Returns a status snapshot for every currently loaded plugin.
    pub async fn get_status(&self) -> HashMap<String, PluginStatus> {
        let state = self.inner.state.lock().await;
        state
            .loaded
            .iter()
            .map(|(name, plugin)| {
                (
                    name.clone(),
                    PluginStatus {
                        enabled: plugin.enabled,
                        handlers: plugin.handler_names.clone(),
                        source: plugin.descriptor.source(),
                    },
                )
            })
            .collect()
    }

    /// Returns the names of every currently loaded plugin.
    pub async fn get_loaded_plugins(&self) -> Vec<String> {
        self.inner.state.lock().await.loaded.keys().cloned().collect()
    }

    async fn set_plugin_enabled(&self, name: &str, enabled: bool) -> PluginResult<EventConfig> {
        let mut state = self.inner.state.lock().await;
        let mut config = self.ensure_config(&mut state)?;
        config.plugins.entry(name.to_string()).or_default().enabled = Some(enabled);
        self.inner.config_store.save(&config)?;
        self.reload_internal(&mut state).await
    }

    fn ensure_config(&self, state: &mut State) -> PluginResult<EventConfig> {
        if let Some(config) = &state.config {
            return Ok(config.clone());
        }
        let config = self.inner.config_store.load(true)?;
        state.config = Some(config.clone());
        Ok(config)
    }

    async fn reload_internal(&self, state: &mut State) -> PluginResult<EventConfig> {
        let config = self.inner.config_store.refresh()?;
        self.inner.loader.set_directories(config.plugin_directories.clone());
        let discovered = self.inner.loader.discover()?;

        self.reconcile_plugins(state, &discovered, &config).await?;
        self.rebuild_event_subscriptions(state, &config);
        state.config = Some(config.clone());
        Ok(config)
    }

    async fn reconcile_plugins(
        &self,
        state: &mut State,
        discovered: &HashMap<String, PluginDescriptor>,
        config: &EventConfig,
    ) -> PluginResult<()> {
        let removed: Vec<String> = state
            .loaded
            .keys()
            .filter(|name| !discovered.contains_key(*name))
            .cloned()
            .collect();

        for name in removed {
            self.unload_plugin(state, &name).await;
        }

        for (name, descriptor) in discovered {
            self.load_or_refresh_plugin(state, name, descriptor, config).await?;
        }

        Ok(())
    }

    async fn load_or_refresh_plugin(
        &self,
        state: &mut State,
        name: &str,
        descriptor: &PluginDescriptor,
        config: &EventConfig,
    ) -> PluginResult<()> {
        let plugin_enabled = config.is_plugin_enabled(name);

        if let Some(existing) = state.loaded.get(name) {
            if &existing.descriptor == descriptor {
                if existing.enabled != plugin_enabled {
                    let instance = existing.instance.clone();
                    if plugin_enabled {
                        if let Err(err) = instance.on_load().await {
                            error!(plugin = name, error = %err, "plugin on_load failed while re-enabling");
                        }
                    } else if let Err(err) = instance.on_unload().await {
                        error!(plugin = name, error = %err, "plugin on_unload failed while disabling");
                    }
                    state.loaded.get_mut(name).expect("just looked up").enabled = plugin_enabled;
                }
                return Ok(());
            }
        }

        if state.loaded.contains_key(name) {
            self.unload_plugin(state, name).await;
        }

        let module = self.inner.loader.load_module(descriptor)?;
        let handlers = collect_handlers(&module.instance, name, &state.handlers);

        for handler in &handlers {
            state.handlers.insert(
                handler.name().to_string(),
                RegisteredHandler {
                    plugin_name: name.to_string(),
                    handler: handler.clone(),
                },
            );
        }

        let handler_names = handlers.iter().map(|handler| handler.name().to_string()).collect();

        if plugin_enabled {
            if let Err(err) = module.instance.on_load().await {
                error!(plugin = name, error = %err, "plugin on_load failed");
            }
        }

        state.loaded.insert(
            name.to_string(),
            LoadedPlugin {
                descriptor: descriptor.clone(),
                instance: module.instance,
                handler_names,
                enabled: plugin_enabled,
            },
        );

        debug!(plugin = name, "plugin loaded");
        Ok(())
    }

    async fn unload_plugin(&self, state: &mut State, name: &str) {
        if let Some(plugin) = state.loaded.remove(name) {
            if let Err(err) = plugin.instance.on_unload().await {
                error!(plugin = name, error = %err, "plugin on_unload failed");
            }
            for handler_name in &plugin.handler_names {
                state.handlers.remove(handler_name);
            }
            debug!(plugin = name, "plugin unloaded");
        }
    }

    fn rebuild_event_subscriptions(&self, state: &mut State, config: &EventConfig) {
        for event_type in state.routed_event_types.drain() {
            self.inner.bus.unsubscribe(&event_type, &route_handler_name(&event_type));
        }

        let mut event_types: HashSet<String> = config.routes.keys().cloned().collect();
        for known in EventType::ALL {
            event_types.insert(known.as_str().to_string());
        }

        for event_type in event_types {
            let route_name = route_handler_name(&event_type);
            let handler = Arc::new(RoutingHandler {
                route_name: route_name.clone(),
                inner: Arc::downgrade(&self.inner),
            });

            if self.inner.bus.subscribe(&event_type, handler).is_ok() {
                state.routed_event_types.insert(event_type);
            } else {
                warn!(event_type, "route handler name collided, skipping subscription");
            }
        }
    }
}

fn route_handler_name(event_type: &str) -> String {
    format!("__route::{event_type}")
}

fn collect_handlers(
    instance: &Arc<dyn EventHandlerPlugin>,
    plugin_name: &str,
    existing: &HashMap<String, RegisteredHandler>,
) -> Vec<Arc<dyn Handler>> {
    let mut collected = Vec::new();
    let mut seen = HashSet::new();

    for handler in instance.get_handlers() {
        let name = handler.name().to_string();
        if seen.contains(&name) || existing.contains_key(&name) {
            warn!(plugin = plugin_name, handler = %name, "duplicate handler name, skipping");
            continue;
        }
        seen.insert(name);
        collected.push(handler);
    }

    collected
}

fn resolve_handlers(state: &State, event: &Event) -> Vec<(String, Arc<dyn Handler>)> {
    let Some(config) = state.config.as_ref() else {
        return Vec::new();
    };

    let routed = config.get_handlers_for_route(&event.event_type, event.state_id());
    let candidate_names: Vec<String> = if !routed.is_empty() {
        routed
    } else {
        state.handlers.keys().cloned().collect()
    };

    let mut resolved = Vec::new();
    for name in candidate_names {
        let Some(registered) = state.handlers.get(&name) else {
            continue;
        };
        let Some(plugin) = state.loaded.get(&registered.plugin_name) else {
            continue;
        };
        if !plugin.enabled {
            continue;
        }
        if !config.is_handler_enabled(&name) {
            continue;
        }
        if !registered.handler.can_handle(event) {
            continue;
        }
        resolved.push((name, registered.handler.clone()));
    }
    resolved
}

impl Inner {
    /// Resolves and invokes every handler routed to `event`.
    ///
    /// Handler failures are logged and swallowed here rather than
    /// propagated to the publisher: by the time an event reaches routing,
    /// the bus has already committed to a single routing handler per
    /// event type, so an individual sub-handler failure must not poison
    /// its siblings.
    async fn handle_event(self: &Arc<Self>, event: &Event) {
        let handlers = {
            let state = self.state.lock().await;
            resolve_handlers(&state, event)
        };

        if handlers.is_empty() {
            return;
        }

        let futures = handlers.into_iter().map(|(name, handler)| {
            let event = event.clone();
            async move { (name, handler.handle(&event).await) }
        });

        for (name, result) in futures::future::join_all(futures).await {
            if let Err(err) = result {
                error!(handler = %name, error = %err, "handler failed while processing routed event");
            }
        }
    }
}

/// The single bus-facing handler installed per event type. The bus itself
/// scopes dispatch to that event type, so this handler never needs to
/// filter by shape. It never fails: failures from the handlers it routes to
/// are logged internally.
struct RoutingHandler {
    route_name: String,
    inner: Weak<Inner>,
}

#[async_trait]
impl Handler for RoutingHandler {
    fn name(&self) -> &str {
        &self.route_name
    }

    async fn handle(&self, event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_event(event).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventflow_core::PluginMetadata;
    use std::collections::HashMap as StdHashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingHandler {
        name: String,
        counter: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler for CountingHandler {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&self, _event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StaticPlugin {
        name: String,
        handlers: Vec<Arc<dyn Handler>>,
    }

    #[async_trait]
    impl EventHandlerPlugin for StaticPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn get_handlers(&self) -> Vec<Arc<dyn Handler>> {
            self.handlers.clone()
        }

        fn metadata(&self) -> PluginMetadata {
            PluginMetadata::default()
        }
    }

    fn manager_with_store(dir: &TempDir) -> PluginManager {
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(ConfigStore::new(dir.path().join("eventflow.yaml")));
        store.save(&EventConfig::default()).unwrap();
        PluginManager::new(bus, store, PluginLoader::new())
    }

    #[tokio::test]
    async fn reload_with_no_plugin_directories_yields_empty_manager() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with_store(&dir);
        manager.initialise().await.unwrap();
        assert!(manager.get_loaded_plugins().await.is_empty());
    }

    #[tokio::test]
    async fn resolve_handlers_falls_back_to_all_registered_when_unrouted() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with_store(&dir);
        manager.initialise().await.unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let handler: Arc<dyn Handler> = Arc::new(CountingHandler {
            name: "audit".to_string(),
            counter: counter.clone(),
        });

        {
            let mut state = manager.inner.state.lock().await;
            state.loaded.insert(
                "demo".to_string(),
                LoadedPlugin {
                    descriptor: PluginDescriptor {
                        name: "demo".to_string(),
                        path: dir.path().join("demo.so"),
                        size: 0,
                        modified: std::time::SystemTime::now(),
                    },
                    instance: Arc::new(StaticPlugin {
                        name: "demo".to_string(),
                        handlers: vec![handler.clone()],
                    }),
                    handler_names: vec!["audit".to_string()],
                    enabled: true,
                },
            );
            state.handlers.insert(
                "audit".to_string(),
                RegisteredHandler {
                    plugin_name: "demo".to_string(),
                    handler,
                },
            );
        }

        let event = Event::new("order_created", StdHashMap::new());
        manager.inner.handle_event(&event).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn route_handler_name_is_namespaced() {
        assert_eq!(route_handler_name("order_created"), "__route::order_created");
    }
}
