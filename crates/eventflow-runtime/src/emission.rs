//! Turns a domain service method's successful completion into a published
//! event.
//!
//! This is the shared engine behind the `#[emit_on_success]` macro and the
//! manual [`emit_on_success_wrap`] helper for call sites that cannot use an
//! attribute macro (closures, trait objects, match arms). Both funnel into
//! the same function so the emission semantics — payload shape, metadata,
//! and failure handling — only live in one place.

use std::collections::HashMap;

use eventflow_core::Event;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// The conventional keys default extraction looks for, in order.
const DEFAULT_DATA_KEYS: [&str; 5] = ["order_id", "id_order", "id", "customer_id", "product_id"];

/// A named snapshot of a wrapped call's arguments, built by the
/// `#[emit_on_success]` macro (or by a caller of [`emit_on_success_wrap`])
/// before the call runs. Default data/metadata extraction consults this
/// rather than the call's return value.
#[derive(Debug, Default, Clone)]
pub struct CallArgs {
    named: HashMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `name`'s serialized value. Serialization failures are
    /// recorded as `null` rather than dropping the argument entirely.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.named.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }
}

/// A caller-supplied extractor for `data` or `metadata`, given the call's
/// arguments and its successful result. Returning an empty map from a
/// `data_extractor` skips emission entirely.
pub type Extractor<T> = fn(&CallArgs, &T) -> HashMap<String, Value>;

/// Consults `args` for the conventional key list, first directly and then
/// inside any argument that serialized to a JSON object, producing an
/// aggregate map.
fn default_data(args: &CallArgs) -> HashMap<String, Value> {
    let mut data = HashMap::new();
    for key in DEFAULT_DATA_KEYS {
        if let Some(value) = args.get(key) {
            data.insert(key.to_string(), value.clone());
        }
    }
    for value in args.named.values() {
        if let Value::Object(map) = value {
            for key in DEFAULT_DATA_KEYS {
                if !data.contains_key(key) {
                    if let Some(value) = map.get(key) {
                        data.insert(key.to_string(), value.clone());
                    }
                }
            }
        }
    }
    data
}

/// Records `source` and, if present among the call's arguments, an
/// `id_order`.
fn default_metadata(args: &CallArgs, source: String) -> HashMap<String, Value> {
    let mut metadata = HashMap::from([("source".to_string(), Value::String(source))]);
    let order_id = args.get("order_id").or_else(|| args.get("id_order"));
    if let Some(value) = order_id {
        metadata.insert("id_order".to_string(), value.clone());
    }
    metadata
}

/// Builds an [`Event`] from `args`/`result` and publishes it to the
/// process-wide event bus.
///
/// Failures never propagate to the caller: a service method that completed
/// successfully should not fail because its event couldn't be delivered. A
/// missing bus and publish-time handler failures are logged and dropped.
/// If data extraction (custom or default) yields an empty map, no event is
/// emitted at all.
#[allow(clippy::too_many_arguments)]
pub async fn emit_on_success<T>(
    event_type: &str,
    args: &CallArgs,
    result: &T,
    module: &str,
    function: &str,
    source: Option<&str>,
    data_extractor: Option<Extractor<T>>,
    metadata_extractor: Option<Extractor<T>>,
) where
    T: Serialize,
{
    let data = match data_extractor {
        Some(extractor) => extractor(args, result),
        None => default_data(args),
    };

    if data.is_empty() {
        debug!(event_type, module, function, "no event data extracted, skipping emission");
        return;
    }

    let source = source.map(str::to_string).unwrap_or_else(|| format!("{module}::{function}"));
    let metadata = match metadata_extractor {
        Some(extractor) => extractor(args, result),
        None => default_metadata(args, source),
    };

    let event = Event::with_metadata(event_type.to_string(), data, metadata);

    let bus = match crate::runtime::get_event_bus() {
        Ok(bus) => bus,
        Err(err) => {
            warn!(event_type, "no event bus registered; dropping emission: {err}");
            return;
        }
    };

    match bus.publish(&event).await {
        Ok(()) => debug!(event_type, "emitted event on successful completion"),
        Err(err) => warn!(event_type, "event handlers failed during emission: {err}"),
    }
}

/// Synchronous fallback for call sites with no `async` context of their own.
///
/// Requires a running Tokio runtime to be reachable via
/// [`tokio::runtime::Handle::try_current`]; if none is found the emission is
/// logged and dropped rather than panicking.
#[allow(clippy::too_many_arguments)]
pub fn emit_on_success_blocking<T>(
    event_type: &str,
    args: &CallArgs,
    result: &T,
    module: &str,
    function: &str,
    source: Option<&str>,
    data_extractor: Option<Extractor<T>>,
    metadata_extractor: Option<Extractor<T>>,
) where
    T: Serialize,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.block_on(emit_on_success(event_type, args, result, module, function, source, data_extractor, metadata_extractor))
        }
        Err(_) => warn!(event_type, "no Tokio runtime available; dropping emission"),
    }
}

/// Wraps a fallible async operation, emitting `event_type` when it succeeds
/// and returning its result unchanged either way.
///
/// This is the manual equivalent of `#[emit_on_success]` for call sites that
/// cannot apply an attribute macro, such as closures passed to combinators
/// or trait method implementations behind a generic bound.
pub async fn emit_on_success_wrap<F, Fut, T, E>(
    event_type: &str,
    args: &CallArgs,
    context: &str,
    source: Option<&str>,
    func: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    T: Serialize,
{
    let result = func().await;
    if let Ok(value) = &result {
        emit_on_success(event_type, args, value, context, "emit_on_success_wrap", source, None, None).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use eventflow_core::{EventBus, Handler};
    use serde::Serialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Serialize)]
    struct OrderCreated {
        order_id: String,
        total_cents: u64,
    }

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler for CountingHandler {
        fn name(&self) -> &str {
            "counting_handler"
        }

        async fn handle(&self, _event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn args_with_order_id(order_id: &str) -> CallArgs {
        let mut args = CallArgs::new();
        args.insert("order_id", Value::String(order_id.to_string()));
        args
    }

    #[tokio::test]
    async fn emit_on_success_publishes_and_copies_order_id_into_metadata() {
        let bus = Arc::new(EventBus::new());
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe("order_created", Arc::new(CountingHandler { calls: calls.clone() })).unwrap();
        crate::runtime::set_event_bus(bus).ok();

        let value = OrderCreated {
            order_id: "ord_123".to_string(),
            total_cents: 4599,
        };
        let args = args_with_order_id("ord_123");
        emit_on_success("order_created", &args, &value, "svc::orders", "create_order", None, None, None).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_data_finds_conventional_keys_nested_inside_an_object_argument() {
        let mut args = CallArgs::new();
        let mut order = serde_json::Map::new();
        order.insert("order_id".to_string(), Value::String("ord_9".to_string()));
        args.insert("order", Value::Object(order));

        let data = default_data(&args);
        assert_eq!(data.get("order_id").unwrap(), "ord_9");
    }

    #[test]
    fn default_data_is_empty_when_no_conventional_key_present() {
        let mut args = CallArgs::new();
        args.insert("note", Value::String("hello".to_string()));
        assert!(default_data(&args).is_empty());
    }

    #[tokio::test]
    async fn emit_on_success_skips_emission_when_extracted_data_is_empty() {
        let bus = Arc::new(EventBus::new());
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe("order_created", Arc::new(CountingHandler { calls: calls.clone() })).unwrap();
        crate::runtime::set_event_bus(bus).ok();

        let value = OrderCreated {
            order_id: "ord_123".to_string(),
            total_cents: 4599,
        };
        let args = CallArgs::new();
        emit_on_success("order_created", &args, &value, "svc::orders", "create_order", None, None, None).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn emit_on_success_wrap_returns_err_unchanged_and_skips_emission() {
        let args = CallArgs::new();
        let result: Result<u64, &str> =
            emit_on_success_wrap("order_created", &args, "svc::orders", None, || async { Err::<u64, &str>("boom") }).await;

        assert_eq!(result, Err("boom"));
    }
}
