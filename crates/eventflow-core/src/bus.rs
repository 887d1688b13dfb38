//! The publish/subscribe event bus at the center of the dispatch core.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tracing::{Level, debug, span};

use crate::error::{EventBusError, EventBusResult, HandlerFailure};
use crate::event::Event;
use crate::handler::Handler;

/// The central publish/subscribe bus.
///
/// Maintains a mapping from event type to the set of handlers subscribed to
/// it, keyed within each event type by handler name, which makes `subscribe`
/// idempotent with respect to replacement: callers that want to swap a
/// handler must `unsubscribe` first.
///
/// # Concurrency
///
/// `publish` fans out to every handler registered for the event's type with
/// [`futures::future::join_all`], so failures are aggregated rather than
/// short-circuiting. An optional semaphore bounds how many handlers may run
/// concurrently across all in-flight publications, which keeps a single
/// burst of events from spawning unbounded handler work.
pub struct EventBus {
    handlers: RwLock<HashMap<String, HashMap<String, Arc<dyn Handler>>>>,
    concurrency_limit: Option<Arc<Semaphore>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a bus with no concurrency limit.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            concurrency_limit: None,
        }
    }

    /// Creates a bus that runs at most `max_concurrent` handlers at once.
    pub fn with_max_concurrency(max_concurrent: usize) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            concurrency_limit: Some(Arc::new(Semaphore::new(max_concurrent.max(1)))),
        }
    }

    /// Registers a handler under its own name for the given event type.
    ///
    /// Returns [`EventBusError::DuplicateHandler`] if a handler with the
    /// same name is already subscribed to that event type.
    pub fn subscribe(&self, event_type: &str, handler: Arc<dyn Handler>) -> EventBusResult<()> {
        let name = handler.name().to_string();
        let mut handlers = self.handlers.write();
        let by_name = handlers.entry(event_type.to_string()).or_default();
        if by_name.contains_key(&name) {
            return Err(EventBusError::DuplicateHandler(name));
        }
        by_name.insert(name, handler);
        Ok(())
    }

    /// Removes a handler by name from the given event type's subscriber set.
    /// Returns `true` if a handler was removed.
    pub fn unsubscribe(&self, event_type: &str, name: &str) -> bool {
        let mut handlers = self.handlers.write();
        let Some(by_name) = handlers.get_mut(event_type) else {
            return false;
        };
        let removed = by_name.remove(name).is_some();
        if by_name.is_empty() {
            handlers.remove(event_type);
        }
        removed
    }

    /// Returns the number of currently subscribed handlers across all event
    /// types.
    pub fn handler_count(&self) -> usize {
        self.handlers.read().values().map(HashMap::len).sum()
    }

    /// Returns `true` if a handler with the given name is subscribed to the
    /// given event type.
    pub fn contains(&self, event_type: &str, name: &str) -> bool {
        self.handlers
            .read()
            .get(event_type)
            .is_some_and(|by_name| by_name.contains_key(name))
    }

    /// Publishes an event to every handler subscribed to its event type.
    ///
    /// All matching handlers run, even if some fail; failures are
    /// aggregated into a single [`EventBusError::HandlersFailed`].
    pub async fn publish(&self, event: &Event) -> EventBusResult<()> {
        let span = span!(
            Level::DEBUG,
            "publish",
            event_type = %event.event_type,
            idempotency_key = %event.idempotency_key(),
        );
        let _enter = span.enter();

        let matching: Vec<Arc<dyn Handler>> = self
            .handlers
            .read()
            .get(event.event_type.as_str())
            .map(|by_name| by_name.values().filter(|handler| handler.can_handle(event)).cloned().collect())
            .unwrap_or_default();

        if matching.is_empty() {
            debug!("no matching handlers for event");
            return Ok(());
        }

        let futures = matching.into_iter().map(|handler| {
            let limit = self.concurrency_limit.clone();
            let event = event.clone();
            async move {
                let _permit = match &limit {
                    Some(semaphore) => Some(semaphore.clone().acquire_owned().await),
                    None => None,
                };
                let name = handler.name().to_string();
                handler
                    .handle(&event)
                    .await
                    .map_err(|err| HandlerFailure::new(name, err.to_string()))
            }
        });

        let results = futures::future::join_all(futures).await;
        let total = results.len();
        let failures: Vec<HandlerFailure> = results.into_iter().filter_map(Result::err).collect();

        if !failures.is_empty() {
            debug!(failed = failures.len(), total, "handler failures during publish");
        }

        match EventBusError::from_results(total, failures) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        name: String,
        counter: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Handler for CountingHandler {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&self, _event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("boom".into())
            } else {
                Ok(())
            }
        }
    }

    fn event() -> Event {
        Event::new("order_created", StdHashMap::new())
    }

    #[tokio::test]
    async fn publish_with_no_handlers_succeeds() {
        let bus = EventBus::new();
        assert!(bus.publish(&event()).await.is_ok());
    }

    #[tokio::test]
    async fn publish_invokes_all_matching_handlers() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            "order_created",
            Arc::new(CountingHandler {
                name: "a".into(),
                counter: counter.clone(),
                fail: false,
            }),
        )
        .unwrap();
        bus.subscribe(
            "order_created",
            Arc::new(CountingHandler {
                name: "b".into(),
                counter: counter.clone(),
                fail: false,
            }),
        )
        .unwrap();

        bus.publish(&event()).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn publish_only_reaches_handlers_subscribed_to_its_event_type() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            "order_shipped",
            Arc::new(CountingHandler {
                name: "a".into(),
                counter: counter.clone(),
                fail: false,
            }),
        )
        .unwrap();

        bus.publish(&event()).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn publish_aggregates_failures_without_stopping_other_handlers() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            "order_created",
            Arc::new(CountingHandler {
                name: "failing".into(),
                counter: counter.clone(),
                fail: true,
            }),
        )
        .unwrap();
        bus.subscribe(
            "order_created",
            Arc::new(CountingHandler {
                name: "ok".into(),
                counter: counter.clone(),
                fail: false,
            }),
        )
        .unwrap();

        let err = bus.publish(&event()).await.unwrap_err();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        match err {
            EventBusError::HandlersFailed { total, failures } => {
                assert_eq!(total, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].handler, "failing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn subscribe_rejects_duplicate_names_within_the_same_event_type() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            "order_created",
            Arc::new(CountingHandler {
                name: "dup".into(),
                counter: counter.clone(),
                fail: false,
            }),
        )
        .unwrap();

        let err = bus
            .subscribe(
                "order_created",
                Arc::new(CountingHandler {
                    name: "dup".into(),
                    counter,
                    fail: false,
                }),
            )
            .unwrap_err();
        assert!(matches!(err, EventBusError::DuplicateHandler(name) if name == "dup"));
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            "order_created",
            Arc::new(CountingHandler {
                name: "x".into(),
                counter,
                fail: false,
            }),
        )
        .unwrap();
        assert!(bus.unsubscribe("order_created", "x"));
        assert!(!bus.contains("order_created", "x"));
        assert!(!bus.unsubscribe("order_created", "x"));
    }
}
