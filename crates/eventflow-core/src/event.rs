//! The event model shared by every subsystem in the dispatch core.
//!
//! Unlike a type-erased event hierarchy, `Event` is a single concrete,
//! immutable record. Producers attach whatever payload they need under
//! `data` and `metadata`; consumers route and filter on `event_type`.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The well-known event types emitted by the commerce domain.
///
/// Plugins may still route on arbitrary string event types supplied by
/// external configuration; this enum only names the types the core itself
/// knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    OrderCreated,
    OrderUpdated,
    OrderCancelled,
    OrderStateChanged,
    PaymentCaptured,
    PaymentFailed,
    InventoryAdjusted,
    CustomerRegistered,
}

impl EventType {
    /// The wire representation used as the `event_type` string on [`Event`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCreated => "order_created",
            Self::OrderUpdated => "order_updated",
            Self::OrderCancelled => "order_cancelled",
            Self::OrderStateChanged => "order_state_changed",
            Self::PaymentCaptured => "payment_captured",
            Self::PaymentFailed => "payment_failed",
            Self::InventoryAdjusted => "inventory_adjusted",
            Self::CustomerRegistered => "customer_registered",
        }
    }
}

impl EventType {
    /// Every well-known event type, used to seed default route subscriptions.
    pub const ALL: [EventType; 8] = [
        Self::OrderCreated,
        Self::OrderUpdated,
        Self::OrderCancelled,
        Self::OrderStateChanged,
        Self::PaymentCaptured,
        Self::PaymentFailed,
        Self::InventoryAdjusted,
        Self::CustomerRegistered,
    ];
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single immutable unit of work flowing through the event bus.
///
/// `metadata["idempotency_key"]` defaults to
/// `"{event_type}:{microseconds_since_epoch}"`, which is unique enough to
/// dedupe retried emissions without requiring producers to supply their own
/// key. It lives in `metadata` alongside every other producer-supplied key
/// rather than as a separate field, matching the wire shape consumers see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,
    #[serde(default)]
    pub data: HashMap<String, Value>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub timestamp_micros: i64,
}

impl Event {
    /// Builds an event stamped with the current time and a derived
    /// idempotency key.
    pub fn new(event_type: impl Into<String>, data: HashMap<String, Value>) -> Self {
        Self::with_metadata(event_type, data, HashMap::new())
    }

    /// Builds an event with explicit metadata. An `idempotency_key` is
    /// computed and inserted unless `metadata` already supplies one.
    pub fn with_metadata(
        event_type: impl Into<String>,
        data: HashMap<String, Value>,
        mut metadata: HashMap<String, Value>,
    ) -> Self {
        let event_type = event_type.into();
        let timestamp_micros = now_micros();
        metadata
            .entry("idempotency_key".to_string())
            .or_insert_with(|| Value::String(idempotency_key(&event_type, timestamp_micros)));
        Self {
            event_type,
            data,
            metadata,
            timestamp_micros,
        }
    }

    /// Returns a new event copying `event_type`, `data` and `timestamp`
    /// from `self`, with `updates` merged into the existing metadata.
    pub fn with_updates(&self, updates: HashMap<String, Value>) -> Self {
        let mut metadata = self.metadata.clone();
        metadata.extend(updates);
        Self {
            event_type: self.event_type.clone(),
            data: self.data.clone(),
            metadata,
            timestamp_micros: self.timestamp_micros,
        }
    }

    /// The event's idempotency key, read out of `metadata`.
    pub fn idempotency_key(&self) -> &str {
        self.metadata.get("idempotency_key").and_then(Value::as_str).unwrap_or_default()
    }

    /// Convenience accessor mirroring the common `new_state_id`/`state_id`
    /// lookup used for route resolution.
    pub fn state_id(&self) -> Option<&str> {
        self.data
            .get("new_state_id")
            .or_else(|| self.data.get("state_id"))
            .and_then(Value::as_str)
    }
}

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as i64
}

fn idempotency_key(event_type: &str, timestamp_micros: i64) -> String {
    format!("{event_type}:{timestamp_micros}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_matches_event_type_and_timestamp() {
        let event = Event::new("order_created", HashMap::new());
        let expected = format!("order_created:{}", event.timestamp_micros);
        assert_eq!(event.idempotency_key(), expected);
        assert_eq!(event.metadata.get("idempotency_key").unwrap().as_str().unwrap(), expected);
    }

    #[test]
    fn with_updates_copies_fields_and_merges_metadata() {
        let event = Event::new("order_created", HashMap::new());
        let mut updates = HashMap::new();
        updates.insert("source".to_string(), Value::String("svc::orders".to_string()));

        let updated = event.with_updates(updates);
        assert_eq!(updated.event_type, event.event_type);
        assert_eq!(updated.data, event.data);
        assert_eq!(updated.timestamp_micros, event.timestamp_micros);
        assert_eq!(updated.idempotency_key(), event.idempotency_key());
        assert_eq!(updated.metadata.get("source").unwrap(), "svc::orders");
    }

    #[test]
    fn state_id_prefers_new_state_id_over_state_id() {
        let mut data = HashMap::new();
        data.insert("new_state_id".to_string(), Value::String("shipped".into()));
        data.insert("state_id".to_string(), Value::String("pending".into()));
        let event = Event::new("order_state_changed", data);
        assert_eq!(event.state_id(), Some("shipped"));
    }

    #[test]
    fn event_type_as_str_round_trips_through_display() {
        assert_eq!(EventType::OrderCreated.as_str(), "order_created");
        assert_eq!(EventType::OrderCreated.to_string(), "order_created");
    }
}
