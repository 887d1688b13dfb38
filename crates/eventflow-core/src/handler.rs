//! The handler contract implemented by plugin-provided event consumers.

use async_trait::async_trait;

use crate::event::Event;

/// An event consumer registered against the [`crate::bus::EventBus`].
///
/// `name` must be stable and unique within a single bus instance; it is
/// used for route resolution, enable/disable toggles, and failure
/// attribution.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The handler's unique name.
    fn name(&self) -> &str;

    /// Whether this handler wants to process the given event.
    ///
    /// The default accepts every event; override to filter by payload
    /// shape rather than relying solely on route configuration.
    fn can_handle(&self, _event: &Event) -> bool {
        true
    }

    /// Processes the event. Errors are aggregated by the bus rather than
    /// aborting sibling handlers.
    async fn handle(&self, event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
