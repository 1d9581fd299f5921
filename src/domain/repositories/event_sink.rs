//! Event Sink Trait
//!
//! The transport hands every decoded engine event to an `EventSink`, one at a
//! time and in arrival order. The state store is the production sink; tests
//! plug in recorders.

use async_trait::async_trait;

use crate::domain::events::EngineEvent;

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Apply one event. Must not be called concurrently for the same sink.
    async fn on_event(&self, event: EngineEvent);
}
