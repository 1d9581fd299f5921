//! Command Sink Trait
//!
//! Outbound side of the engine link. The dispatcher only knows this trait so
//! it can be exercised without a socket.

use async_trait::async_trait;

use crate::domain::errors::TransportError;

#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Deliver one serialized command frame.
    ///
    /// Returns `TransportError::NotConnected { queued: true }` when the link
    /// stayed down for the whole send timeout; the frame remains queued and is
    /// flushed on the next successful connect. Returns
    /// `TransportError::CommandEvicted` when newer commands overflowed the
    /// queue while the caller waited and this frame was dropped; it will not
    /// be sent.
    async fn send_text(&self, payload: String) -> Result<(), TransportError>;
}
