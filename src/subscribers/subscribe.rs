//! # Observer trait.
//!
//! Each observer runs on a dedicated worker fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet). A slow observer only
//! delays itself; once its queue is full further events are dropped for it.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for observers of cloud status and error events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this observer's queue.
    fn queue_capacity(&self) -> usize {
        64
    }
}
