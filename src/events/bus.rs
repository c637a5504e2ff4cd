//! # Typed broadcast channels.
//!
//! [`Channel`] is a thin wrapper around [`tokio::sync::broadcast`] carrying one
//! message type; [`Bus`] bundles the four channels the connectivity machine
//! talks over.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                         Receivers (one per consumer):
//!   link layer  ──► network      ──┐
//!   application ──► payload      ──┼──► ConnectivityMachine
//!                                  │
//!   machine     ──► cloud-status ──┼──► observer listener ──► SubscriberSet
//!   machine     ──► error        ──┘    application receivers
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Per-channel order**: a receiver sees one channel's messages in publish order.
//! - **No cross-channel order**: two channels are independent queues.
//! - **Bounded backlog, drop-oldest**: a receiver that falls more than `capacity`
//!   messages behind observes `RecvError::Lagged(n)` and skips the `n` oldest.
//! - **No persistence**: a receiver only sees messages published after it subscribed.

use tokio::sync::broadcast;

use super::message::{CloudEvent, ErrorEvent, NetworkEvent, Payload};

/// One named broadcast channel.
///
/// Cheap to clone; every clone publishes into the same queue.
#[derive(Debug)]
pub struct Channel<T> {
    name: &'static str,
    tx: broadcast::Sender<T>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Channel<T> {
    /// Creates a channel whose receivers each buffer up to `capacity` messages (min 1).
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<T>(capacity.max(1));
        Self { name, tx }
    }

    /// Channel name, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Publishes a message to every current receiver.
    ///
    /// Returns the number of receivers the message was queued for; `0` means
    /// nobody was listening and the message was dropped.
    pub fn publish(&self, msg: T) -> usize {
        match self.tx.send(msg) {
            Ok(n) => n,
            Err(_) => {
                tracing::trace!(channel = self.name, "published with no receivers");
                0
            }
        }
    }

    /// Creates an independent receiver that observes subsequent messages.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// The four channels of the connectivity core.
#[derive(Clone, Debug)]
pub struct Bus {
    /// Inbound link availability changes.
    pub network: Channel<NetworkEvent>,
    /// Inbound application payloads.
    pub payload: Channel<Payload>,
    /// Outbound connectivity status.
    pub cloud: Channel<CloudEvent>,
    /// Outbound fault reports.
    pub error: Channel<ErrorEvent>,
}

impl Bus {
    /// Creates a bus whose channels all use the given per-receiver capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            network: Channel::new("network", capacity),
            payload: Channel::new("payload", capacity),
            cloud: Channel::new("cloud-status", capacity),
            error: Channel::new("error", capacity),
        }
    }
}
