//! # SubscriberSet: non-blocking fan-out over observers.
//!
//! - `emit(&Event)` returns immediately.
//! - Order is preserved per observer, not across observers.
//! - A panicking observer is logged and keeps receiving later events.
//!
//! ```text
//!    emit(&Event)
//!        ├────► [queue S1] ─► worker S1 ─► on_event()
//!        └────► [queue SN] ─► worker SN ─► on_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::Event;

use super::Subscribe;

struct Slot {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Observers with one bounded queue and one worker each.
pub struct SubscriberSet {
    slots: Vec<Slot>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Spawns one worker per observer. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut slots = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

            workers.push(tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = std::panic::AssertUnwindSafe(sub.on_event(ev.as_ref()));
                    if fut.catch_unwind().await.is_err() {
                        tracing::error!(subscriber = sub.name(), "observer panicked");
                    }
                }
            }));
            slots.push(Slot { name, tx });
        }

        Self { slots, workers }
    }

    /// Queues `event` for every observer without waiting.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for slot in &self.slots {
            match slot.tx.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = slot.name, "event dropped: queue full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::warn!(subscriber = slot.name, "event dropped: worker gone");
                }
            }
        }
    }

    /// Closes every queue and waits until the workers have drained them.
    pub async fn shutdown(self) {
        drop(self.slots);
        for h in self.workers {
            let _ = h.await;
        }
    }

    /// True if there are no observers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
