//! # Observers of the outbound channels.
//!
//! The runtime listens on `cloud-status` and `error` and fans every message out
//! to user-supplied [`Subscribe`] implementations as an [`Event`](crate::events::Event).
//!
//! ```text
//! machine ── publish ──► cloud-status ─┐
//!                        error ────────┴─► runtime listener ──► SubscriberSet::emit(&Event)
//!                                                                 ├──► [queue] ─► LogWriter
//!                                                                 └──► [queue] ─► custom ...
//! ```
//!
//! Observers never slow the machine down: a full queue drops the event for
//! that observer only.
//!
//! ## Implementing an observer
//! ```no_run
//! use cloudlink::events::{CloudEvent, Event};
//! use cloudlink::subscribers::Subscribe;
//! use async_trait::async_trait;
//!
//! struct ReadyLed;
//!
//! #[async_trait]
//! impl Subscribe for ReadyLed {
//!     async fn on_event(&self, event: &Event) {
//!         if let Event::Cloud(CloudEvent::Ready) = event {
//!             // light the LED
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "ready-led"
//!     }
//! }
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
