//! # cloudlink
//!
//! **cloudlink** keeps a device's cloud session alive. It turns link-layer
//! up/down notifications into connect attempts with exponential backoff, forwards
//! application payloads only while the session is usable, tells the rest of the
//! firmware what the cloud status is, and proves its own liveness to a watchdog.
//! When something goes irrecoverably wrong it flushes logs, records diagnostics
//! and restarts the process after a grace period.
//!
//! ## Architecture
//! ```text
//!   link layer            application
//!       │ NetworkEvent         │ Payload
//!       ▼                      ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Bus: network | payload | cloud-status | error  (broadcast)   │
//! └──────┬───────────────────────────────────────────────▲────────┘
//!        ▼                                               │ CloudEvent / ErrorEvent
//! ┌───────────────────────────────┐                      │
//! │  ConnectivityMachine          │──────────────────────┘
//! │  - ConnectivityState          │
//! │  - BackoffState/BackoffPolicy │──► CloudClient::connect / send / disconnect
//! │  - LivenessReporter ──feed──► │──► Watchdog
//! └──────────────┬────────────────┘
//!                │ FatalFailure                  watchdog starved
//!                ▼                                      │
//!        ┌──────────────────────────────────────────────────────────┐
//!        │ FaultEscalator: flush ─► diagnostics ─► grace ─► restart │
//!        └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## States
//! ```text
//! Disconnected ──Connected──► Connecting ──Success──► Ready ──Disconnected──► Paused
//!      ▲                         │  ▲                                          │
//!      └──────Disconnected───────┘  └──────────────Connected───────────────────┘
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use cloudlink::{
//!     CloudClient, Config, ConnectOutcome, LogWriter, NetworkEvent, Payload, RuntimeBuilder,
//!     SendError, SendFlags, Subscribe,
//! };
//!
//! struct Broker;
//!
//! #[async_trait]
//! impl CloudClient for Broker {
//!     async fn connect(&self) -> ConnectOutcome { ConnectOutcome::Success }
//!     async fn disconnect(&self) {}
//!     async fn send(&self, _bytes: &[u8], _flags: SendFlags) -> Result<(), SendError> { Ok(()) }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     cloudlink::logging::init();
//!
//!     let runtime = RuntimeBuilder::new(Config::from_env()?, Arc::new(Broker))
//!         .with_subscribers(vec![Arc::new(LogWriter) as Arc<dyn Subscribe>])
//!         .build()?;
//!
//!     let bus = runtime.bus().clone();
//!     bus.network.publish(NetworkEvent::Connected);
//!     bus.payload.publish(Payload::from("temp=21.5"));
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
pub mod events;
pub mod logging;
mod policies;
mod sizing;
pub mod subscribers;
mod transport;
mod watchdog;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use core::{
    AbortProcess, BackoffState, Config, ConnectivityMachine, ConnectivityState,
    DEFAULT_BUS_CAPACITY, Diagnostics, Fault, FaultEscalator, FaultOrigin, LivenessMonitor,
    LivenessReporter, LogSink, ProcessControl, Runtime, RuntimeBuilder, StdioLogSink,
    TracingDiagnostics,
};
pub use error::{ConfigError, RuntimeError, SendError, WatchdogError};
pub use events::{Bus, Channel, CloudEvent, ErrorEvent, ErrorKind, Event, NetworkEvent, Payload};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use sizing::max_of;
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use transport::{CloudClient, ConnectOutcome, SendFlags};
pub use watchdog::{SoftWatchdog, Watchdog, WatchdogHandle};
