//! # Watchdog supervisor contract.
//!
//! A watchdog hands out channels, each with a liveness budget: the maximum
//! silent interval before the channel is declared starved. The owner proves
//! forward progress by feeding its channel more often than the budget.
//!
//! ```text
//! register(budget) ──► handle
//! feed(handle)     ──► deadline = now + budget
//! starved(handle)  ──► resolves once now >= deadline
//! ```
//!
//! [`SoftWatchdog`] is an in-process implementation on tokio timers; a hardware
//! or RTOS task watchdog can be plugged in by implementing [`Watchdog`].

mod soft;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::WatchdogError;

pub use soft::SoftWatchdog;

/// Identifies one registered watchdog channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchdogHandle(pub u32);

impl fmt::Display for WatchdogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wdt#{}", self.0)
    }
}

/// # Watchdog supervisor.
#[async_trait]
pub trait Watchdog: Send + Sync + 'static {
    /// Registers a channel with the given liveness budget; the budget starts now.
    fn register(&self, budget: Duration) -> Result<WatchdogHandle, WatchdogError>;

    /// Restarts the budget of a channel.
    fn feed(&self, handle: WatchdogHandle) -> Result<(), WatchdogError>;

    /// Resolves when the channel has gone unfed for longer than its budget.
    async fn starved(&self, handle: WatchdogHandle) -> Result<(), WatchdogError>;
}
