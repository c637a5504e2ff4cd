//! # In-process task watchdog.
//!
//! Each channel keeps the instant of its last feed in a `watch` cell; a
//! starvation waiter sleeps until `last_feed + budget` and re-arms whenever a
//! feed lands first.
//!
//! ## Example
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), cloudlink::WatchdogError> {
//! use std::time::Duration;
//! use cloudlink::{SoftWatchdog, Watchdog};
//!
//! let wdt = SoftWatchdog::new(2);
//! let handle = wdt.register(Duration::from_secs(30))?;
//! wdt.feed(handle)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{self, Instant};

use super::{Watchdog, WatchdogHandle};
use crate::error::WatchdogError;

struct Slot {
    budget: Duration,
    fed: watch::Sender<Instant>,
}

/// Software watchdog with a fixed number of channels.
pub struct SoftWatchdog {
    capacity: usize,
    slots: Mutex<Vec<Slot>>,
}

impl SoftWatchdog {
    /// Creates a watchdog supporting up to `capacity` channels (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            slots: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    fn with_slot<R>(
        &self,
        handle: WatchdogHandle,
        f: impl FnOnce(&Slot) -> R,
    ) -> Result<R, WatchdogError> {
        let slots = self.slots.lock().map_err(|_| WatchdogError::Poisoned)?;
        slots
            .get(handle.0 as usize)
            .map(f)
            .ok_or(WatchdogError::UnknownHandle(handle.0))
    }
}

impl Default for SoftWatchdog {
    fn default() -> Self {
        Self::new(4)
    }
}

#[async_trait]
impl Watchdog for SoftWatchdog {
    fn register(&self, budget: Duration) -> Result<WatchdogHandle, WatchdogError> {
        if budget.is_zero() {
            return Err(WatchdogError::InvalidBudget);
        }
        let mut slots = self.slots.lock().map_err(|_| WatchdogError::Poisoned)?;
        if slots.len() >= self.capacity {
            return Err(WatchdogError::NoChannels {
                capacity: self.capacity,
            });
        }
        let (fed, _rx) = watch::channel(Instant::now());
        slots.push(Slot { budget, fed });
        let handle = WatchdogHandle((slots.len() - 1) as u32);
        tracing::debug!(%handle, ?budget, "watchdog channel registered");
        Ok(handle)
    }

    fn feed(&self, handle: WatchdogHandle) -> Result<(), WatchdogError> {
        self.with_slot(handle, |slot| {
            slot.fed.send_replace(Instant::now());
        })
    }

    async fn starved(&self, handle: WatchdogHandle) -> Result<(), WatchdogError> {
        let (budget, mut rx) = self.with_slot(handle, |slot| (slot.budget, slot.fed.subscribe()))?;

        loop {
            let last = *rx.borrow_and_update();
            tokio::select! {
                _ = time::sleep_until(last + budget) => {
                    if !rx.has_changed().map_err(|_| WatchdogError::UnknownHandle(handle.0))? {
                        tracing::warn!(%handle, ?budget, "watchdog channel starved");
                        return Ok(());
                    }
                }
                res = rx.changed() => {
                    res.map_err(|_| WatchdogError::UnknownHandle(handle.0))?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn starves_after_budget_without_feeds() {
        let wdt = SoftWatchdog::new(1);
        let handle = wdt.register(Duration::from_secs(5)).unwrap();
        let start = Instant::now();

        wdt.starved(handle).await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn feeding_postpones_starvation() {
        let wdt = std::sync::Arc::new(SoftWatchdog::new(1));
        let handle = wdt.register(Duration::from_secs(5)).unwrap();
        let start = Instant::now();

        let feeder = {
            let wdt = wdt.clone();
            tokio::spawn(async move {
                for _ in 0..4 {
                    time::sleep(Duration::from_secs(3)).await;
                    wdt.feed(handle).unwrap();
                }
            })
        };

        wdt.starved(handle).await.unwrap();
        feeder.await.unwrap();

        // Last feed at 12s, so starvation cannot come before 17s.
        assert!(start.elapsed() >= Duration::from_secs(17));
    }

    #[test]
    fn rejects_zero_budget_and_exhaustion() {
        let wdt = SoftWatchdog::new(1);
        assert_eq!(
            wdt.register(Duration::ZERO),
            Err(WatchdogError::InvalidBudget)
        );
        let h = wdt.register(Duration::from_secs(1)).unwrap();
        assert_eq!(h, WatchdogHandle(0));
        assert_eq!(
            wdt.register(Duration::from_secs(1)),
            Err(WatchdogError::NoChannels { capacity: 1 })
        );
        assert_eq!(
            wdt.feed(WatchdogHandle(7)),
            Err(WatchdogError::UnknownHandle(7))
        );
    }
}
