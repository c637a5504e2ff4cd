//! # Liveness reporting to the watchdog.
//!
//! The [`LivenessReporter`] is owned by the connectivity machine and feeds the
//! watchdog **from the machine's own task**: every await point of the machine
//! (waiting for a message, a backoff sleep, a connect or send call) is wrapped
//! in [`LivenessReporter::keep_fed`], which feeds on a fixed tick while the
//! wrapped future is pending.
//!
//! ```text
//! machine task ──► keep_fed(fut) ──┬─► fut ready ──► return output
//!                                  └─► tick      ──► watchdog.feed(handle)
//!
//! monitor task ──► watchdog.starved(handle) ──► Fault::watchdog ──► FaultEscalator
//! ```
//!
//! Calls into the cloud client go through [`LivenessReporter::keep_fed_bounded`]
//! instead: feeding stops once a single call has been outstanding for the
//! liveness budget, so a `connect()` that never resolves starves the channel.
//!
//! A machine task that stops being polled (blocked thread, runaway loop without
//! an await point) stops feeding, and the [`LivenessMonitor`] escalates.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::core::fault::Fault;
use crate::error::WatchdogError;
use crate::watchdog::{Watchdog, WatchdogHandle};

/// Feeds one watchdog channel on behalf of the connectivity machine.
pub struct LivenessReporter {
    watchdog: Arc<dyn Watchdog>,
    handle: WatchdogHandle,
    budget: Duration,
    ticker: Interval,
}

impl LivenessReporter {
    /// Registers `budget` with the watchdog and prepares a feed tick of `interval`.
    ///
    /// `interval` must be shorter than `budget`; [`Config::validate`](crate::Config::validate)
    /// enforces it.
    pub fn register(
        watchdog: Arc<dyn Watchdog>,
        budget: Duration,
        interval: Duration,
    ) -> Result<Self, WatchdogError> {
        let handle = watchdog.register(budget)?;
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(%handle, ?budget, ?interval, "liveness budget registered");
        Ok(Self {
            watchdog,
            handle,
            budget,
            ticker,
        })
    }

    /// The registered channel.
    pub fn handle(&self) -> WatchdogHandle {
        self.handle
    }

    /// Feeds the watchdog now.
    pub fn feed(&self) {
        if let Err(e) = self.watchdog.feed(self.handle) {
            tracing::warn!(handle = %self.handle, err = %e, "watchdog feed failed");
        }
    }

    /// Drives `fut` to completion, feeding the watchdog on every tick meanwhile.
    pub async fn keep_fed<F: Future>(&mut self, fut: F) -> F::Output {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                out = &mut fut => return out,
                _ = self.ticker.tick() => self.feed(),
            }
        }
    }

    /// Like [`keep_fed`](Self::keep_fed), but stops feeding once `fut` has been
    /// pending for the liveness budget. Meant for calls that must return in
    /// bounded time.
    pub async fn keep_fed_bounded<F: Future>(&mut self, fut: F) -> F::Output {
        let deadline = Instant::now() + self.budget;
        let mut overdue = false;
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                out = &mut fut => return out,
                _ = self.ticker.tick() => {
                    if Instant::now() < deadline {
                        self.feed();
                    } else if !overdue {
                        overdue = true;
                        tracing::error!(
                            handle = %self.handle,
                            budget = ?self.budget,
                            "cloud client call outstanding past liveness budget; feeding stopped"
                        );
                    }
                }
            }
        }
    }

    /// Creates the monitor that reports starvation of this channel.
    pub fn monitor(&self) -> LivenessMonitor {
        LivenessMonitor {
            watchdog: Arc::clone(&self.watchdog),
            handle: self.handle,
            budget: self.budget,
        }
    }
}

/// Waits for the machine's watchdog channel to starve.
pub struct LivenessMonitor {
    watchdog: Arc<dyn Watchdog>,
    handle: WatchdogHandle,
    budget: Duration,
}

impl LivenessMonitor {
    /// Feeds the channel once, restarting its budget from now.
    ///
    /// Called when the runtime starts, so time spent between registration and
    /// start does not count against the budget.
    pub fn rearm(&self) {
        if let Err(e) = self.watchdog.feed(self.handle) {
            tracing::warn!(handle = %self.handle, err = %e, "watchdog rearm failed");
        }
    }

    /// Resolves with the fault to escalate once the channel starves.
    ///
    /// A watchdog that cannot answer for the handle is treated as starvation too:
    /// liveness can no longer be proven.
    pub async fn starved(self) -> Fault {
        match self.watchdog.starved(self.handle).await {
            Ok(()) => Fault::watchdog(format!(
                "{} not fed within {:?}",
                self.handle, self.budget
            )),
            Err(e) => Fault::watchdog(format!("{} unverifiable: {e}", self.handle)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fault::FaultOrigin;
    use crate::testing::ManualWatchdog;
    use crate::watchdog::SoftWatchdog;

    #[tokio::test(start_paused = true)]
    async fn keeps_feeding_through_a_long_wait() {
        let wdt = Arc::new(ManualWatchdog::new());
        let mut rep = LivenessReporter::register(
            wdt.clone(),
            Duration::from_secs(20),
            Duration::from_secs(10),
        )
        .unwrap();

        rep.keep_fed(time::sleep(Duration::from_secs(100))).await;

        // First tick fires immediately, then every 10s.
        assert!(wdt.feeds() >= 10, "feeds={}", wdt.feeds());
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_wait_stops_feeding_after_budget() {
        let wdt = Arc::new(ManualWatchdog::new());
        let mut rep = LivenessReporter::register(
            wdt.clone(),
            Duration::from_secs(20),
            Duration::from_secs(10),
        )
        .unwrap();

        let hung = time::timeout(
            Duration::from_secs(1000),
            rep.keep_fed_bounded(std::future::pending::<()>()),
        )
        .await;

        assert!(hung.is_err());
        // Ticks at 0s and 10s feed; from 20s on the call is overdue.
        assert_eq!(wdt.feeds(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_call_starves_a_real_watchdog() {
        let wdt = Arc::new(SoftWatchdog::new(1));
        let mut rep = LivenessReporter::register(
            wdt.clone(),
            Duration::from_secs(5),
            Duration::from_secs(2),
        )
        .unwrap();
        let monitor = rep.monitor();
        let start = time::Instant::now();

        tokio::select! {
            _ = rep.keep_fed_bounded(std::future::pending::<()>()) => unreachable!(),
            fault = monitor.starved() => {
                assert_eq!(fault.origin, FaultOrigin::Watchdog);
                assert!(start.elapsed() <= Duration::from_secs(10));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_restarts_the_budget() {
        let wdt = Arc::new(SoftWatchdog::new(1));
        let rep = LivenessReporter::register(
            wdt.clone(),
            Duration::from_secs(5),
            Duration::from_secs(2),
        )
        .unwrap();
        let monitor = rep.monitor();

        time::sleep(Duration::from_secs(30)).await;
        monitor.rearm();
        let start = time::Instant::now();
        monitor.starved().await;

        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn fed_channel_does_not_starve_while_waiting() {
        let wdt = Arc::new(SoftWatchdog::new(1));
        let mut rep = LivenessReporter::register(
            wdt.clone(),
            Duration::from_secs(5),
            Duration::from_secs(2),
        )
        .unwrap();
        let monitor = rep.monitor();

        tokio::select! {
            _ = rep.keep_fed(time::sleep(Duration::from_secs(60))) => {}
            fault = monitor.starved() => panic!("starved while fed: {fault:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unfed_channel_reports_watchdog_fault() {
        let wdt = Arc::new(SoftWatchdog::new(1));
        let rep = LivenessReporter::register(
            wdt.clone(),
            Duration::from_secs(5),
            Duration::from_secs(2),
        )
        .unwrap();

        let fault = rep.monitor().starved().await;

        assert_eq!(fault.origin, FaultOrigin::Watchdog);
        assert!(fault.reason.contains("wdt#0"));
    }
}
