//! Fakes shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{self, Instant};

use crate::core::{Diagnostics, Fault, LogSink, ProcessControl};
use crate::error::{SendError, WatchdogError};
use crate::transport::{CloudClient, ConnectOutcome, SendFlags};
use crate::watchdog::{Watchdog, WatchdogHandle};

/// Lets every runnable task reach its next await point (virtual time).
pub async fn settle() {
    time::sleep(Duration::from_millis(10)).await;
}

/// Cloud client answering connects from a script.
pub struct ScriptedCloud {
    script: Mutex<VecDeque<ConnectOutcome>>,
    fallback: ConnectOutcome,
    connects: Mutex<Vec<Instant>>,
    disconnects: AtomicUsize,
    sent: Mutex<Vec<(Vec<u8>, SendFlags)>>,
    send_error: Mutex<Option<SendError>>,
    trace: Option<Trace>,
}

impl ScriptedCloud {
    /// Every connect returns `fallback` once the script is exhausted.
    pub fn new(fallback: ConnectOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            connects: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            send_error: Mutex::new(None),
            trace: None,
        }
    }

    /// Always connects.
    pub fn accepting() -> Self {
        Self::new(ConnectOutcome::Success)
    }

    /// Queues outcomes returned before the fallback.
    pub fn script(self, outcomes: impl IntoIterator<Item = ConnectOutcome>) -> Self {
        self.script.lock().unwrap().extend(outcomes);
        self
    }

    /// Makes every send fail.
    pub fn failing_sends(self, reason: &str) -> Self {
        *self.send_error.lock().unwrap() = Some(SendError::new(reason));
        self
    }

    /// Records every `disconnect()` as [`Step::Disconnect`] in `trace`.
    pub fn traced(mut self, trace: &Trace) -> Self {
        self.trace = Some(trace.clone());
        self
    }

    pub fn connect_times(&self) -> Vec<Instant> {
        self.connects.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(Vec<u8>, SendFlags)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CloudClient for ScriptedCloud {
    async fn connect(&self) -> ConnectOutcome {
        self.connects.lock().unwrap().push(Instant::now());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if let Some(trace) = &self.trace {
            trace.record(Step::Disconnect);
        }
    }

    async fn send(&self, bytes: &[u8], flags: SendFlags) -> Result<(), SendError> {
        self.sent.lock().unwrap().push((bytes.to_vec(), flags));
        match self.send_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Side effects of the escalation sequence, plus session teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Flush,
    Diagnostics,
    Disconnect,
    Restart,
}

/// Ordered, timestamped record of escalation side effects.
#[derive(Clone, Default)]
pub struct Trace {
    steps: Arc<Mutex<Vec<(Step, Instant)>>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, step: Step) {
        self.steps.lock().unwrap().push((step, Instant::now()));
    }

    pub fn steps(&self) -> Vec<Step> {
        self.steps.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }

    pub fn at(&self, step: Step) -> Option<Instant> {
        self.steps
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, at)| *at)
    }

    pub fn log_sink(&self) -> Arc<dyn LogSink> {
        Arc::new(self.clone())
    }

    pub fn diagnostics(&self) -> Arc<dyn Diagnostics> {
        Arc::new(self.clone())
    }

    pub fn process(&self) -> Arc<dyn ProcessControl> {
        Arc::new(self.clone())
    }
}

impl LogSink for Trace {
    fn flush(&self) {
        self.record(Step::Flush);
    }
}

impl Diagnostics for Trace {
    fn watchdog_starved(&self, _fault: &Fault) {
        self.record(Step::Diagnostics);
    }
}

impl ProcessControl for Trace {
    fn restart(&self, _fault: &Fault) {
        self.record(Step::Restart);
    }
}

/// Watchdog that starves only when told to.
#[derive(Default)]
pub struct ManualWatchdog {
    feeds: AtomicUsize,
    starved: AtomicBool,
    notify: Notify,
}

impl ManualWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feeds(&self) -> usize {
        self.feeds.load(Ordering::SeqCst)
    }

    pub fn starve(&self) {
        self.starved.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

#[async_trait]
impl Watchdog for ManualWatchdog {
    fn register(&self, _budget: Duration) -> Result<WatchdogHandle, WatchdogError> {
        Ok(WatchdogHandle(0))
    }

    fn feed(&self, _handle: WatchdogHandle) -> Result<(), WatchdogError> {
        self.feeds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn starved(&self, _handle: WatchdogHandle) -> Result<(), WatchdogError> {
        while !self.starved.load(Ordering::SeqCst) {
            self.notify.notified().await;
        }
        Ok(())
    }
}
