//! # Builder: assembles a [`Runtime`] from a config and a cloud client.
//!
//! `build()` validates the config, registers the liveness channel, creates the
//! bus and wires the machine, monitor and escalator around one shutdown token.
//! Collaborators not supplied fall back to their production defaults.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        Config,
        fault::{
            AbortProcess, Diagnostics, FaultEscalator, LogSink, ProcessControl, StdioLogSink,
            TracingDiagnostics,
        },
        liveness::LivenessReporter,
        machine::ConnectivityMachine,
        runtime::Runtime,
    },
    error::RuntimeError,
    events::Bus,
    subscribers::Subscribe,
    transport::CloudClient,
    watchdog::{SoftWatchdog, Watchdog},
};

/// Builder for a [`Runtime`] around one cloud client.
///
/// Every collaborator has a production default:
/// [`SoftWatchdog`], [`StdioLogSink`], [`TracingDiagnostics`] and [`AbortProcess`].
pub struct RuntimeBuilder {
    cfg: Config,
    client: Arc<dyn CloudClient>,
    watchdog: Option<Arc<dyn Watchdog>>,
    logs: Option<Arc<dyn LogSink>>,
    diagnostics: Option<Arc<dyn Diagnostics>>,
    process: Option<Arc<dyn ProcessControl>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl RuntimeBuilder {
    /// Creates a builder with the given configuration and client.
    pub fn new(cfg: Config, client: Arc<dyn CloudClient>) -> Self {
        Self {
            cfg,
            client,
            watchdog: None,
            logs: None,
            diagnostics: None,
            process: None,
            subscribers: Vec::new(),
        }
    }

    /// Registers the liveness budget with `watchdog` instead of a fresh [`SoftWatchdog`].
    pub fn with_watchdog(mut self, watchdog: Arc<dyn Watchdog>) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    /// Sets the sink flushed first during fault escalation.
    pub fn with_log_sink(mut self, logs: Arc<dyn LogSink>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Sets the crash-reporting subsystem told about watchdog starvation.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Sets what restarts the process at the end of fault escalation.
    pub fn with_process_control(mut self, process: Arc<dyn ProcessControl>) -> Self {
        self.process = Some(process);
        self
    }

    /// Sets observers of `cloud-status` and `error`.
    ///
    /// Each one gets a dedicated worker with a bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the configuration and wires the runtime.
    ///
    /// Must be called inside a tokio runtime. Fails if the configuration is
    /// invalid or the watchdog refuses the liveness budget.
    pub fn build(self) -> Result<Runtime, RuntimeError> {
        self.cfg.validate()?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let token = CancellationToken::new();

        let watchdog = self
            .watchdog
            .unwrap_or_else(|| Arc::new(SoftWatchdog::default()));
        let liveness = LivenessReporter::register(
            watchdog,
            self.cfg.liveness_budget,
            self.cfg.effective_feed_interval(),
        )?;
        let monitor = liveness.monitor();

        let escalator = Arc::new(FaultEscalator::new(
            self.cfg.grace,
            self.logs.unwrap_or_else(|| Arc::new(StdioLogSink)),
            self.diagnostics
                .unwrap_or_else(|| Arc::new(TracingDiagnostics)),
            self.process.unwrap_or_else(|| Arc::new(AbortProcess)),
            token.clone(),
        ));

        let (machine, state) = ConnectivityMachine::new(
            self.client,
            self.cfg.backoff,
            &bus,
            liveness,
            Arc::clone(&escalator),
        );

        tracing::debug!(
            bus_capacity = self.cfg.bus_capacity_clamped(),
            grace = ?self.cfg.grace,
            subscribers = self.subscribers.len(),
            "connectivity runtime built"
        );

        Ok(Runtime::new_internal(
            bus,
            state,
            token,
            machine,
            monitor,
            escalator,
            self.subscribers,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::{ConfigError, WatchdogError};
    use crate::testing::ScriptedCloud;

    #[tokio::test]
    async fn rejects_invalid_config() {
        let cfg = Config {
            liveness_budget: Duration::from_secs(10),
            feed_interval: Duration::from_secs(10),
            ..Config::default()
        };

        let err = RuntimeBuilder::new(cfg, Arc::new(ScriptedCloud::accepting()))
            .build()
            .err()
            .unwrap();

        assert!(matches!(
            err,
            RuntimeError::Config(ConfigError::FeedTooSlow { .. })
        ));
    }

    #[tokio::test]
    async fn fails_when_watchdog_has_no_free_channel() {
        let wdt = Arc::new(SoftWatchdog::new(1));
        wdt.register(Duration::from_secs(5)).unwrap();

        let err = RuntimeBuilder::new(Config::default(), Arc::new(ScriptedCloud::accepting()))
            .with_watchdog(wdt)
            .build()
            .err()
            .unwrap();

        assert!(matches!(
            err,
            RuntimeError::Watchdog(WatchdogError::NoChannels { capacity: 1 })
        ));
    }
}
