//! # Fault escalation: observability before death.
//!
//! [`FaultEscalator`] turns a fatal condition into a bounded, ordered shutdown
//! sequence. Two paths reach it:
//! - the connectivity machine, on a fatal transport failure;
//! - the liveness monitor, when the watchdog channel starves.
//!
//! ## Sequence
//! ```text
//! escalate(fault)
//!   ├─► 1. LogSink::flush()
//!   ├─► 2. Diagnostics::watchdog_starved()     (watchdog faults only)
//!   ├─► halt normal operation (runtime token cancelled)
//!   ├─► 3. sleep(grace)                        (default 10s)
//!   └─► 4. ProcessControl::restart()
//! ```
//!
//! ## Rules
//! - Irrevocable: the first call owns the sequence; any later call parks forever.
//! - Nothing else reacts to the fault before diagnostics are recorded: the halt
//!   that stops the machine and drains observers comes after step 2.
//! - No step is skipped and no step allocates beyond the fault it was given.
//! - Nothing resumes the machine afterwards.

use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::RuntimeError;

/// What raised a fatal fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOrigin {
    /// The cloud client classified a connect attempt as fatal.
    Transport,
    /// The machine's watchdog channel starved.
    Watchdog,
}

impl fmt::Display for FaultOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultOrigin::Transport => "transport",
            FaultOrigin::Watchdog => "watchdog",
        })
    }
}

/// A fatal condition handed to the escalator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// What raised it.
    pub origin: FaultOrigin,
    /// Detail.
    pub reason: Arc<str>,
}

impl Fault {
    /// A fatal transport failure.
    pub fn transport(reason: impl Into<Arc<str>>) -> Self {
        Self {
            origin: FaultOrigin::Transport,
            reason: reason.into(),
        }
    }

    /// Watchdog starvation.
    pub fn watchdog(reason: impl Into<Arc<str>>) -> Self {
        Self {
            origin: FaultOrigin::Watchdog,
            reason: reason.into(),
        }
    }
}

/// Destination of log output that may still be buffered.
pub trait LogSink: Send + Sync + 'static {
    /// Pushes out everything buffered so far.
    fn flush(&self);
}

/// Crash-reporting subsystem.
pub trait Diagnostics: Send + Sync + 'static {
    /// Records a watchdog starvation before the process goes down.
    fn watchdog_starved(&self, fault: &Fault);
}

/// Supervisor-directed process restart.
pub trait ProcessControl: Send + Sync + 'static {
    /// Restarts the process. Production implementations do not return.
    fn restart(&self, fault: &Fault);
}

/// Flushes the standard streams the `tracing` fmt layer writes to.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioLogSink;

impl LogSink for StdioLogSink {
    fn flush(&self) {
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
    }
}

/// Reports starvation as an error-level `tracing` event on the `diagnostics` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn watchdog_starved(&self, fault: &Fault) {
        tracing::error!(target: "diagnostics", reason = %fault.reason, "software watchdog fired");
    }
}

/// Aborts the process so the platform supervisor restarts it.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortProcess;

impl ProcessControl for AbortProcess {
    fn restart(&self, fault: &Fault) {
        tracing::error!(origin = %fault.origin, reason = %fault.reason, "restarting process");
        std::process::abort();
    }
}

/// Runs the irrevocable fatal sequence.
pub struct FaultEscalator {
    grace: Duration,
    logs: Arc<dyn LogSink>,
    diagnostics: Arc<dyn Diagnostics>,
    process: Arc<dyn ProcessControl>,
    halt: CancellationToken,
    engaged: AtomicBool,
}

impl FaultEscalator {
    /// Creates an escalator; `halt` is cancelled once diagnostics are recorded.
    pub fn new(
        grace: Duration,
        logs: Arc<dyn LogSink>,
        diagnostics: Arc<dyn Diagnostics>,
        process: Arc<dyn ProcessControl>,
        halt: CancellationToken,
    ) -> Self {
        Self {
            grace,
            logs,
            diagnostics,
            process,
            halt,
            engaged: AtomicBool::new(false),
        }
    }

    /// True once a sequence has started.
    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }

    /// Runs the sequence for `fault`.
    ///
    /// Returns only if the configured [`ProcessControl`] returns; the result is the
    /// error the runtime reports. A second caller never returns.
    pub async fn escalate(&self, fault: Fault) -> RuntimeError {
        if self.engaged.swap(true, Ordering::AcqRel) {
            tracing::warn!(origin = %fault.origin, reason = %fault.reason, "escalation already in progress");
            std::future::pending::<()>().await;
        }
        tracing::error!(
            origin = %fault.origin,
            reason = %fault.reason,
            grace = ?self.grace,
            "fatal fault; escalating"
        );

        self.logs.flush();
        if fault.origin == FaultOrigin::Watchdog {
            self.diagnostics.watchdog_starved(&fault);
        }
        self.halt.cancel();
        time::sleep(self.grace).await;
        self.process.restart(&fault);

        RuntimeError::Escalated {
            origin: fault.origin,
            reason: fault.reason,
        }
    }
}
