//! Runtime core: connectivity state, liveness and fault handling.
//!
//! Public entry points are [`RuntimeBuilder`] and [`Runtime`]; the remaining
//! exports are the pieces they are assembled from, usable on their own.
//!
//! Internal modules:
//! - [`config`]: tunables and `CLOUDLINK_*` environment loading;
//! - [`state`]: connectivity state and retry bookkeeping;
//! - [`attempt`]: one connect or send call with outcome logging;
//! - [`machine`]: the connectivity state machine;
//! - [`liveness`]: watchdog feeding and starvation monitoring;
//! - [`fault`]: the fatal escalation sequence;
//! - [`runtime`], [`builder`]: wiring and lifecycle.

mod attempt;
mod builder;
mod config;
mod fault;
mod liveness;
mod machine;
mod runtime;
mod state;

pub use builder::RuntimeBuilder;
pub use config::{Config, DEFAULT_BUS_CAPACITY};
pub use fault::{
    AbortProcess, Diagnostics, Fault, FaultEscalator, FaultOrigin, LogSink, ProcessControl,
    StdioLogSink, TracingDiagnostics,
};
pub use liveness::{LivenessMonitor, LivenessReporter};
pub use machine::ConnectivityMachine;
pub use runtime::Runtime;
pub use state::{BackoffState, ConnectivityState};
