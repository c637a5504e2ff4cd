//! Error types used by the connectivity runtime and its collaborators.
//!
//! - [`RuntimeError`]: why [`Runtime::run`](crate::Runtime::run) or
//!   [`RuntimeBuilder::build`](crate::RuntimeBuilder::build) stopped.
//! - [`ConfigError`]: invalid configuration values.
//! - [`WatchdogError`]: watchdog registration/feed failures.
//! - [`SendError`]: a payload send the cloud client could not complete.
//!
//! Every type offers `as_label` for logs.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::FaultOrigin;

/// # Errors produced by the connectivity runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A fatal fault went through the escalation sequence.
    ///
    /// Only observable when the configured process control returns instead of
    /// restarting the process (tests, host simulation).
    #[error("fatal {origin} fault escalated: {reason}")]
    Escalated {
        /// What raised the fault.
        origin: FaultOrigin,
        /// Detail of the fault.
        reason: Arc<str>,
    },

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The liveness budget could not be registered with the watchdog.
    #[error(transparent)]
    Watchdog(#[from] WatchdogError),

    /// A runtime task panicked before it could report.
    #[error("runtime task '{task}' panicked")]
    Panicked {
        /// Name of the task.
        task: &'static str,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use cloudlink::{FaultOrigin, RuntimeError};
    ///
    /// let err = RuntimeError::Escalated { origin: FaultOrigin::Watchdog, reason: "starved".into() };
    /// assert_eq!(err.as_label(), "runtime_escalated");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Escalated { .. } => "runtime_escalated",
            RuntimeError::Config(_) => "runtime_config",
            RuntimeError::Watchdog(_) => "runtime_watchdog",
            RuntimeError::Panicked { .. } => "runtime_panicked",
        }
    }
}

/// # Invalid configuration.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// Parse failure detail.
        reason: String,
    },

    /// The liveness budget is zero.
    #[error("liveness budget must be non-zero")]
    ZeroBudget,

    /// The watchdog would starve between two feeds.
    #[error("feed interval {interval:?} must be shorter than liveness budget {budget:?}")]
    FeedTooSlow {
        /// Effective feed interval.
        interval: Duration,
        /// Registered budget.
        budget: Duration,
    },

    /// The backoff ceiling is below the initial delay or the factor shrinks delays.
    #[error("backoff must not shrink: first={first:?} max={max:?} factor={factor}")]
    ShrinkingBackoff {
        /// Initial delay.
        first: Duration,
        /// Ceiling.
        max: Duration,
        /// Growth factor.
        factor: f64,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Invalid { .. } => "config_invalid",
            ConfigError::ZeroBudget => "config_zero_budget",
            ConfigError::FeedTooSlow { .. } => "config_feed_too_slow",
            ConfigError::ShrinkingBackoff { .. } => "config_shrinking_backoff",
        }
    }
}

/// # Watchdog failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchdogError {
    /// A zero budget can never be honoured.
    #[error("liveness budget must be non-zero")]
    InvalidBudget,

    /// All watchdog channels are taken.
    #[error("no free watchdog channel (capacity {capacity})")]
    NoChannels {
        /// Number of channels the watchdog supports.
        capacity: usize,
    },

    /// The handle was never registered with this watchdog.
    #[error("unknown watchdog handle {0}")]
    UnknownHandle(u32),

    /// Internal bookkeeping is unusable after a panic.
    #[error("watchdog state poisoned")]
    Poisoned,
}

impl WatchdogError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WatchdogError::InvalidBudget => "watchdog_invalid_budget",
            WatchdogError::NoChannels { .. } => "watchdog_no_channels",
            WatchdogError::UnknownHandle(_) => "watchdog_unknown_handle",
            WatchdogError::Poisoned => "watchdog_poisoned",
        }
    }
}

/// # A payload send that did not complete.
///
/// Always recoverable: losing one telemetry item does not threaten the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("send failed: {reason}")]
pub struct SendError {
    /// Transport detail.
    pub reason: String,
}

impl SendError {
    /// Creates a send error with the given detail.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
