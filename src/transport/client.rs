//! # Cloud client trait and call outcomes.
//!
//! A client is responsible for its own I/O timeouts: every call must return in
//! bounded time. The connectivity machine does not cancel a slow call, but it
//! stops feeding the watchdog once one call has been pending for the liveness
//! budget, so a call that never returns ends in watchdog escalation.
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use cloudlink::{CloudClient, ConnectOutcome, SendError, SendFlags};
//!
//! struct Loopback;
//!
//! #[async_trait]
//! impl CloudClient for Loopback {
//!     async fn connect(&self) -> ConnectOutcome {
//!         ConnectOutcome::Success
//!     }
//!
//!     async fn disconnect(&self) {}
//!
//!     async fn send(&self, bytes: &[u8], _flags: SendFlags) -> Result<(), SendError> {
//!         if bytes.is_empty() {
//!             return Err(SendError::new("empty payload"));
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use std::fmt;

use async_trait::async_trait;

use crate::error::SendError;

/// Result of one `connect()` attempt, as classified by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Session established.
    Success,
    /// Transient problem (timeout, resource exhaustion); retried with backoff.
    RetryableFailure(String),
    /// Protocol, authentication or unrecoverable transport error; escalated.
    FatalFailure(String),
}

impl ConnectOutcome {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectOutcome::Success => "success",
            ConnectOutcome::RetryableFailure(_) => "retryable_failure",
            ConnectOutcome::FatalFailure(_) => "fatal_failure",
        }
    }

    /// True for [`ConnectOutcome::RetryableFailure`].
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectOutcome::RetryableFailure(_))
    }
}

/// Delivery-reliability flags passed with every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendFlags {
    /// The cloud must acknowledge the payload.
    pub ack_required: bool,
    /// Transmit as a confirmable message.
    pub confirmable: bool,
}

impl SendFlags {
    /// Operational telemetry: no acknowledgement, not confirmable.
    pub const TELEMETRY: SendFlags = SendFlags {
        ack_required: false,
        confirmable: false,
    };
}

impl fmt::Display for SendFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ack={} confirmable={}", self.ack_required, self.confirmable)
    }
}

/// # Cloud session client.
///
/// Called only from the connectivity machine's task, one call at a time.
#[async_trait]
pub trait CloudClient: Send + Sync + 'static {
    /// Establishes a cloud session.
    async fn connect(&self) -> ConnectOutcome;

    /// Tears down the session, if any. Must be safe to call without one.
    async fn disconnect(&self);

    /// Transmits one payload over an established session.
    async fn send(&self, bytes: &[u8], flags: SendFlags) -> Result<(), SendError>;
}
