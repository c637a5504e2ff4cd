//! # Connectivity state and retry bookkeeping.
//!
//! Both values are owned by the connectivity machine's task and never shared;
//! other contexts see the state only through published [`CloudEvent`]s and the
//! read-only snapshot exposed by [`Runtime::state`](crate::Runtime::state).
//!
//! ## Transitions
//! ```text
//!                  Connected                     Success
//!  Disconnected ─────────────► Connecting ─────────────────► Ready
//!       ▲                       │    ▲                         │
//!       │     Disconnected      │    │ RetryableFailure        │ Disconnected
//!       └───────────────────────┘    └── (backoff, retry)      ▼
//!                                    ▲                       Paused
//!                                    └──────── Connected ──────┘
//!
//!  Connecting + FatalFailure ──► fault escalation (no return)
//! ```

use std::fmt;
use std::time::Duration;

use crate::events::CloudEvent;
use crate::policies::BackoffPolicy;

/// Lifecycle phase of the cloud session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityState {
    /// No link, no session (initial).
    #[default]
    Disconnected,
    /// Link up, attempt sequence in progress.
    Connecting,
    /// Session established; payloads are forwarded.
    Ready,
    /// Session was ready, link lost.
    Paused,
}

impl ConnectivityState {
    /// The status observers see while in this state; `Connecting` has none of its own.
    pub fn status(self) -> Option<CloudEvent> {
        match self {
            ConnectivityState::Disconnected => Some(CloudEvent::Disconnected),
            ConnectivityState::Connecting => None,
            ConnectivityState::Ready => Some(CloudEvent::Ready),
            ConnectivityState::Paused => Some(CloudEvent::Paused),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(self) -> &'static str {
        match self {
            ConnectivityState::Disconnected => "disconnected",
            ConnectivityState::Connecting => "connecting",
            ConnectivityState::Ready => "ready",
            ConnectivityState::Paused => "paused",
        }
    }

    /// True when payloads may be forwarded.
    #[inline]
    pub fn accepts_payloads(self) -> bool {
        matches!(self, ConnectivityState::Ready)
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Retry bookkeeping of one attempt sequence.
///
/// ### Rules
/// - `delay` never decreases until [`reset`](Self::reset), even with jitter
/// - `reset` is called only when a fresh sequence begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackoffState {
    attempt: u32,
    delay: Duration,
}

impl BackoffState {
    /// Number of retryable failures seen in the current sequence.
    #[inline]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Last wait scheduled (`ZERO` at rest).
    #[inline]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns to rest.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Records one retryable failure and returns the wait before the next attempt.
    pub fn advance(&mut self, policy: &BackoffPolicy) -> Duration {
        let next = policy.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.delay = self.delay.max(next);
        self.delay
    }
}
