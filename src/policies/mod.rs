//! Retry pacing policies.
//!
//! This module groups the knobs that control **how long** the connectivity
//! machine waits between failed connection attempts of one attempt sequence.
//!
//! ## Contents
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to spread fleet-wide reconnects
//!
//! ## Quick wiring
//! ```text
//! Config { backoff: BackoffPolicy, .. }
//!      └─► core::machine::ConnectivityMachine keeps a BackoffState and calls
//!           - backoff.delay(attempt) after every retryable connect failure
//!           - BackoffState::reset() when a fresh attempt sequence begins
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=10s, factor=2.0, max=1h, jitter=None.
//! - `JitterPolicy::None` by default; jitter never goes below `first`.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
