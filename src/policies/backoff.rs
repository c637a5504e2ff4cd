//! # Backoff policy for connection retries.
//!
//! [`BackoffPolicy`] controls how the wait between connection attempts grows
//! while a link outage lasts. It is parameterized by:
//! - [`BackoffPolicy::first`] the initial delay (also the floor of every delay);
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the ceiling.
//!
//! The delay for retry `n` is computed as `first × factor^n`, clamped to `max`,
//! then jitter is applied and the result is raised back to the floor. Because the
//! base delay is derived purely from the retry number, jitter output never feeds
//! back into subsequent calculations.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use cloudlink::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_secs(10),
//!     max: Duration::from_secs(60),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay(0), Duration::from_secs(10));
//! assert_eq!(backoff.delay(1), Duration::from_secs(20));
//! assert_eq!(backoff.delay(10), Duration::from_secs(60));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
///
/// A pure function from retry count to wait duration: `delay(0) == first`,
/// non-decreasing in the retry count up to `max` when `factor >= 1.0` and no
/// jitter is configured.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry; no computed delay is ever shorter.
    pub first: Duration,
    /// Ceiling for retry delays.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` keeps delays non-decreasing).
    pub factor: f64,
    /// Jitter policy to spread reconnects across a fleet.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a policy with:
    /// - `first = 10s`;
    /// - `factor = 2.0` (exponential);
    /// - `max = 1h`.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(10),
            max: Duration::from_secs(3600),
            jitter: JitterPolicy::None,
            factor: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Returns the floor all delays respect: `first`, unless `max` is lower.
    #[inline]
    pub fn floor(&self) -> Duration {
        self.first.min(self.max)
    }

    /// Computes the wait before the retry following failure number `attempt` (0-indexed).
    ///
    /// The base delay is `first × factor^attempt`, clamped to [`BackoffPolicy::max`].
    /// Jitter is applied to the clamped base and the result is raised to
    /// [`BackoffPolicy::floor`], so the first retry always waits at least `first`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        let base = if secs.is_finite() && (0.0..=self.max.as_secs_f64()).contains(&secs) {
            Duration::from_secs_f64(secs)
        } else {
            self.max
        };

        let jittered = match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter.apply_decorrelated(self.floor(), base, self.max)
            }
            other => other.apply(base),
        };
        jittered.max(self.floor())
    }
}
