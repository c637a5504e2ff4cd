//! # Runtime configuration.
//!
//! Provides [`Config`], the settings of the connectivity runtime, loadable from
//! the environment with [`Config::from_env`].
//!
//! ## Environment
//! | Variable                             | Field                | Default |
//! |--------------------------------------|----------------------|---------|
//! | `CLOUDLINK_BACKOFF_INITIAL_SECONDS`  | `backoff.first`      | 10      |
//! | `CLOUDLINK_BACKOFF_MAX_SECONDS`      | `backoff.max`        | 3600    |
//! | `CLOUDLINK_BACKOFF_FACTOR`           | `backoff.factor`     | 2.0     |
//! | `CLOUDLINK_BACKOFF_JITTER`           | `backoff.jitter`     | none    |
//! | `CLOUDLINK_WATCHDOG_TIMEOUT_SECONDS` | `liveness_budget`    | 60      |
//! | `CLOUDLINK_WATCHDOG_FEED_SECONDS`    | `feed_interval`      | 0       |
//! | `CLOUDLINK_FAULT_GRACE_SECONDS`      | `grace`              | 10      |
//! | `CLOUDLINK_BUS_CAPACITY`             | `bus_capacity`       | 32      |
//!
//! ## Sentinel values
//! - `feed_interval = 0s` → half the liveness budget

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::policies::{BackoffPolicy, JitterPolicy};
use crate::sizing::max_of;

/// Link transitions are rare; a handful covers a flapping link during one backoff sleep.
const NETWORK_BACKLOG: usize = 8;
/// Telemetry produced while a connect call is outstanding.
const PAYLOAD_BACKLOG: usize = 32;
/// Status and error traffic for slow observers.
const STATUS_BACKLOG: usize = 16;

/// Per-receiver backlog shared by all bus channels.
pub const DEFAULT_BUS_CAPACITY: usize = max_of([NETWORK_BACKLOG, PAYLOAD_BACKLOG, STATUS_BACKLOG]);

/// Settings of the connectivity runtime.
///
/// ## Notes
/// All fields are public. Prefer the accessors over checking sentinels inline.
#[derive(Clone, Debug)]
pub struct Config {
    /// Pacing of connection retries within one attempt sequence.
    pub backoff: BackoffPolicy,

    /// Maximum silent interval registered with the watchdog.
    pub liveness_budget: Duration,

    /// How often the machine feeds the watchdog.
    ///
    /// - `Duration::ZERO` = half of `liveness_budget`
    /// - otherwise must be strictly shorter than `liveness_budget`
    pub feed_interval: Duration,

    /// Hold time of the fault escalation sequence before the process restart.
    pub grace: Duration,

    /// Per-receiver backlog of every bus channel (min 1).
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the feed interval with the sentinel resolved.
    #[inline]
    pub fn effective_feed_interval(&self) -> Duration {
        if self.feed_interval.is_zero() {
            self.liveness_budget / 2
        } else {
            self.feed_interval
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Checks the invariants the runtime relies on.
    ///
    /// - the liveness budget is non-zero;
    /// - the effective feed interval is non-zero and strictly shorter than the budget;
    /// - backoff delays never shrink (`max >= first`, `factor >= 1.0`).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.liveness_budget.is_zero() {
            return Err(ConfigError::ZeroBudget);
        }
        let interval = self.effective_feed_interval();
        if interval.is_zero() || interval >= self.liveness_budget {
            return Err(ConfigError::FeedTooSlow {
                interval,
                budget: self.liveness_budget,
            });
        }
        let b = &self.backoff;
        if b.max < b.first || !(b.factor >= 1.0) {
            return Err(ConfigError::ShrinkingBackoff {
                first: b.first,
                max: b.max,
                factor: b.factor,
            });
        }
        Ok(())
    }

    /// Loads the configuration from `CLOUDLINK_*` environment variables.
    ///
    /// Unset variables keep their default. The result is validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Self::default();
        let secs = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            parse::<u64>(&lookup, name)
                .map(|v| v.map(Duration::from_secs).unwrap_or(default))
        };

        let jitter = match lookup("CLOUDLINK_BACKOFF_JITTER") {
            None => d.backoff.jitter,
            Some(raw) => JitterPolicy::from_name(&raw).ok_or_else(|| ConfigError::Invalid {
                var: "CLOUDLINK_BACKOFF_JITTER",
                reason: "expected none, full, equal or decorrelated".to_string(),
                value: raw,
            })?,
        };

        let cfg = Self {
            backoff: BackoffPolicy {
                first: secs("CLOUDLINK_BACKOFF_INITIAL_SECONDS", d.backoff.first)?,
                max: secs("CLOUDLINK_BACKOFF_MAX_SECONDS", d.backoff.max)?,
                factor: parse::<f64>(&lookup, "CLOUDLINK_BACKOFF_FACTOR")?
                    .unwrap_or(d.backoff.factor),
                jitter,
            },
            liveness_budget: secs("CLOUDLINK_WATCHDOG_TIMEOUT_SECONDS", d.liveness_budget)?,
            feed_interval: secs("CLOUDLINK_WATCHDOG_FEED_SECONDS", d.feed_interval)?,
            grace: secs("CLOUDLINK_FAULT_GRACE_SECONDS", d.grace)?,
            bus_capacity: parse::<usize>(&lookup, "CLOUDLINK_BUS_CAPACITY")?
                .unwrap_or(d.bus_capacity),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value: raw,
            }),
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `backoff = BackoffPolicy::default()` (10s doubling up to 1h)
    /// - `liveness_budget = 60s`, `feed_interval = 0s` (every 30s)
    /// - `grace = 10s`
    /// - `bus_capacity = 32`
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            liveness_budget: Duration::from_secs(60),
            feed_interval: Duration::ZERO,
            grace: Duration::from_secs(10),
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}
