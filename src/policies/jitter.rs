//! # Jitter for reconnect delays.
//!
//! A fleet of devices behind the same cell tower or access point tends to lose
//! and regain the link together. [`JitterPolicy`] spreads their reconnect
//! attempts so the cloud endpoint does not see a synchronized burst.
//!
//! - [`JitterPolicy::None`] exact delays (deterministic, default)
//! - [`JitterPolicy::Full`] random delay in `[0, delay]`
//! - [`JitterPolicy::Equal`] `delay/2 + random[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`] random delay in `[floor, 3 × delay]`, capped
//!
//! [`BackoffPolicy`](crate::BackoffPolicy) raises every jittered value back to its
//! floor, so no variant can shorten the first retry below the initial delay.

use rand::Rng;
use std::time::Duration;

/// Randomization applied to a computed backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact backoff delay.
    #[default]
    None,
    /// Random delay in `[0, delay]`.
    Full,
    /// `delay/2 + random[0, delay/2]`.
    Equal,
    /// Random delay in `[floor, min(3 × delay, max)]`.
    ///
    /// Needs the floor and ceiling, see [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Parses a policy name as used in configuration (`none`, `full`, `equal`, `decorrelated`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(JitterPolicy::None),
            "full" => Some(JitterPolicy::Full),
            "equal" => Some(JitterPolicy::Equal),
            "decorrelated" => Some(JitterPolicy::Decorrelated),
            _ => None,
        }
    }

    /// Applies jitter to the given delay.
    ///
    /// `Decorrelated` returns the input unchanged here; it needs the extra
    /// context taken by [`apply_decorrelated`](Self::apply_decorrelated).
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => full_jitter(delay),
            JitterPolicy::Equal => equal_jitter(delay),
            JitterPolicy::Decorrelated => delay,
        }
    }

    /// Applies decorrelated jitter between `floor` and `min(3 × delay, max)`.
    ///
    /// Falls back to [`apply`](Self::apply) for every other variant.
    pub fn apply_decorrelated(&self, floor: Duration, delay: Duration, max: Duration) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(delay);
        }

        let floor_ms = floor.as_millis() as u64;
        let upper_ms = (delay.as_millis() as u64)
            .saturating_mul(3)
            .min(max.as_millis() as u64)
            .max(floor_ms);

        if floor_ms >= upper_ms {
            return floor;
        }
        Duration::from_millis(rand::rng().random_range(floor_ms..=upper_ms))
    }
}

fn full_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ms))
}

fn equal_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    let half = ms / 2;
    if half == 0 {
        return delay;
    }
    Duration::from_millis(half + rand::rng().random_range(0..=half))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(1234);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn full_stays_below_delay() {
        let d = Duration::from_secs(4);
        for _ in 0..100 {
            assert!(JitterPolicy::Full.apply(d) <= d);
        }
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn decorrelated_collapses_to_floor_when_range_is_empty() {
        let floor = Duration::from_secs(10);
        let out = JitterPolicy::Decorrelated.apply_decorrelated(
            floor,
            Duration::from_secs(1),
            Duration::from_secs(2),
        );
        assert_eq!(out, floor);
    }

    #[test]
    fn parses_config_names() {
        assert_eq!(JitterPolicy::from_name("Equal"), Some(JitterPolicy::Equal));
        assert_eq!(JitterPolicy::from_name(" none "), Some(JitterPolicy::None));
        assert_eq!(JitterPolicy::from_name("random"), None);
    }
}
