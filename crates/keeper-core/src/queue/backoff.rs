//! Backoff policy: decides how long to wait before redelivering a batch that
//! keeps failing.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::millis;

/// Exponential backoff parameters.
///
/// No elapsed-time cap: an entry keeps being retried
/// until it succeeds or the reader stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay returned by the first call to `Backoff::next_delay`.
    #[serde(rename = "initial_interval_ms", with = "millis")]
    pub initial_interval: Duration,

    /// Ceiling for the (unrandomised) interval.
    #[serde(rename = "max_interval_ms", with = "millis")]
    pub max_interval: Duration,

    /// Growth factor applied after every delay.
    pub multiplier: f64,

    /// Jitter in `[0, 1)`. `0.0` gives a deterministic, non-decreasing series.
    pub randomization_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_secs(1),
            multiplier: 1.1,
            randomization_factor: 0.0,
        }
    }
}

impl BackoffPolicy {
    /// Fresh backoff state following this policy.
    pub fn start(&self) -> Backoff {
        Backoff {
            current: self.initial_interval.min(self.max_interval),
            policy: self.clone(),
        }
    }
}

/// Backoff state owned by a single resend entry.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    /// Next delay to wait. Advances the state.
    ///
    /// Example with the default policy: 1ms, 1.1ms, 1.21ms, ... capped at 1s.
    pub fn next_delay(&mut self) -> Duration {
        let interval = self.current;
        // Policies built in code never went through `validate`: a multiplier
        // below 1 (or NaN) means no growth.
        let multiplier = if self.policy.multiplier >= 1.0 {
            self.policy.multiplier
        } else {
            1.0
        };
        let grown = interval.as_secs_f64() * multiplier;
        self.current = if grown < self.policy.max_interval.as_secs_f64() {
            Duration::from_secs_f64(grown)
        } else {
            self.policy.max_interval
        };
        randomize(interval, self.policy.randomization_factor)
    }

    /// Interval the next call to `next_delay` is based on.
    pub fn current_interval(&self) -> Duration {
        self.current
    }
}

fn randomize(interval: Duration, factor: f64) -> Duration {
    if factor.is_nan() || factor <= 0.0 || interval.is_zero() {
        return interval;
    }
    let factor = factor.min(1.0);
    let secs = interval.as_secs_f64();
    let delta = secs * factor;
    let picked = rand::thread_rng().gen_range((secs - delta)..=(secs + delta));
    Duration::from_secs_f64(picked.max(0.0))
}
