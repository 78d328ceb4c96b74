//! Preserver configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! {
//!   "backoff": { "initial_interval_ms": 1, "max_interval_ms": 1000, "multiplier": 1.1 },
//!   "backoff_after_attempts": 2,
//!   "drain_poll_interval_ms": 10
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::BackoffPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreserverConfig {
    /// Pacing of redeliveries once `backoff_after_attempts` is exceeded.
    pub backoff: BackoffPolicy,

    /// Redeliveries of an entry that happen without any delay.
    pub backoff_after_attempts: u32,

    /// How often a draining read checks whether all batches were acknowledged.
    #[serde(rename = "drain_poll_interval_ms", with = "millis")]
    pub drain_poll_interval: Duration,
}

impl Default for PreserverConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            backoff_after_attempts: 2,
            drain_poll_interval: Duration::from_millis(10),
        }
    }
}

impl PreserverConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Reject values the backoff arithmetic cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.backoff;
        if !b.multiplier.is_finite() || b.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff.multiplier must be >= 1.0, got {}",
                b.multiplier
            )));
        }
        if !(0.0..1.0).contains(&b.randomization_factor) {
            return Err(ConfigError::Invalid(format!(
                "backoff.randomization_factor must be in [0, 1), got {}",
                b.randomization_factor
            )));
        }
        if b.max_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "backoff.max_interval_ms must be > 0".to_string(),
            ));
        }
        if self.drain_poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "drain_poll_interval_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serde helper: `Duration` as integer milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_object_gives_defaults() {
        let config = PreserverConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PreserverConfig::default());
        assert_eq!(config.drain_poll_interval, Duration::from_millis(10));
        assert_eq!(config.backoff_after_attempts, 2);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = PreserverConfig::from_json_str(
            r#"{ "backoff": { "max_interval_ms": 250 }, "drain_poll_interval_ms": 5 }"#,
        )
        .unwrap();

        assert_eq!(config.backoff.max_interval, Duration::from_millis(250));
        assert_eq!(config.backoff.initial_interval, Duration::from_millis(1));
        assert_eq!(config.drain_poll_interval, Duration::from_millis(5));
    }

    #[test]
    fn serializes_durations_as_millis() {
        let v = serde_json::to_value(PreserverConfig::default()).unwrap();
        assert_eq!(v["drain_poll_interval_ms"], 10);
        assert_eq!(v["backoff"]["max_interval_ms"], 1000);
    }

    #[rstest]
    #[case::shrinking_multiplier(r#"{ "backoff": { "multiplier": 0.5 } }"#)]
    #[case::full_jitter(r#"{ "backoff": { "randomization_factor": 1.0 } }"#)]
    #[case::zero_ceiling(r#"{ "backoff": { "max_interval_ms": 0 } }"#)]
    #[case::zero_poll(r#"{ "drain_poll_interval_ms": 0 }"#)]
    fn invalid_values_are_rejected(#[case] raw: &str) {
        let err = PreserverConfig::from_json_str(raw).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = PreserverConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = PreserverConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
