use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString, VariantNames};

use crate::{ErrorKind, Result};

/// Default number of admissions granted without waiting
pub const DEFAULT_BURST_CAPACITY: usize = 100;

/// Default interval between admissions once the burst is used up
pub const DEFAULT_BURST_INTERVAL: Duration = Duration::from_millis(100);

/// Default maximum number of lookups in flight
pub const DEFAULT_MAX_CONCURRENCY: usize = 50;

/// Sizing of the two admission gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionConfig {
    /// Number of admissions which are granted immediately
    #[serde(default = "default_burst_capacity")]
    pub burst_capacity: usize,

    /// Sustained interval between admissions once the burst is exhausted
    #[serde(default = "default_burst_interval", with = "humantime_serde")]
    pub burst_interval: Duration,

    /// Maximum number of lookups in flight at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            burst_capacity: default_burst_capacity(),
            burst_interval: default_burst_interval(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

const fn default_burst_capacity() -> usize {
    DEFAULT_BURST_CAPACITY
}

const fn default_burst_interval() -> Duration {
    DEFAULT_BURST_INTERVAL
}

const fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl AdmissionConfig {
    /// Sustained admission rate in admissions per second
    #[must_use]
    pub fn sustained_rate(&self) -> f64 {
        1.0 / self.burst_interval.as_secs_f64()
    }

    /// Check that none of the gates is sized to zero.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidAdmission`] naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.burst_capacity == 0 {
            return Err(ErrorKind::InvalidAdmission("burst capacity must not be zero"));
        }
        if u32::try_from(self.burst_capacity).is_err() {
            return Err(ErrorKind::InvalidAdmission("burst capacity is too large"));
        }
        if self.burst_interval.is_zero() {
            return Err(ErrorKind::InvalidAdmission("burst interval must not be zero"));
        }
        if self.max_concurrency == 0 {
            return Err(ErrorKind::InvalidAdmission(
                "maximum concurrency must not be zero",
            ));
        }
        Ok(())
    }
}

/// How lookups are admitted
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Burst pool and concurrency cap both apply
    #[default]
    Bucket,
    /// Lookups start as soon as they are enumerated, without any gate
    Concurrent,
    /// One lookup at a time, no burst pool
    Serial,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_default_admission_config() {
        let config = AdmissionConfig::default();
        assert_eq!(config.burst_capacity, 100);
        assert_eq!(config.burst_interval, Duration::from_millis(100));
        assert_eq!(config.max_concurrency, 50);
        assert!((config.sustained_rate() - 10.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_sized_gates_are_rejected() {
        let mut config = AdmissionConfig::default();
        config.burst_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AdmissionConfig::default();
        config.burst_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = AdmissionConfig::default();
        config.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserialization() {
        let config: AdmissionConfig = toml::from_str(
            r#"
            burst_capacity = 20
            burst_interval = "250ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.burst_capacity, 20);
        assert_eq!(config.burst_interval, Duration::from_millis(250));
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
    }

    #[test]
    fn test_run_mode_parsing() {
        assert_eq!(RunMode::from_str("bucket").unwrap(), RunMode::Bucket);
        assert_eq!(RunMode::from_str("Serial").unwrap(), RunMode::Serial);
        assert_eq!(RunMode::Concurrent.to_string(), "concurrent");
        assert!(RunMode::from_str("async-bucket").is_err());
    }
}
