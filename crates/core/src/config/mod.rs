//! Serializable retry policy settings
//!
//! Settings are plain serde structs so they can live in TOML or JSON files
//! and environment variables (see [`loader`]). They validate before turning
//! into a [`RetryDelay`] or [`RetryPolicy`].
//!
//! ```toml
//! name = "inventory-sync"
//! max_retries = 5
//!
//! [delay]
//! kind = "exponential"
//! base_ms = 200
//! max_delay_ms = 10000
//! jitter = true
//! ```

pub mod loader;

use std::time::Duration;

use holdfast_common::error::CommonError;
use holdfast_common::{duration_millis, duration_millis_opt};
use serde::{Deserialize, Serialize};

use crate::delay::{DelayKind, RetryDelay};
use crate::error::{ConfigResult, PolicyError};
use crate::policy::retry::{RetryCountInfo, RetryPolicy};
use crate::policy::Policy;

pub use loader::{
    from_json_str, from_toml_str, load, load_from_env, load_from_file, probe_config_paths,
};

/// Delay section of [`PolicySettings`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelaySettings {
    pub kind: DelayKind,

    #[serde(rename = "base_ms", with = "duration_millis")]
    pub base: Duration,

    #[serde(rename = "max_delay_ms", default, with = "duration_millis_opt", skip_serializing_if = "Option::is_none")]
    pub max_delay: Option<Duration>,

    #[serde(default)]
    pub jitter: bool,

    /// Growth factor for exponential delays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,

    /// Slope for linear delays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope_factor: Option<f64>,

    /// Explicit delays for time-series delays, in milliseconds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series_ms: Vec<u64>,
}

impl DelaySettings {
    pub fn new(kind: DelayKind, base: Duration) -> Self {
        Self { kind, base, max_delay: None, jitter: false, factor: None, slope_factor: None, series_ms: Vec::new() }
    }

    /// Check parameter ranges
    ///
    /// # Errors
    /// Returns [`PolicyError::InvalidDelay`] for non-positive or non-finite
    /// factors and for a base above the maximum.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(factor) = self.factor {
            if !(factor.is_finite() && factor > 0.0) {
                return Err(PolicyError::InvalidDelay(format!("factor must be positive, got {factor}")));
            }
        }
        if let Some(slope) = self.slope_factor {
            if !(slope.is_finite() && slope > 0.0) {
                return Err(PolicyError::InvalidDelay(format!("slope_factor must be positive, got {slope}")));
            }
        }
        if let Some(max) = self.max_delay {
            if self.base > max {
                return Err(PolicyError::InvalidDelay(format!(
                    "base_ms ({}) exceeds max_delay_ms ({})",
                    self.base.as_millis(),
                    max.as_millis()
                )));
            }
        }
        Ok(())
    }

    /// Validate and build the delay
    pub fn build(&self) -> ConfigResult<RetryDelay> {
        self.validate()?;

        let mut delay = match self.kind {
            DelayKind::TimeSeries => RetryDelay::time_series(
                self.series_ms.iter().copied().map(Duration::from_millis),
                self.base,
            ),
            kind => RetryDelay::of_kind(kind, self.base),
        };
        if let Some(factor) = self.factor {
            delay = delay.with_factor(factor);
        }
        if let Some(slope) = self.slope_factor {
            delay = delay.with_slope_factor(slope);
        }
        if let Some(max) = self.max_delay {
            delay = delay.with_max_delay(max);
        }
        Ok(delay.with_jitter(self.jitter))
    }
}

/// Settings for a retry policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Retries after the first attempt; absent means retry forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub start_try: u32,

    #[serde(default)]
    pub fail_on_saver_error: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<DelaySettings>,
}

impl PolicySettings {
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(CommonError::validation("name", "must not be blank").into());
            }
        }
        if let Some(delay) = &self.delay {
            delay.validate()?;
        }
        Ok(())
    }

    pub fn retry_count_info(&self) -> RetryCountInfo {
        let info = match self.max_retries {
            Some(retries) => RetryCountInfo::limited(retries),
            None => RetryCountInfo::infinite(),
        };
        info.with_start_try(self.start_try)
    }

    /// Validate and build a retry policy
    pub fn build_retry_policy(&self) -> ConfigResult<RetryPolicy> {
        self.validate()?;

        let mut policy = RetryPolicy::with_count_info(self.retry_count_info())
            .fail_on_saver_error(self.fail_on_saver_error);
        if let Some(name) = &self.name {
            policy = policy.with_name(name.as_str());
        }
        if let Some(delay) = &self.delay {
            policy = policy.with_wait(delay.build()?);
        }
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates delay settings build the configured shape.
    ///
    /// Assertions:
    /// - Confirms factor and max are applied to an exponential delay.
    /// - Confirms time-series settings use the millisecond series.
    #[test]
    fn test_delay_settings_build() {
        let mut settings = DelaySettings::new(DelayKind::Exponential, Duration::from_millis(100));
        settings.factor = Some(3.0);
        settings.max_delay = Some(Duration::from_millis(500));
        let delay = settings.build().expect("valid settings");
        assert_eq!(delay.delay(1), Duration::from_millis(300));
        assert_eq!(delay.delay(4), Duration::from_millis(500));

        let mut series = DelaySettings::new(DelayKind::TimeSeries, Duration::from_millis(50));
        series.series_ms = vec![10, 20];
        let delay = series.build().expect("valid settings");
        assert_eq!(delay.delay(5), Duration::from_millis(20));
    }

    /// Validates range checks on delay settings.
    ///
    /// Assertions:
    /// - Confirms a zero factor is rejected.
    /// - Confirms a base above max is rejected.
    #[test]
    fn test_delay_settings_validation() {
        let mut settings = DelaySettings::new(DelayKind::Exponential, Duration::from_millis(100));
        settings.factor = Some(0.0);
        assert!(matches!(settings.validate(), Err(PolicyError::InvalidDelay(_))));

        let mut settings = DelaySettings::new(DelayKind::Constant, Duration::from_secs(5));
        settings.max_delay = Some(Duration::from_secs(1));
        holdfast_common::assert_error_contains!(settings.validate(), "exceeds max_delay_ms");
    }

    #[test]
    fn test_retry_count_from_settings() {
        let settings = PolicySettings { max_retries: Some(3), start_try: 1, ..PolicySettings::default() };
        let info = settings.retry_count_info();
        assert_eq!(info.retry_count(), 3);
        assert_eq!(info.start_try(), 1);

        assert!(PolicySettings::default().retry_count_info().is_infinite());
    }

    /// Tests that a built policy carries the configured name
    #[test]
    fn test_build_retry_policy_named() {
        let settings = PolicySettings { name: Some("orders".into()), max_retries: Some(1), ..PolicySettings::default() };
        let policy = settings.build_retry_policy().expect("valid settings");
        assert_eq!(policy.name(), "orders");

        let blank = PolicySettings { name: Some("  ".into()), ..PolicySettings::default() };
        assert!(blank.build_retry_policy().is_err());
    }
}
