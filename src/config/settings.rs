//! Main sampling settings: cadence, operator, indicator pins and policies.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// When an indicator lights up in response to a cycle outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorPolicy {
    /// Never lights.
    Off,
    /// Lights on the first matching cycle only.
    First,
    /// Lights on every matching cycle.
    #[default]
    All,
    /// Lights on every matching cycle and is never switched off by the
    /// hold timer. Only meaningful for the failure indicator.
    Constant,
}

impl std::fmt::Display for IndicatorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IndicatorPolicy::Off => "off",
            IndicatorPolicy::First => "first",
            IndicatorPolicy::All => "all",
            IndicatorPolicy::Constant => "constant",
        };
        f.write_str(s)
    }
}

/// The `[main]` section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_main"))]
pub struct MainConfig {
    /// Seconds between the start of two consecutive cycles.
    pub sample_interval: f64,

    /// Free-form name of whoever runs this station.
    pub operator: String,

    /// GPIO line of the failure indicator. `0` disables it.
    pub red_pin: u32,

    /// GPIO line of the success indicator. `0` disables it.
    pub green_pin: u32,

    /// Echo per-cycle failures to the operator console.
    pub print_errors: bool,

    pub success_led: IndicatorPolicy,

    pub fail_led: IndicatorPolicy,

    /// How long a transient indicator stays lit after a cycle.
    #[validate(range(
        min = 1,
        max = 60000,
        message = "indicator_hold_ms must be within 1..=60000"
    ))]
    pub indicator_hold_ms: u64,

    /// Endpoint requested by the connectivity probe for `needsinternet` plugins.
    #[validate(length(min = 1, message = "connectivity_url must not be empty"))]
    pub connectivity_url: String,

    /// Root of the sysfs GPIO class used to drive indicators.
    pub gpio_root: PathBuf,
}

/// Longest accepted `sample_interval`, in seconds.
pub const MAX_SAMPLE_INTERVAL_SECS: f64 = 86_400.0;

const DEFAULT_SAMPLE_INTERVAL_SECS: f64 = 5.0;

fn validate_main(cfg: &MainConfig) -> Result<(), ValidationError> {
    if !(cfg.sample_interval.is_finite() && cfg.sample_interval > 0.0) {
        let mut err = ValidationError::new("invalid_sample_interval");
        err.message = Some(
            format!(
                "sample_interval must be a positive number of seconds, got {}",
                cfg.sample_interval
            )
            .into(),
        );
        return Err(err);
    }
    if cfg.sample_interval > MAX_SAMPLE_INTERVAL_SECS
        || Duration::try_from_secs_f64(cfg.sample_interval).is_err()
    {
        let mut err = ValidationError::new("invalid_sample_interval");
        err.message = Some(
            format!(
                "sample_interval must not exceed {} seconds, got {}",
                MAX_SAMPLE_INTERVAL_SECS, cfg.sample_interval
            )
            .into(),
        );
        return Err(err);
    }
    if cfg.success_led == IndicatorPolicy::Constant {
        let mut err = ValidationError::new("invalid_success_policy");
        err.message = Some("success_led supports off, first and all".into());
        return Err(err);
    }
    Ok(())
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            sample_interval: DEFAULT_SAMPLE_INTERVAL_SECS,
            operator: String::new(),
            red_pin: 0,
            green_pin: 0,
            print_errors: true,
            success_led: IndicatorPolicy::All,
            fail_led: IndicatorPolicy::All,
            indicator_hold_ms: 1000,
            connectivity_url: "http://www.google.com".to_string(),
            gpio_root: PathBuf::from("/sys/class/gpio"),
        }
    }
}

impl MainConfig {
    /// Sampling period. Falls back to the default for values validation
    /// would reject.
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.sample_interval)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_SAMPLE_INTERVAL_SECS))
    }

    pub fn indicator_hold(&self) -> Duration {
        Duration::from_millis(self.indicator_hold_ms)
    }
}
