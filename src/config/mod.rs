//! Application configuration loading, validation, and management.
//!
//! This module provides the top-level `Config` structure that aggregates
//! logging, sampling settings and the three plugin groups (sensors, outputs,
//! notifications). It handles loading from a TOML file and validation.
//!
//! The configuration is loaded once early in the application lifecycle and
//! is immutable thereafter.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use self::{logger::LoggerConfig, plugins::PluginSection, settings::MainConfig};

pub mod logger;
pub mod plugins;
pub mod settings;

/// Simple macros for printing timestamped messages on the operator console.
/// They are used before the tracing subscriber is initialized and for
/// operator-facing output that must appear regardless of log settings.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::console_timestamp()).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::console_timestamp()).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::console_timestamp()).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

const CONSOLE_TIMESTAMP: &[time::format_description::FormatItem<'static>] =
    time::macros::format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
    );

/// Current UTC time formatted for console lines.
#[doc(hidden)]
pub fn console_timestamp() -> String {
    time::OffsetDateTime::now_utc()
        .format(CONSOLE_TIMESTAMP)
        .unwrap_or_default()
}

/// Errors that can occur during configuration loading, parsing or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Unable to access config file: {0}")]
    NotFound(String),

    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
#[validate(schema(function = "validate_plugin_groups"))]
pub struct Config {
    #[validate(nested)]
    pub logger: LoggerConfig,

    #[validate(nested)]
    pub main: MainConfig,

    #[validate(nested)]
    pub sensors: Vec<PluginSection>,

    #[validate(nested)]
    pub outputs: Vec<PluginSection>,

    #[validate(nested)]
    pub notifications: Vec<PluginSection>,

    /// Keys shared by all notification plugins (their declared common fields).
    pub notification_common: toml::Table,

    /// File this configuration was read from.
    #[serde(skip)]
    pub source: PathBuf,
}

fn validate_plugin_groups(config: &Config) -> Result<(), ValidationError> {
    plugins::validate_unique_names(&config.sensors)?;
    plugins::validate_unique_names(&config.outputs)?;
    plugins::validate_unique_names(&config.notifications)
}

impl Config {
    /// Constructs a new configuration by locating and loading the config file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration file cannot be found,
    /// read, parsed, or validated.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Self::load(&config_path)
    }

    /// Determines the configuration file path.
    ///
    /// Priority:
    /// 1. `BREEZEBEE_CONFIG` environment variable
    /// 2. `/etc/breezebee/config.toml`
    fn get_config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(config_path) = std::env::var("BREEZEBEE_CONFIG") {
            let path = PathBuf::from(config_path);
            print_info!("Using config from BREEZEBEE_CONFIG: {}", path.display());
            return Ok(path);
        }

        let fallback = Path::new("/etc/breezebee/config.toml");
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Ok(fallback.to_path_buf());
        }

        Err(ConfigError::NotFound(fallback.display().to_string()))
    }

    /// Loads and validates configuration from the specified path.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        if !path.is_file() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let config_str = fs::read_to_string(path)?;
        let mut config = Self::parse(&config_str)?;
        config.source = path.to_path_buf();

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn parse(text: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::config::settings::IndicatorPolicy;

    const SAMPLE: &str = r#"
        [main]
        sample_interval = 10.0
        operator = "Station 4"
        red_pin = 7
        green_pin = 8
        success_led = "first"
        fail_led = "constant"

        [[sensors]]
        name = "Temperature"
        filename = "thermal_zone"
        zone = 0

        [[outputs]]
        name = "Print"
        filename = "print"

        [[notifications]]
        name = "Log"
        filename = "log"

        [notification_common]
        station = "roof"
    "#;

    #[test]
    fn parses_full_document() {
        let cfg = Config::parse(SAMPLE).unwrap();
        assert_eq!(cfg.main.operator, "Station 4");
        assert_eq!(cfg.main.fail_led, IndicatorPolicy::Constant);
        assert_eq!(cfg.sensors.len(), 1);
        assert_eq!(cfg.outputs[0].name, "Print");
        assert_eq!(
            cfg.notifications[0].get_str("filename").as_deref(),
            Some("log")
        );
        assert_eq!(
            cfg.notification_common.get("station").and_then(|v| v.as_str()),
            Some("roof")
        );
    }

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = Config::parse("").unwrap();
        assert!(cfg.sensors.is_empty());
        assert_eq!(cfg.main.sample_interval, 5.0);
    }

    #[test]
    fn duplicate_section_names_fail_validation() {
        let text = r#"
            [[outputs]]
            name = "Print"
            filename = "print"

            [[outputs]]
            name = "Print"
            filename = "csv"
        "#;
        assert!(matches!(
            Config::parse(text),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            Config::parse("[main\nsample_interval = "),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn load_records_source_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.source, file.path());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Config::load(Path::new("/nonexistent/breezebee.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
        assert!(err.to_string().contains("Unable to access config file"));
    }
}
