//! Logging configuration structures and validation logic.
//!
//! These types describe where breezebee sends its diagnostic log: the
//! console, an append-only log file next to the sampling data, and the
//! systemd journal. Validation rules are enforced with the `validator` crate.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Available formats for console log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Top-level logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggerConfig {
    /// Global log level: trace, debug, info, warn or error (case-insensitive).
    #[validate(custom(function = "validate_log_level"))]
    pub level: String,

    #[validate(nested)]
    pub console: Option<ConsoleConfig>,

    /// Plain-text log file, appended to across restarts.
    #[validate(nested)]
    pub file: Option<FileConfig>,

    #[validate(nested)]
    pub journald: Option<JournaldConfig>,
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("invalid_log_level");
            err.message = Some(format!("Invalid log level: {}", level).into());
            Err(err)
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            level: "info".to_string(),
            console: Some(ConsoleConfig::default()),
            file: None,
            journald: None,
        }
    }
}

/// Console log output.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: LogFormat,
    /// Include the log target (module path) in output.
    pub show_target: bool,
    pub ansi_colors: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            enabled: true,
            format: LogFormat::default(),
            show_target: false,
            ansi_colors: true,
        }
    }
}

/// Log file output. The file is created if missing and appended to; once it
/// reaches `max_bytes` it is rotated to `<path>.1`, keeping `backups` old
/// files.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,

    #[validate(custom(function = "validate_log_path"))]
    pub path: PathBuf,

    /// Size at which the file is rotated. `0` disables rotation.
    pub max_bytes: u64,

    #[validate(range(max = 100, message = "backups must be at most 100"))]
    pub backups: usize,
}

fn validate_log_path(path: &PathBuf) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        let mut err = ValidationError::new("empty_log_path");
        err.message = Some("Log file path cannot be empty".into());
        return Err(err);
    }
    Ok(())
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            enabled: false,
            path: PathBuf::from("/var/log/breezebee/breezebee.log"),
            max_bytes: 40 * 1024,
            backups: 5,
        }
    }
}

/// Systemd journald output (Linux only).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JournaldConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Identifier used for journal entries. Must be non-empty.
    #[validate(length(min = 1))]
    pub identifier: String,
}

impl Default for JournaldConfig {
    fn default() -> Self {
        JournaldConfig {
            enabled: false,
            identifier: "breezebee".to_string(),
        }
    }
}
