//! Built-in notification plugins.
//!
//! Both notifiers read the common `station` field from the shared
//! `[notification_common]` table so every alert names where it came from.

use super::types::AlertKey;

pub mod log;
pub mod webhook;

/// Default human-readable text of an alert key.
pub(crate) fn default_message(key: AlertKey) -> &'static str {
    match key {
        AlertKey::Sensor => "Failed to obtain data from all sensors.",
        AlertKey::Output => "Failed to output in all requested formats.",
    }
}

/// Prefixes `message` with the station name when one is configured.
pub(crate) fn with_station(station: Option<&str>, message: &str) -> String {
    match station {
        Some(station) => format!("[{}] {}", station, message),
        None => message.to_string(),
    }
}
