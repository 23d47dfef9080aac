//! Raw plugin sections as they appear in the configuration file.
//!
//! Each `[[sensors]]`, `[[outputs]]` and `[[notifications]]` table is kept
//! as an untyped key/value map: the set of meaningful keys depends on the
//! plugin implementation named by `filename`, and is only known once the
//! registry has resolved it.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Keys interpreted by the loader itself rather than by the plugin.
pub const KEY_FILENAME: &str = "filename";
pub const KEY_ENABLED: &str = "enabled";
pub const KEY_ASYNC: &str = "async";
pub const KEY_NEEDS_INTERNET: &str = "needsinternet";
pub const KEY_METADATA_REQUIRED: &str = "metadatareqd";

/// One plugin definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PluginSection {
    /// Section identifier, unique within its group.
    #[validate(length(min = 1, message = "Plugin section name must not be empty"))]
    pub name: String,

    /// Every other key of the table.
    #[serde(flatten)]
    pub entries: toml::Table,
}

impl PluginSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: toml::Table::new(),
        }
    }

    /// Builder-style insertion, mostly useful in tests.
    pub fn with(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns a scalar entry rendered as a string.
    ///
    /// Strings are returned verbatim, numbers and booleans in their TOML
    /// spelling. Arrays and tables have no string form and yield `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        value_as_string(self.entries.get(key)?)
    }

    /// Returns a boolean entry, accepting the spellings an INI-style
    /// configuration would (`yes`/`no`, `on`/`off`, `1`/`0`, `true`/`false`).
    ///
    /// `None` when the key is absent or its value is not a recognisable
    /// boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.entries.get(key)? {
            toml::Value::Boolean(b) => Some(*b),
            toml::Value::Integer(1) => Some(true),
            toml::Value::Integer(0) => Some(false),
            toml::Value::String(s) => parse_bool(s),
            _ => None,
        }
    }

    /// Boolean entry with a fallback for absent or malformed values.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }
}

pub(crate) fn value_as_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// Rejects groups where two sections share a name.
pub fn validate_unique_names(sections: &[PluginSection]) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();
    for section in sections {
        if !seen.insert(section.name.as_str()) {
            let mut err = ValidationError::new("duplicate_plugin_name");
            err.message =
                Some(format!("duplicate plugin section name: '{}'", section.name).into());
            return Err(err);
        }
    }
    Ok(())
}
