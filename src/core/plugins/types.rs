use std::{collections::BTreeMap, fmt, str::FromStr};

use super::error::PluginError;

/// Result alias used by every plugin operation.
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// The capability family a plugin implementation belongs to.
///
/// Every registered implementation lives in exactly one family, which plays
/// the role of its namespace: a sensor called `print` and an output called
/// `print` are unrelated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PluginKind {
    Sensor,
    Output,
    Notification,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Sensor => "sensor",
            PluginKind::Output => "output",
            PluginKind::Notification => "notification",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a plugin should do its work inline or hand it to a background
/// task. The engine only forwards this flag; plugins decide what it means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    #[default]
    Sync,
    Async,
}

/// The two alert classes a cycle can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKey {
    /// At least one sensor failed to produce a usable value.
    Sensor,
    /// At least one output failed or raised.
    Output,
}

impl AlertKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKey::Sensor => "alertsensor",
            AlertKey::Output => "alertoutput",
        }
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration values resolved for one plugin instance.
///
/// Holds every declared required field plus the declared optional and
/// common fields that were present, all as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginFields {
    plugin: String,
    values: BTreeMap<String, String>,
}

impl PluginFields {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insertion.
    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<String>) {
        self.values.insert(field.to_string(), value.into());
    }

    /// Name of the configuration section these fields came from.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, field: &str, default: &'a str) -> &'a str {
        self.get(field).unwrap_or(default)
    }

    /// A field the plugin declared as required.
    ///
    /// The loader guarantees presence, so a miss here means the plugin reads
    /// a field it forgot to declare.
    pub fn required(&self, field: &str) -> PluginResult<&str> {
        self.get(field).ok_or_else(|| PluginError::InvalidField {
            plugin: self.plugin.clone(),
            field: field.to_string(),
            value: String::new(),
            reason: "field is not declared as required".to_string(),
        })
    }

    /// Parses an optional field, `None` when absent.
    pub fn parse<T>(&self, field: &str) -> PluginResult<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(field) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| PluginError::InvalidField {
                    plugin: self.plugin.clone(),
                    field: field.to_string(),
                    value: raw.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Everything the loader learned about one enabled plugin section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub kind: PluginKind,
    /// Configuration section name.
    pub name: String,
    /// Registered implementation id (`filename` key).
    pub implementation: String,
    pub enabled: bool,
    pub required_fields: Vec<String>,
    pub optional_fields: Vec<String>,
    pub common_fields: Vec<String>,
    pub needs_internet: bool,
    pub dispatch_mode: DispatchMode,
    /// Outputs only: print the output's metadata before sampling starts.
    pub metadata_required: bool,
}

/// A constructed plugin bound to its descriptor and resolved fields.
pub struct PluginInstance<T> {
    pub descriptor: PluginDescriptor,
    pub fields: PluginFields,
    pub plugin: T,
}

impl<T> PluginInstance<T> {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

impl<T> fmt::Debug for PluginInstance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("descriptor", &self.descriptor)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
