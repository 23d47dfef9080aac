use super::types::{AlertKey, DispatchMode, PluginFields, PluginKind, PluginResult};
use crate::core::reading::{Reading, SensorMetadata, SensorValue};

/// Lifecycle contract shared by every plugin, whatever it can do.
///
/// A type implementing only this trait is a *support plugin*: it is
/// constructed for its side effects but never polled by the engine.
pub trait Plugin: Send + Sync + 'static {
    /// Called once, right after construction, with the section's `async` flag.
    fn set_dispatch_mode(&mut self, _mode: DispatchMode) {}
}

/// A plugin that can be read once per cycle.
#[async_trait::async_trait]
pub trait Sensor: Plugin {
    fn metadata(&self) -> &SensorMetadata;

    /// Reads the current value. Errors are treated like a missing value.
    async fn read(&self) -> PluginResult<SensorValue>;

    /// Releases background resources. Called once during shutdown.
    async fn stop(&self) {}
}

/// A plugin that receives the full reading record of every cycle.
#[async_trait::async_trait]
pub trait Output: Plugin {
    /// Delivers the record. `Ok(false)` is a soft failure; `Err` aborts the
    /// remaining outputs for this cycle.
    async fn send(&self, readings: &[Reading]) -> PluginResult<bool>;

    /// Text shown to the operator before sampling starts, when the section
    /// sets `metadatareqd`.
    fn describe_metadata(&self) -> Option<String> {
        None
    }
}

/// A plugin that relays alert keys to a person or system.
#[async_trait::async_trait]
pub trait Notifier: Plugin {
    async fn send_alert(&self, key: AlertKey) -> PluginResult<bool>;
}

/// A freshly built plugin, tagged by the entry points it exposes.
pub enum Constructed {
    Sensor(Box<dyn Sensor>),
    Output(Box<dyn Output>),
    Notifier(Box<dyn Notifier>),
    Support(Box<dyn Plugin>),
}

impl Constructed {
    pub fn set_dispatch_mode(&mut self, mode: DispatchMode) {
        match self {
            Constructed::Sensor(p) => p.set_dispatch_mode(mode),
            Constructed::Output(p) => p.set_dispatch_mode(mode),
            Constructed::Notifier(p) => p.set_dispatch_mode(mode),
            Constructed::Support(p) => p.set_dispatch_mode(mode),
        }
    }

    pub fn as_sensor(self) -> Result<Box<dyn Sensor>, Constructed> {
        match self {
            Constructed::Sensor(p) => Ok(p),
            other => Err(other),
        }
    }

    pub fn as_output(self) -> Result<Box<dyn Output>, Constructed> {
        match self {
            Constructed::Output(p) => Ok(p),
            other => Err(other),
        }
    }

    pub fn as_notifier(self) -> Result<Box<dyn Notifier>, Constructed> {
        match self {
            Constructed::Notifier(p) => Ok(p),
            other => Err(other),
        }
    }
}

/// Static description and constructor of a plugin implementation.
///
/// Implementations declare their capability family and the configuration
/// fields they read; `register_plugin!` turns this into a registry entry.
pub trait PluginFactory: Sized + 'static {
    const KIND: PluginKind;
    const REQUIRED_FIELDS: &'static [&'static str] = &[];
    const OPTIONAL_FIELDS: &'static [&'static str] = &[];
    /// Fields resolved against the shared `[notification_common]` table.
    const COMMON_FIELDS: &'static [&'static str] = &[];

    fn build(fields: &PluginFields) -> PluginResult<Self>;

    fn into_constructed(self) -> Constructed;
}
