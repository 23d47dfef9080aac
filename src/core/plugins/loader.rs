//! Turns configuration sections into live plugin sets.

use std::path::Path;

use tracing::{debug, error, info};

use super::{
    error::PluginError,
    registry::{PluginMeta, PluginRegistry},
    traits::{Constructed, Notifier, Output, Sensor},
    types::{DispatchMode, PluginDescriptor, PluginFields, PluginInstance, PluginKind, PluginResult},
};
use crate::{
    config::plugins::{
        value_as_string, PluginSection, KEY_ASYNC, KEY_ENABLED, KEY_FILENAME,
        KEY_METADATA_REQUIRED, KEY_NEEDS_INTERNET,
    },
    core::connectivity::ConnectivityProbe,
    print_info,
};

/// Live plugins of one capability, in configuration order.
pub struct PluginSet<T> {
    /// Plugins exposing the capability the set was loaded for.
    pub active: Vec<PluginInstance<T>>,
    /// Constructed plugins without that capability, kept alive for their
    /// side effects.
    pub support: Vec<PluginInstance<Constructed>>,
}

impl<T> PluginSet<T> {
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginInstance<T>> {
        self.active.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.active.iter().map(|p| p.name()).collect()
    }
}

impl<T> std::fmt::Debug for PluginSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSet")
            .field("active", &self.active)
            .field("support", &self.support)
            .finish()
    }
}

impl<T> Default for PluginSet<T> {
    fn default() -> Self {
        Self {
            active: Vec::new(),
            support: Vec::new(),
        }
    }
}

pub type SensorSet = PluginSet<Box<dyn Sensor>>;
pub type OutputSet = PluginSet<Box<dyn Output>>;
pub type NotificationSet = PluginSet<Box<dyn Notifier>>;

/// Output set together with the metadata text requested by `metadatareqd`
/// outputs, to be shown before sampling starts.
pub struct LoadedOutputs {
    pub set: OutputSet,
    pub metadata: Vec<String>,
}

/// Resolves, validates and constructs plugins from configuration sections.
pub struct PluginLoader<'a> {
    registry: &'a PluginRegistry,
    gate: &'a dyn ConnectivityProbe,
    source: &'a Path,
    common: &'a toml::Table,
}

impl<'a> PluginLoader<'a> {
    /// # Arguments
    /// * `registry` - Implementations that sections may name
    /// * `gate` - Probe consulted for `needsinternet` sections
    /// * `source` - Configuration file, quoted in missing-field errors
    /// * `common` - Shared table resolving declared common fields
    pub fn new(
        registry: &'a PluginRegistry,
        gate: &'a dyn ConnectivityProbe,
        source: &'a Path,
        common: &'a toml::Table,
    ) -> Self {
        Self {
            registry,
            gate,
            source,
            common,
        }
    }

    pub async fn load_sensors(&self, sections: &[PluginSection]) -> PluginResult<SensorSet> {
        self.load(PluginKind::Sensor, sections, Constructed::as_sensor)
            .await
    }

    /// Loads the output set. Fails when no output ends up active.
    pub async fn load_outputs(&self, sections: &[PluginSection]) -> PluginResult<LoadedOutputs> {
        let set = self
            .load(PluginKind::Output, sections, Constructed::as_output)
            .await?;

        if set.is_empty() {
            error!("{}", PluginError::NoOutputs);
            return Err(PluginError::NoOutputs);
        }

        let metadata = set
            .iter()
            .filter(|p| p.descriptor.metadata_required)
            .filter_map(|p| p.plugin.describe_metadata())
            .collect();

        Ok(LoadedOutputs { set, metadata })
    }

    pub async fn load_notifications(
        &self,
        sections: &[PluginSection],
    ) -> PluginResult<NotificationSet> {
        self.load(PluginKind::Notification, sections, Constructed::as_notifier)
            .await
    }

    /// Loads every enabled section of one group, in order.
    ///
    /// `select` extracts the capability the set is made of; constructed
    /// plugins it rejects are kept as support plugins. The first load error
    /// aborts the whole group and drops anything built so far.
    pub async fn load<T>(
        &self,
        kind: PluginKind,
        sections: &[PluginSection],
        select: fn(Constructed) -> Result<T, Constructed>,
    ) -> PluginResult<PluginSet<T>> {
        let mut set = PluginSet::default();

        for section in sections {
            match self.load_one(kind, section).await {
                Ok(Some((descriptor, fields, constructed))) => match select(constructed) {
                    Ok(plugin) => {
                        print_info!("Success: Loaded {} plugin {}", kind, section.name);
                        info!("Loaded {} plugin {}", kind, section.name);
                        set.active.push(PluginInstance {
                            descriptor,
                            fields,
                            plugin,
                        });
                    }
                    Err(constructed) => {
                        print_info!("Success: Loaded support plugin {}", section.name);
                        info!("Loaded support plugin {}", section.name);
                        set.support.push(PluginInstance {
                            descriptor,
                            fields,
                            plugin: constructed,
                        });
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    error!("Did not import {} plugin {}: {}", kind, section.name, e);
                    return Err(e);
                }
            }
        }

        Ok(set)
    }

    /// Builds one section. `None` when the section is disabled or gated off.
    async fn load_one(
        &self,
        kind: PluginKind,
        section: &PluginSection,
    ) -> PluginResult<Option<(PluginDescriptor, PluginFields, Constructed)>> {
        let implementation = section
            .get_str(KEY_FILENAME)
            .ok_or_else(|| PluginError::Config {
                kind,
                plugin: section.name.clone(),
            })?;

        if !section.flag(KEY_ENABLED, true) {
            debug!("{} plugin {} is disabled", kind, section.name);
            return Ok(None);
        }

        let meta = self
            .registry
            .resolve(kind, &section.name, &implementation)?;
        let fields = self.resolve_fields(kind, section, meta)?;

        let descriptor = PluginDescriptor {
            kind,
            name: section.name.clone(),
            implementation,
            enabled: true,
            required_fields: to_owned(meta.required),
            optional_fields: to_owned(meta.optional),
            common_fields: to_owned(meta.common),
            needs_internet: section.flag(KEY_NEEDS_INTERNET, false),
            dispatch_mode: if section.flag(KEY_ASYNC, false) {
                DispatchMode::Async
            } else {
                DispatchMode::Sync
            },
            metadata_required: section.flag(KEY_METADATA_REQUIRED, false),
        };

        if descriptor.needs_internet && !self.gate.probe().await {
            let msg = format!(
                "Skipping {} plugin {} because no internet connectivity.",
                kind, section.name
            );
            print_info!("{}", msg);
            info!("{}", msg);
            return Ok(None);
        }

        let mut constructed = (meta.factory)(&fields)?;
        constructed.set_dispatch_mode(descriptor.dispatch_mode);

        Ok(Some((descriptor, fields, constructed)))
    }

    fn resolve_fields(
        &self,
        kind: PluginKind,
        section: &PluginSection,
        meta: &PluginMeta,
    ) -> PluginResult<PluginFields> {
        let mut fields = PluginFields::new(section.name.clone());

        for field in meta.required {
            let value = section
                .get_str(field)
                .ok_or_else(|| PluginError::MissingField {
                    kind,
                    field: field.to_string(),
                    plugin: section.name.clone(),
                    file: self.source.display().to_string(),
                })?;
            fields.insert(field, value);
        }

        for field in meta.optional {
            if let Some(value) = section.get_str(field) {
                fields.insert(field, value);
            }
        }

        for field in meta.common {
            if let Some(value) = self.common.get(*field).and_then(value_as_string) {
                fields.insert(field, value);
            }
        }

        Ok(fields)
    }
}

fn to_owned(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::{
        path::PathBuf,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use tracing_test::traced_test;

    use super::*;
    use crate::core::{
        connectivity::StaticProbe,
        plugins::{traits::Plugin, types::AlertKey},
        reading::{Reading, SensorMetadata, SensorValue},
    };

    struct FakeSensor {
        meta: SensorMetadata,
    }

    impl Plugin for FakeSensor {}

    #[async_trait::async_trait]
    impl Sensor for FakeSensor {
        fn metadata(&self) -> &SensorMetadata {
            &self.meta
        }

        async fn read(&self) -> PluginResult<SensorValue> {
            Ok(SensorValue::Scalar(Some(1.0)))
        }
    }

    fn build_sensor(fields: &PluginFields) -> PluginResult<Constructed> {
        Ok(Constructed::Sensor(Box::new(FakeSensor {
            meta: SensorMetadata {
                name: fields.get_or("measurement", "Fake").to_string(),
                ..Default::default()
            },
        })))
    }

    struct FakeOutput {
        mode: DispatchMode,
    }

    impl Plugin for FakeOutput {
        fn set_dispatch_mode(&mut self, mode: DispatchMode) {
            self.mode = mode;
        }
    }

    #[async_trait::async_trait]
    impl Output for FakeOutput {
        async fn send(&self, _readings: &[Reading]) -> PluginResult<bool> {
            Ok(self.mode == DispatchMode::Async)
        }

        fn describe_metadata(&self) -> Option<String> {
            Some("fake metadata".to_string())
        }
    }

    fn build_output(_: &PluginFields) -> PluginResult<Constructed> {
        Ok(Constructed::Output(Box::new(FakeOutput {
            mode: DispatchMode::Sync,
        })))
    }

    struct FakeNotifier;

    impl Plugin for FakeNotifier {}

    #[async_trait::async_trait]
    impl Notifier for FakeNotifier {
        async fn send_alert(&self, _key: AlertKey) -> PluginResult<bool> {
            Ok(true)
        }
    }

    fn build_notifier(_: &PluginFields) -> PluginResult<Constructed> {
        Ok(Constructed::Notifier(Box::new(FakeNotifier)))
    }

    struct Helper;

    impl Plugin for Helper {}

    fn build_helper(_: &PluginFields) -> PluginResult<Constructed> {
        Ok(Constructed::Support(Box::new(Helper)))
    }

    static SENSOR: PluginMeta = PluginMeta {
        kind: PluginKind::Sensor,
        id: "fake",
        required: &["pin"],
        optional: &["measurement"],
        common: &[],
        factory: build_sensor,
    };

    static SENSOR_HELPER: PluginMeta = PluginMeta {
        kind: PluginKind::Sensor,
        id: "helper",
        required: &[],
        optional: &[],
        common: &[],
        factory: build_helper,
    };

    static OUTPUT: PluginMeta = PluginMeta {
        kind: PluginKind::Output,
        id: "fake",
        required: &[],
        optional: &[],
        common: &[],
        factory: build_output,
    };

    static NOTIFIER: PluginMeta = PluginMeta {
        kind: PluginKind::Notification,
        id: "fake",
        required: &["to"],
        optional: &[],
        common: &["station", "missing"],
        factory: build_notifier,
    };

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    fn build_counted(fields: &PluginFields) -> PluginResult<Constructed> {
        BUILDS.fetch_add(1, Ordering::SeqCst);
        build_output(fields)
    }

    static OUTPUT_COUNTED: PluginMeta = PluginMeta {
        kind: PluginKind::Output,
        id: "counted",
        required: &[],
        optional: &[],
        common: &[],
        factory: build_counted,
    };

    fn registry() -> PluginRegistry {
        PluginRegistry::from_entries(vec![
            &SENSOR,
            &SENSOR_HELPER,
            &OUTPUT,
            &NOTIFIER,
            &OUTPUT_COUNTED,
        ])
    }

    fn source() -> PathBuf {
        PathBuf::from("/etc/breezebee/config.toml")
    }

    #[tokio::test]
    #[traced_test]
    async fn loads_enabled_sections_in_file_order() {
        let registry = registry();
        let gate = StaticProbe(true);
        let common = toml::Table::new();
        let path = source();
        let loader = PluginLoader::new(&registry, &gate, &path, &common);

        let sections = vec![
            PluginSection::new("Temperature")
                .with("filename", "fake")
                .with("pin", 4i64)
                .with("measurement", "Temp"),
            PluginSection::new("Off")
                .with("filename", "fake")
                .with("enabled", "no"),
            PluginSection::new("Light")
                .with("filename", "fake")
                .with("pin", "5")
                .with("unused", "x"),
        ];

        let set = loader.load_sensors(&sections).await.unwrap();
        assert_eq!(set.names(), vec!["Temperature", "Light"]);

        let temp = &set.active[0];
        assert_eq!(temp.fields.get("pin"), Some("4"));
        assert_eq!(temp.plugin.metadata().name, "Temp");
        assert_eq!(temp.descriptor.required_fields, vec!["pin".to_string()]);
        assert_eq!(set.active[1].fields.get("unused"), None);
        assert!(logs_contain("Loaded sensor plugin Temperature"));
    }

    #[tokio::test]
    async fn malformed_enabled_defaults_to_true() {
        let registry = registry();
        let gate = StaticProbe(true);
        let common = toml::Table::new();
        let path = source();
        let loader = PluginLoader::new(&registry, &gate, &path, &common);

        let sections = vec![PluginSection::new("Temp")
            .with("filename", "fake")
            .with("pin", 1i64)
            .with("enabled", "sometimes")];

        let set = loader.load_sensors(&sections).await.unwrap();
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn missing_filename_is_a_config_error() {
        let registry = registry();
        let gate = StaticProbe(true);
        let common = toml::Table::new();
        let path = source();
        let loader = PluginLoader::new(&registry, &gate, &path, &common);

        let err = loader
            .load_sensors(&[PluginSection::new("Temp").with("enabled", false)])
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Config { ref plugin, .. } if plugin == "Temp"));
    }

    #[tokio::test]
    #[traced_test]
    async fn missing_required_field_aborts_the_group() {
        let registry = registry();
        let gate = StaticProbe(true);
        let common = toml::Table::new();
        let path = source();
        let loader = PluginLoader::new(&registry, &gate, &path, &common);

        let sections = vec![
            PluginSection::new("Good")
                .with("filename", "fake")
                .with("pin", 1i64),
            PluginSection::new("Bad").with("filename", "fake"),
        ];

        let err = loader.load_sensors(&sections).await.unwrap_err();
        match &err {
            PluginError::MissingField {
                field,
                plugin,
                file,
                ..
            } => {
                assert_eq!(field, "pin");
                assert_eq!(plugin, "Bad");
                assert_eq!(file, "/etc/breezebee/config.toml");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("Missing required field 'pin'"));
        assert!(logs_contain("Did not import sensor plugin Bad"));
    }

    #[tokio::test]
    async fn unresolvable_implementation_is_a_load_error() {
        let registry = registry();
        let gate = StaticProbe(true);
        let common = toml::Table::new();
        let path = source();
        let loader = PluginLoader::new(&registry, &gate, &path, &common);

        let err = loader
            .load_sensors(&[PluginSection::new("X").with("filename", "nope")])
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Load { .. }));
    }

    #[tokio::test]
    #[traced_test]
    async fn sections_without_capability_become_support_plugins() {
        let registry = registry();
        let gate = StaticProbe(true);
        let common = toml::Table::new();
        let path = source();
        let loader = PluginLoader::new(&registry, &gate, &path, &common);

        let sections = vec![PluginSection::new("Bus").with("filename", "helper")];
        let set = loader.load_sensors(&sections).await.unwrap();

        assert!(set.is_empty());
        assert_eq!(set.support.len(), 1);
        assert_eq!(set.support[0].name(), "Bus");
        assert!(logs_contain("Loaded support plugin Bus"));
    }

    #[tokio::test]
    #[traced_test]
    async fn offline_gate_skips_internet_plugins_without_building_them() {
        let registry = registry();
        let gate = StaticProbe(false);
        let common = toml::Table::new();
        let path = source();
        let loader = PluginLoader::new(&registry, &gate, &path, &common);

        let sections = vec![
            PluginSection::new("Cloud")
                .with("filename", "counted")
                .with("needsinternet", true),
            PluginSection::new("Local").with("filename", "fake"),
        ];

        let before = BUILDS.load(Ordering::SeqCst);
        let loaded = loader.load_outputs(&sections).await.unwrap();
        assert_eq!(loaded.set.names(), vec!["Local"]);
        assert_eq!(BUILDS.load(Ordering::SeqCst), before);
        assert!(logs_contain(
            "Skipping output plugin Cloud because no internet connectivity."
        ));
    }

    #[tokio::test]
    async fn no_active_outputs_is_fatal() {
        let registry = registry();
        let gate = StaticProbe(false);
        let common = toml::Table::new();
        let path = source();
        let loader = PluginLoader::new(&registry, &gate, &path, &common);

        let sections = vec![PluginSection::new("Cloud")
            .with("filename", "fake")
            .with("needsinternet", "yes")];

        let err = loader.load_outputs(&sections).await.err().unwrap();
        assert!(matches!(err, PluginError::NoOutputs));
    }

    #[tokio::test]
    async fn async_flag_and_metadata_are_forwarded() {
        let registry = registry();
        let gate = StaticProbe(true);
        let common = toml::Table::new();
        let path = source();
        let loader = PluginLoader::new(&registry, &gate, &path, &common);

        let sections = vec![
            PluginSection::new("Upload")
                .with("filename", "fake")
                .with("async", true)
                .with("metadatareqd", true),
            PluginSection::new("Quiet").with("filename", "fake"),
        ];

        let loaded = loader.load_outputs(&sections).await.unwrap();
        assert_eq!(loaded.metadata, vec!["fake metadata".to_string()]);

        let upload = &loaded.set.active[0];
        assert_eq!(upload.descriptor.dispatch_mode, DispatchMode::Async);
        assert!(upload.plugin.send(&[]).await.unwrap());

        let quiet = &loaded.set.active[1];
        assert_eq!(quiet.descriptor.dispatch_mode, DispatchMode::Sync);
        assert!(!quiet.plugin.send(&[]).await.unwrap());
    }

    #[tokio::test]
    async fn common_fields_come_from_the_shared_table() {
        let registry = registry();
        let gate = StaticProbe(true);
        let mut common = toml::Table::new();
        common.insert("station".into(), toml::Value::String("Roof".into()));
        let path = source();
        let loader = PluginLoader::new(&registry, &gate, &path, &common);

        let sections = vec![PluginSection::new("Mail")
            .with("filename", "fake")
            .with("to", "ops@example.org")
            .with("station", "ignored")];

        let set = loader.load_notifications(&sections).await.unwrap();
        let fields = &set.active[0].fields;
        assert_eq!(fields.get("station"), Some("Roof"));
        assert_eq!(fields.get("missing"), None);
        assert_eq!(fields.get("to"), Some("ops@example.org"));
    }
}
