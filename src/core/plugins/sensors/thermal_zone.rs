use std::path::{Path, PathBuf};

use super::{metadata_from, MetadataDefaults};
use crate::{
    core::{
        plugins::{
            error::PluginError,
            traits::{Constructed, Plugin, PluginFactory, Sensor},
            types::{PluginFields, PluginKind, PluginResult},
        },
        reading::{SensorMetadata, SensorValue},
    },
    register_plugin,
};

const DEFAULT_THERMAL_ROOT: &str = "/sys/class/thermal";

/// Temperature of one kernel thermal zone.
///
/// Reads `<sysfs_root>/thermal_zone<zone>/temp`, which the kernel exposes in
/// millidegrees Celsius, and reports degrees.
///
/// ```text
/// /sys/class/thermal/
///   thermal_zone0/
///     temp          <- "45500" for 45.5 °C
/// ```
pub struct ThermalZoneSensor {
    meta: SensorMetadata,
    temp_path: PathBuf,
}

impl ThermalZoneSensor {
    pub fn new(root: &Path, zone: u32, meta: SensorMetadata) -> Self {
        Self {
            meta,
            temp_path: root.join(format!("thermal_zone{}", zone)).join("temp"),
        }
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }
}

impl Plugin for ThermalZoneSensor {}

#[async_trait::async_trait]
impl Sensor for ThermalZoneSensor {
    fn metadata(&self) -> &SensorMetadata {
        &self.meta
    }

    async fn read(&self) -> PluginResult<SensorValue> {
        let raw = tokio::fs::read_to_string(&self.temp_path)
            .await
            .map_err(|e| PluginError::io(self.temp_path.display().to_string(), e))?;

        let millidegrees = raw.trim().parse::<i64>().map_err(|e| PluginError::Parse {
            what: "temperature".to_string(),
            location: self.temp_path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(SensorValue::Scalar(Some(millidegrees as f64 / 1000.0)))
    }
}

impl PluginFactory for ThermalZoneSensor {
    const KIND: PluginKind = PluginKind::Sensor;
    const REQUIRED_FIELDS: &'static [&'static str] = &["zone"];
    const OPTIONAL_FIELDS: &'static [&'static str] = &[
        "sysfs_root",
        "measurement",
        "unit",
        "symbol",
        "description",
        "readingtype",
    ];

    fn build(fields: &PluginFields) -> PluginResult<Self> {
        let zone = fields
            .parse::<u32>("zone")?
            .ok_or_else(|| PluginError::InvalidField {
                plugin: fields.plugin().to_string(),
                field: "zone".to_string(),
                value: String::new(),
                reason: "zone is required".to_string(),
            })?;
        let root = PathBuf::from(fields.get_or("sysfs_root", DEFAULT_THERMAL_ROOT));
        let meta = metadata_from(
            fields,
            MetadataDefaults {
                name: "Temperature",
                unit: "Celsius",
                symbol: "C",
                description: "Thermal zone temperature",
            },
        );
        Ok(Self::new(&root, zone, meta))
    }

    fn into_constructed(self) -> Constructed {
        Constructed::Sensor(Box::new(self))
    }
}

register_plugin!(ThermalZoneSensor, "thermal_zone");

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::core::plugins::registry::PluginRegistry;

    fn fields(root: &Path, zone: &str) -> PluginFields {
        PluginFields::new("CPU")
            .with("zone", zone)
            .with("sysfs_root", root.display().to_string())
    }

    #[tokio::test]
    async fn reads_millidegrees_as_degrees() {
        let root = tempdir().unwrap();
        let zone = root.path().join("thermal_zone1");
        std::fs::create_dir(&zone).unwrap();
        std::fs::write(zone.join("temp"), "45500\n").unwrap();

        let sensor = ThermalZoneSensor::build(&fields(root.path(), "1")).unwrap();
        assert_eq!(sensor.metadata().symbol, "C");
        assert_eq!(
            sensor.read().await.unwrap(),
            SensorValue::Scalar(Some(45.5))
        );
    }

    #[tokio::test]
    async fn missing_zone_file_is_an_io_error() {
        let root = tempdir().unwrap();
        let sensor = ThermalZoneSensor::build(&fields(root.path(), "7")).unwrap();
        assert!(matches!(
            sensor.read().await.unwrap_err(),
            PluginError::Io { .. }
        ));
    }

    #[tokio::test]
    async fn garbage_is_a_parse_error() {
        let root = tempdir().unwrap();
        let zone = root.path().join("thermal_zone0");
        std::fs::create_dir(&zone).unwrap();
        std::fs::write(zone.join("temp"), "n/a").unwrap();

        let sensor = ThermalZoneSensor::build(&fields(root.path(), "0")).unwrap();
        assert!(matches!(
            sensor.read().await.unwrap_err(),
            PluginError::Parse { .. }
        ));
    }

    #[test]
    fn non_numeric_zone_is_rejected_at_build() {
        let root = tempdir().unwrap();
        assert!(ThermalZoneSensor::build(&fields(root.path(), "cpu")).is_err());
    }

    #[test]
    fn registered_as_sensor() {
        let meta = PluginRegistry::global()
            .resolve(PluginKind::Sensor, "CPU", "thermal_zone")
            .unwrap();
        assert_eq!(meta.required, &["zone"]);
    }
}
