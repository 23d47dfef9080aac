use std::path::PathBuf;

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

/// Any numeric attribute file, such as an IIO `in_voltage0_raw` or a hwmon
/// `humidity1_input`, linearly converted with `value * scale + offset`.
pub struct SysfsValueSensor {
    meta: SensorMetadata,
    path: PathBuf,
    scale: f64,
    offset: f64,
}

impl SysfsValueSensor {
    fn convert(&self, raw: f64) -> f64 {
        raw * self.scale + self.offset
    }
}

impl Plugin for SysfsValueSensor {}

#[async_trait::async_trait]
impl Sensor for SysfsValueSensor {
    fn metadata(&self) -> &SensorMetadata {
        &self.meta
    }

    async fn read(&self) -> PluginResult<SensorValue> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| PluginError::io(self.path.display().to_string(), e))?;

        // Some drivers report an empty attribute while the device warms up.
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(SensorValue::Scalar(None));
        }

        let value = raw.parse::<f64>().map_err(|e| PluginError::Parse {
            what: self.meta.name.clone(),
            location: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(SensorValue::Scalar(Some(self.convert(value))))
    }
}

impl PluginFactory for SysfsValueSensor {
    const KIND: PluginKind = PluginKind::Sensor;
    const REQUIRED_FIELDS: &'static [&'static str] = &["path"];
    const OPTIONAL_FIELDS: &'static [&'static str] = &[
        "scale",
        "offset",
        "measurement",
        "unit",
        "symbol",
        "description",
        "readingtype",
    ];

    fn build(fields: &PluginFields) -> PluginResult<Self> {
        let path = PathBuf::from(fields.required("path")?);
        let scale = fields.parse::<f64>("scale")?.unwrap_or(1.0);
        let offset = fields.parse::<f64>("offset")?.unwrap_or(0.0);

        Ok(Self {
            meta: metadata_from(
                fields,
                MetadataDefaults {
                    name: "Value",
                    unit: "",
                    symbol: "",
                    description: "",
                },
            ),
            path,
            scale,
            offset,
        })
    }

    fn into_constructed(self) -> Constructed {
        Constructed::Sensor(Box::new(self))
    }
}

register_plugin!(SysfsValueSensor, "sysfs_value");

#[cfg(test)]
mod tests {
    use tempfile::NamedTempFile;

    use super::*;

    fn sensor_for(file: &NamedTempFile) -> PluginFields {
        PluginFields::new("Light")
            .with("path", file.path().display().to_string())
            .with("measurement", "Light_Level")
            .with("unit", "Ohms")
            .with("symbol", "Ohms")
    }

    #[tokio::test]
    async fn applies_scale_and_offset() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "2048\n").unwrap();

        let fields = sensor_for(&file).with("scale", "0.5").with("offset", "-24");
        let sensor = SysfsValueSensor::build(&fields).unwrap();

        assert_eq!(sensor.metadata().name, "Light_Level");
        assert_eq!(
            sensor.read().await.unwrap(),
            SensorValue::Scalar(Some(1000.0))
        );
    }

    #[tokio::test]
    async fn empty_attribute_reads_as_no_value() {
        let file = NamedTempFile::new().unwrap();
        let sensor = SysfsValueSensor::build(&sensor_for(&file)).unwrap();
        assert_eq!(sensor.read().await.unwrap(), SensorValue::Scalar(None));
    }

    #[tokio::test]
    async fn zero_is_reported_as_is() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "0").unwrap();
        let sensor = SysfsValueSensor::build(&sensor_for(&file)).unwrap();
        assert_eq!(sensor.read().await.unwrap(), SensorValue::Scalar(Some(0.0)));
    }

    #[test]
    fn invalid_scale_is_rejected_at_build() {
        let file = NamedTempFile::new().unwrap();
        let fields = sensor_for(&file).with("scale", "half");
        assert!(matches!(
            SysfsValueSensor::build(&fields),
            Err(PluginError::InvalidField { ref field, .. }) if field == "scale"
        ));
    }
}
