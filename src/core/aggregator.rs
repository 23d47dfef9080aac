//! Per-cycle sensor polling and health classification.

use tracing::{debug, warn};

use super::{
    plugins::loader::SensorSet,
    reading::{LocationReading, Reading, ScalarReading, SensorValue},
};

/// Result of polling every sensor once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// One entry per sensor that produced something, in sensor order.
    pub readings: Vec<Reading>,
    /// False when any scalar sensor produced no usable value.
    pub sensors_healthy: bool,
}

/// Reads every sensor in order and assembles the cycle record.
///
/// A read error is treated like a missing value. Location sensors without
/// a fix are left out of the record without affecting health.
pub async fn collect(sensors: &SensorSet) -> Aggregation {
    let mut readings = Vec::with_capacity(sensors.len());
    let mut sensors_healthy = true;

    for instance in sensors.iter() {
        let meta = instance.plugin.metadata();
        let value = match instance.plugin.read().await {
            Ok(value) => value,
            Err(e) => {
                warn!("Sensor {} failed to read: {}", instance.name(), e);
                SensorValue::Scalar(None)
            }
        };

        match value {
            SensorValue::Location(fix) => {
                if !fix.has_fix() {
                    debug!("Sensor {} has no location fix yet", instance.name());
                    continue;
                }
                debug!("Location from {}: {:?}", instance.name(), fix);
                readings.push(Reading::Location(LocationReading {
                    sensor: instance.name().to_string(),
                    name: meta.name.clone(),
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                    altitude: fix.altitude,
                    disposition: fix.disposition,
                    exposure: fix.exposure,
                }));
            }
            SensorValue::Scalar(value) => {
                let reading = ScalarReading {
                    sensor: instance.name().to_string(),
                    name: meta.name.clone(),
                    description: meta.description.clone(),
                    reading_type: meta.reading_type.clone(),
                    unit: meta.unit.clone(),
                    symbol: meta.symbol.clone(),
                    value,
                };
                if !reading.is_valid() {
                    debug!("Sensor {} returned {:?}", instance.name(), reading.value);
                    sensors_healthy = false;
                }
                readings.push(Reading::Scalar(reading));
            }
        }
    }

    Aggregation {
        readings,
        sensors_healthy,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted sensors shared by the engine tests.

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use crate::core::{
        plugins::{
            error::PluginError,
            loader::SensorSet,
            traits::{Plugin, Sensor},
            types::{PluginDescriptor, PluginFields, PluginInstance, PluginKind, PluginResult},
        },
        reading::{SensorMetadata, SensorValue},
    };

    pub enum Script {
        Value(SensorValue),
        Fail,
    }

    pub struct ScriptedSensor {
        pub meta: SensorMetadata,
        pub script: Script,
        pub reads: Arc<AtomicUsize>,
        pub stops: Arc<AtomicUsize>,
    }

    impl Plugin for ScriptedSensor {}

    #[async_trait::async_trait]
    impl Sensor for ScriptedSensor {
        fn metadata(&self) -> &SensorMetadata {
            &self.meta
        }

        async fn read(&self) -> PluginResult<SensorValue> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Value(v) => Ok(v.clone()),
                Script::Fail => Err(PluginError::io(
                    "/sys/bus/iio",
                    std::io::Error::new(std::io::ErrorKind::Other, "bus error"),
                )),
            }
        }

        async fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn descriptor(kind: PluginKind, name: &str) -> PluginDescriptor {
        PluginDescriptor {
            kind,
            name: name.to_string(),
            implementation: "scripted".to_string(),
            enabled: true,
            required_fields: Vec::new(),
            optional_fields: Vec::new(),
            common_fields: Vec::new(),
            needs_internet: false,
            dispatch_mode: Default::default(),
            metadata_required: false,
        }
    }

    pub fn sensor(name: &str, unit: &str, script: Script) -> ScriptedSensor {
        ScriptedSensor {
            meta: SensorMetadata {
                name: name.to_string(),
                unit: unit.to_string(),
                symbol: unit.to_string(),
                reading_type: "Sample".to_string(),
                ..Default::default()
            },
            script,
            reads: Arc::default(),
            stops: Arc::default(),
        }
    }

    pub fn sensor_set(sensors: Vec<(&str, ScriptedSensor)>) -> SensorSet {
        let mut set = SensorSet::default();
        for (name, sensor) in sensors {
            set.active.push(PluginInstance {
                descriptor: descriptor(PluginKind::Sensor, name),
                fields: PluginFields::new(name),
                plugin: Box::new(sensor) as Box<dyn Sensor>,
            });
        }
        set
    }
}
