//! Built-in sensor plugins.
//!
//! Every sensor accepts the same set of optional presentation fields,
//! copied into each reading it produces:
//!
//! | field         | meaning                               |
//! |---------------|---------------------------------------|
//! | `measurement` | display name, e.g. "Temperature"      |
//! | `unit`        | unit name, e.g. "Celsius"             |
//! | `symbol`      | unit symbol, e.g. "C"                 |
//! | `description` | free text                             |
//! | `readingtype` | classification, e.g. "Sample"         |

use super::types::PluginFields;
use crate::core::reading::SensorMetadata;

pub mod gpsd;
pub mod sysfs_value;
pub mod thermal_zone;

/// Metadata a sensor falls back to for fields its section leaves unset.
pub(crate) struct MetadataDefaults {
    pub name: &'static str,
    pub unit: &'static str,
    pub symbol: &'static str,
    pub description: &'static str,
}

pub(crate) fn metadata_from(fields: &PluginFields, defaults: MetadataDefaults) -> SensorMetadata {
    SensorMetadata {
        name: fields.get_or("measurement", defaults.name).to_string(),
        unit: fields.get_or("unit", defaults.unit).to_string(),
        symbol: fields.get_or("symbol", defaults.symbol).to_string(),
        description: fields.get_or("description", defaults.description).to_string(),
        reading_type: fields.get_or("readingtype", "Sample").to_string(),
        tracks_location: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_fields_override_defaults() {
        let fields = PluginFields::new("Board")
            .with("measurement", "Board temperature")
            .with("readingtype", "Derived");

        let meta = metadata_from(
            &fields,
            MetadataDefaults {
                name: "Temperature",
                unit: "Celsius",
                symbol: "C",
                description: "",
            },
        );

        assert_eq!(meta.name, "Board temperature");
        assert_eq!(meta.unit, "Celsius");
        assert_eq!(meta.symbol, "C");
        assert_eq!(meta.reading_type, "Derived");
        assert!(!meta.tracks_location);
    }
}
