//! Per-cycle reading record and the values sensors hand back.

use serde::{Deserialize, Serialize};

/// Descriptive attributes of a sensor, copied into each of its readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorMetadata {
    /// Human-readable measurement name, e.g. "Temperature".
    pub name: String,
    pub unit: String,
    pub symbol: String,
    pub description: String,
    /// Free-form classification, e.g. "Sample" or "Derived".
    pub reading_type: String,
    /// The sensor reports a position rather than a scalar.
    pub tracks_location: bool,
}

/// A position fix reported by a location sensor.
///
/// `altitude` is NaN until the receiver has a three-dimensional fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// "mobile" or "fixed".
    pub disposition: String,
    /// "indoor" or "outdoor".
    pub exposure: String,
}

impl LocationFix {
    pub fn has_fix(&self) -> bool {
        !self.altitude.is_nan()
    }
}

/// Raw value returned by one sensor read.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorValue {
    /// `None` when the sensor produced nothing; may also carry NaN.
    Scalar(Option<f64>),
    Location(LocationFix),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarReading {
    /// Configuration section of the producing sensor.
    pub sensor: String,
    pub name: String,
    pub description: String,
    pub reading_type: String,
    pub unit: String,
    pub symbol: String,
    pub value: Option<f64>,
}

impl ScalarReading {
    /// Absent, NaN and exactly zero all count as a failed read.
    pub fn is_valid(&self) -> bool {
        matches!(self.value, Some(v) if !v.is_nan() && v != 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReading {
    pub sensor: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub disposition: String,
    pub exposure: String,
}

/// Normalized output of one sensor for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reading {
    Scalar(ScalarReading),
    Location(LocationReading),
}

impl Reading {
    pub fn sensor(&self) -> &str {
        match self {
            Reading::Scalar(r) => &r.sensor,
            Reading::Location(r) => &r.sensor,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Reading::Scalar(r) => &r.name,
            Reading::Location(r) => &r.name,
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarReading> {
        match self {
            Reading::Scalar(r) => Some(r),
            Reading::Location(_) => None,
        }
    }
}
