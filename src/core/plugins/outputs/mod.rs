//! Built-in output plugins.

use crate::core::reading::Reading;

pub mod csv;
pub mod http;
pub mod print;

/// Renders an optional value the way the console and CSV files show it:
/// empty for a missing value, `NaN` as such.
pub(crate) fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// Column label of a reading, e.g. `Temperature (C)`.
pub(crate) fn column_label(reading: &Reading) -> String {
    match reading {
        Reading::Scalar(r) if !r.symbol.is_empty() => format!("{} ({})", r.name, r.symbol),
        Reading::Scalar(r) => r.name.clone(),
        Reading::Location(r) => r.name.clone(),
    }
}
