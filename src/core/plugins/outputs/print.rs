use std::fmt::Write as _;

use super::{column_label, format_value};
use crate::{
    core::{
        plugins::{
            error::PluginError,
            traits::{Constructed, Output, Plugin, PluginFactory},
            types::{PluginFields, PluginKind, PluginResult},
        },
        reading::Reading,
    },
    register_plugin,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrintFormat {
    /// One labelled line per reading.
    Lines,
    /// One JSON document per cycle.
    Json,
}

/// Shows every cycle record on the operator console.
pub struct PrintOutput {
    format: PrintFormat,
    operator: Option<String>,
}

impl PrintOutput {
    /// Text block for one record, without a trailing newline.
    fn render(&self, readings: &[Reading]) -> PluginResult<String> {
        if self.format == PrintFormat::Json {
            return Ok(serde_json::to_string(readings)?);
        }

        let mut out = String::new();
        let _ = write!(out, "Time: {}", crate::config::console_timestamp());
        for reading in readings {
            out.push('\n');
            let _ = match reading {
                Reading::Scalar(r) => write!(
                    out,
                    "{}: {} {}",
                    r.name,
                    format_value(r.value),
                    r.symbol
                ),
                Reading::Location(r) => write!(
                    out,
                    "{}: lat {} lon {} alt {} ({}, {})",
                    column_label(reading),
                    r.latitude,
                    r.longitude,
                    r.altitude,
                    r.disposition,
                    r.exposure
                ),
            };
        }
        Ok(out.trim_end().to_string())
    }
}

impl Plugin for PrintOutput {}

#[async_trait::async_trait]
impl Output for PrintOutput {
    async fn send(&self, readings: &[Reading]) -> PluginResult<bool> {
        println!("{}", self.render(readings)?);
        println!("{}", "=".repeat(58));
        Ok(true)
    }

    fn describe_metadata(&self) -> Option<String> {
        let mut text = String::from("Readings will be printed to this console every cycle");
        if let Some(operator) = &self.operator {
            let _ = write!(text, "\nOperator: {}", operator);
        }
        Some(text)
    }
}

impl PluginFactory for PrintOutput {
    const KIND: PluginKind = PluginKind::Output;
    const OPTIONAL_FIELDS: &'static [&'static str] = &["format", "operator"];

    fn build(fields: &PluginFields) -> PluginResult<Self> {
        let format = match fields.get_or("format", "lines") {
            "lines" => PrintFormat::Lines,
            "json" => PrintFormat::Json,
            other => {
                return Err(PluginError::InvalidField {
                    plugin: fields.plugin().to_string(),
                    field: "format".to_string(),
                    value: other.to_string(),
                    reason: "expected 'lines' or 'json'".to_string(),
                })
            }
        };
        Ok(Self {
            format,
            operator: fields.get("operator").map(str::to_string),
        })
    }

    fn into_constructed(self) -> Constructed {
        Constructed::Output(Box::new(self))
    }
}

register_plugin!(PrintOutput, "print");
