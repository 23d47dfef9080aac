use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use tokio::{io::AsyncWriteExt, sync::Mutex};
use tracing::debug;

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

/// Appends one row per cycle to a CSV file.
///
/// The first column is the UTC timestamp of the write. A header row is
/// written before the first row, and again whenever the set of columns
/// changes, e.g. once a location sensor acquires its first fix.
pub struct CsvOutput {
    path: PathBuf,
    columns: Mutex<Option<Vec<String>>>,
}

impl CsvOutput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn header(readings: &[Reading]) -> Vec<String> {
        let mut header = vec!["time".to_string()];
        for reading in readings {
            match reading {
                Reading::Scalar(_) => header.push(column_label(reading)),
                Reading::Location(r) => {
                    header.push(format!("{} latitude", r.name));
                    header.push(format!("{} longitude", r.name));
                    header.push(format!("{} altitude", r.name));
                }
            }
        }
        header
    }

    fn row(timestamp: &str, readings: &[Reading]) -> Vec<String> {
        let mut row = vec![timestamp.to_string()];
        for reading in readings {
            match reading {
                Reading::Scalar(r) => row.push(format_value(r.value)),
                Reading::Location(r) => {
                    row.push(r.latitude.to_string());
                    row.push(r.longitude.to_string());
                    row.push(r.altitude.to_string());
                }
            }
        }
        row
    }

    async fn file_is_empty(&self) -> bool {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        }
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn to_line(fields: &[String]) -> String {
    let mut line = fields
        .iter()
        .map(|f| escape(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

impl Plugin for CsvOutput {}

#[async_trait::async_trait]
impl Output for CsvOutput {
    async fn send(&self, readings: &[Reading]) -> PluginResult<bool> {
        let timestamp = time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| PluginError::Parse {
                what: "timestamp".to_string(),
                location: "system clock".to_string(),
                reason: e.to_string(),
            })?;

        let mut columns = self.columns.lock().await;
        let header = Self::header(readings);

        let mut chunk = String::new();
        let layout_changed = (*columns).as_ref() != Some(&header);
        if layout_changed {
            // A fresh process appending to an existing file keeps its header
            // unless the layout differs.
            let write_header = columns.is_some()
                || self.file_is_empty().await
                || !self.header_matches(&header).await;
            if write_header {
                chunk.push_str(&to_line(&header));
            }
        }
        chunk.push_str(&to_line(&Self::row(&timestamp, readings)));

        self.append(&chunk).await?;

        // Only a header that reached the file counts as written.
        if layout_changed {
            *columns = Some(header);
        }

        debug!("Appended {} readings to {}", readings.len(), self.path.display());
        Ok(true)
    }

    fn describe_metadata(&self) -> Option<String> {
        Some(format!("Readings are appended to {}", self.path.display()))
    }
}

impl CsvOutput {
    async fn append(&self, chunk: &str) -> PluginResult<()> {
        let io_err = |e: std::io::Error| PluginError::io(self.path.display().to_string(), e);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(chunk.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)
    }

    /// Whether the last header row already in the file equals `header`.
    async fn header_matches(&self, header: &[String]) -> bool {
        let Ok(content) = tokio::fs::read_to_string(&self.path).await else {
            return false;
        };
        let expected = to_line(header);
        content
            .lines()
            .rev()
            .find(|line| line.starts_with("time,") || *line == "time")
            .map(|line| format!("{}\n", line) == expected)
            .unwrap_or(false)
    }
}

impl PluginFactory for CsvOutput {
    const KIND: PluginKind = PluginKind::Output;
    const REQUIRED_FIELDS: &'static [&'static str] = &["outputfile"];

    fn build(fields: &PluginFields) -> PluginResult<Self> {
        Ok(Self {
            path: PathBuf::from(fields.required("outputfile")?),
            columns: Mutex::new(None),
        })
    }

    fn into_constructed(self) -> Constructed {
        Constructed::Output(Box::new(self))
    }
}

register_plugin!(CsvOutput, "csv");
