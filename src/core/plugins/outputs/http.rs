//! JSON upload of each cycle record to a feed endpoint.

use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::{
    core::{
        plugins::{
            error::PluginError,
            traits::{Constructed, Output, Plugin, PluginFactory},
            types::{DispatchMode, PluginFields, PluginKind, PluginResult},
        },
        reading::Reading,
    },
    register_plugin,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_API_KEY_HEADER: &str = "X-ApiKey";

/// Builds the feed document for one record.
///
/// Scalar readings become `{"id", "current_value"}` datastreams; location
/// readings become a `location` element.
pub fn feed_document(readings: &[Reading]) -> Value {
    let datastreams: Vec<Value> = readings
        .iter()
        .map(|reading| match reading {
            Reading::Scalar(r) => json!({
                "id": r.name,
                "current_value": r.value,
            }),
            Reading::Location(r) => json!({
                "location": {
                    "disposition": r.disposition,
                    "ele": r.altitude,
                    "exposure": r.exposure,
                    "domain": "physical",
                    "lat": r.latitude,
                    "lon": r.longitude,
                }
            }),
        })
        .collect();

    json!({
        "version": "1.0.0",
        "datastreams": datastreams,
    })
}

#[derive(Clone)]
struct Upload {
    client: Client,
    method: Method,
    url: String,
    api_key: Option<(String, String)>,
}

impl Upload {
    /// A 2xx answer with an empty body is a success; anything else the
    /// service says is treated as a rejection.
    async fn deliver(&self, body: &Value) -> PluginResult<bool> {
        let mut request = self.client.request(self.method.clone(), &self.url).json(body);
        if let Some((header, key)) = &self.api_key {
            request = request.header(header.as_str(), key.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() && text.trim().is_empty() {
            debug!("Uploaded record to {} ({})", self.url, status);
            Ok(true)
        } else {
            warn!("HTTP output error from {}: {} {}", self.url, status, text.trim());
            Ok(false)
        }
    }
}

pub struct HttpOutput {
    upload: Upload,
    mode: DispatchMode,
}

impl Plugin for HttpOutput {
    fn set_dispatch_mode(&mut self, mode: DispatchMode) {
        self.mode = mode;
    }
}

#[async_trait::async_trait]
impl Output for HttpOutput {
    async fn send(&self, readings: &[Reading]) -> PluginResult<bool> {
        let body = feed_document(readings);

        match self.mode {
            DispatchMode::Sync => self.upload.deliver(&body).await,
            DispatchMode::Async => {
                let upload = self.upload.clone();
                tokio::spawn(async move {
                    if let Err(e) = upload.deliver(&body).await {
                        error!("Background upload to {} failed: {}", upload.url, e);
                    }
                });
                Ok(true)
            }
        }
    }

    fn describe_metadata(&self) -> Option<String> {
        Some(format!("Readings are uploaded to {}", self.upload.url))
    }
}

impl PluginFactory for HttpOutput {
    const KIND: PluginKind = PluginKind::Output;
    const REQUIRED_FIELDS: &'static [&'static str] = &["url"];
    const OPTIONAL_FIELDS: &'static [&'static str] = &["method", "api_key", "api_key_header"];

    fn build(fields: &PluginFields) -> PluginResult<Self> {
        let method = match fields.get_or("method", "PUT").to_uppercase().as_str() {
            "PUT" => Method::PUT,
            "POST" => Method::POST,
            other => {
                return Err(PluginError::InvalidField {
                    plugin: fields.plugin().to_string(),
                    field: "method".to_string(),
                    value: other.to_string(),
                    reason: "expected PUT or POST".to_string(),
                })
            }
        };

        let api_key = fields.get("api_key").map(|key| {
            (
                fields
                    .get_or("api_key_header", DEFAULT_API_KEY_HEADER)
                    .to_string(),
                key.to_string(),
            )
        });

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            upload: Upload {
                client,
                method,
                url: fields.required("url")?.to_string(),
                api_key,
            },
            mode: DispatchMode::Sync,
        })
    }

    fn into_constructed(self) -> Constructed {
        Constructed::Output(Box::new(self))
    }
}

register_plugin!(HttpOutput, "http");
