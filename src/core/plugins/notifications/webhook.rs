use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::{default_message, with_station};
use crate::{
    core::plugins::{
        traits::{Constructed, Notifier, Plugin, PluginFactory},
        types::{AlertKey, DispatchMode, PluginFields, PluginKind, PluginResult},
    },
    register_plugin,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body posted for every alert.
#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    alert: &'a str,
    message: String,
    station: Option<&'a str>,
    timestamp: String,
}

/// Posts alerts as JSON to an HTTP endpoint such as a chat webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    station: Option<String>,
    mode: DispatchMode,
}

impl WebhookNotifier {
    fn payload(&self, key: AlertKey) -> AlertPayload<'_> {
        AlertPayload {
            alert: key.as_str(),
            message: with_station(self.station.as_deref(), default_message(key)),
            station: self.station.as_deref(),
            timestamp: crate::config::console_timestamp(),
        }
    }
}

impl Plugin for WebhookNotifier {
    fn set_dispatch_mode(&mut self, mode: DispatchMode) {
        self.mode = mode;
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send_alert(&self, key: AlertKey) -> PluginResult<bool> {
        let request = self.client.post(&self.url).json(&self.payload(key));

        if self.mode == DispatchMode::Async {
            let url = self.url.clone();
            tokio::spawn(async move {
                if let Err(e) = request.send().await {
                    warn!("Background alert to {} failed: {}", url, e);
                }
            });
            return Ok(true);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            debug!("Alert {} delivered to {}", key, self.url);
            Ok(true)
        } else {
            warn!("Webhook {} answered {}", self.url, response.status());
            Ok(false)
        }
    }
}

impl PluginFactory for WebhookNotifier {
    const KIND: PluginKind = PluginKind::Notification;
    const REQUIRED_FIELDS: &'static [&'static str] = &["url"];
    const COMMON_FIELDS: &'static [&'static str] = &["station"];

    fn build(fields: &PluginFields) -> PluginResult<Self> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            url: fields.required("url")?.to_string(),
            station: fields.get("station").map(str::to_string),
            mode: DispatchMode::Sync,
        })
    }

    fn into_constructed(self) -> Constructed {
        Constructed::Notifier(Box::new(self))
    }
}

register_plugin!(WebhookNotifier, "webhook");
