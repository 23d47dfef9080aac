use tracing::warn;

use super::{default_message, with_station};
use crate::{
    core::plugins::{
        traits::{Constructed, Notifier, Plugin, PluginFactory},
        types::{AlertKey, PluginFields, PluginKind, PluginResult},
    },
    print_warn, register_plugin,
};

/// Writes alerts to the log and the operator console.
pub struct LogNotifier {
    station: Option<String>,
    sensor_message: String,
    output_message: String,
}

impl LogNotifier {
    pub fn message(&self, key: AlertKey) -> String {
        let text = match key {
            AlertKey::Sensor => &self.sensor_message,
            AlertKey::Output => &self.output_message,
        };
        with_station(self.station.as_deref(), text)
    }
}

impl Plugin for LogNotifier {}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send_alert(&self, key: AlertKey) -> PluginResult<bool> {
        let message = self.message(key);
        print_warn!("Alert {}: {}", key, message);
        warn!(alert = %key, "{}", message);
        Ok(true)
    }
}

impl PluginFactory for LogNotifier {
    const KIND: PluginKind = PluginKind::Notification;
    const OPTIONAL_FIELDS: &'static [&'static str] = &["msg_alertsensor", "msg_alertoutput"];
    const COMMON_FIELDS: &'static [&'static str] = &["station"];

    fn build(fields: &PluginFields) -> PluginResult<Self> {
        Ok(Self {
            station: fields.get("station").map(str::to_string),
            sensor_message: fields
                .get_or("msg_alertsensor", default_message(AlertKey::Sensor))
                .to_string(),
            output_message: fields
                .get_or("msg_alertoutput", default_message(AlertKey::Output))
                .to_string(),
        })
    }

    fn into_constructed(self) -> Constructed {
        Constructed::Notifier(Box::new(self))
    }
}

register_plugin!(LogNotifier, "log");
