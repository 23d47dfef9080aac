//! Delivery of the cycle record to outputs and of alerts to notifiers.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use super::{
    plugins::{
        loader::{NotificationSet, OutputSet},
        types::AlertKey,
    },
    reading::Reading,
};

/// Sends the record to every output in order.
///
/// Returns `true` only when every output reported success. An output error
/// stops delivery to the outputs after it and makes the result `false`.
pub async fn dispatch(outputs: &OutputSet, readings: &[Reading]) -> bool {
    let mut healthy = true;

    for instance in outputs.iter() {
        match instance.plugin.send(readings).await {
            Ok(true) => debug!("Output {} accepted the record", instance.name()),
            Ok(false) => {
                warn!("Output {} reported a failure", instance.name());
                healthy = false;
            }
            Err(e) => {
                error!("Exception: output {} failed: {}", instance.name(), e);
                return false;
            }
        }
    }

    healthy
}

/// Remembers which alert classes already went out during one cycle.
#[derive(Debug, Default)]
pub struct AlertGate {
    sent: HashSet<AlertKey>,
}

impl AlertGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_fired(&self, key: AlertKey) -> bool {
        self.sent.contains(&key)
    }

    /// Sends `key` to every notifier unless it already went out through
    /// this gate. Returns whether anything was sent.
    pub async fn fire(&mut self, notifiers: &NotificationSet, key: AlertKey) -> bool {
        if !self.sent.insert(key) {
            debug!("Alert {} already sent this cycle", key);
            return false;
        }

        for instance in notifiers.iter() {
            match instance.plugin.send_alert(key).await {
                Ok(true) => info!("Sent {} via {}", key, instance.name()),
                Ok(false) => warn!("Notifier {} could not send {}", instance.name(), key),
                Err(e) => error!("Notifier {} failed to send {}: {}", instance.name(), key, e),
            }
        }

        true
    }
}


#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::{testing::*, *};

    #[tokio::test]
    async fn all_outputs_accepting_is_healthy() {
        let a = ScriptedOutput::new(Reply::Accept);
        let b = ScriptedOutput::new(Reply::Accept);
        let (ra, rb) = (a.received.clone(), b.received.clone());

        let outputs = output_set(vec![("Print", a), ("CSV", b)]);
        assert!(dispatch(&outputs, &[]).await);
        assert_eq!(ra.lock().unwrap().len(), 1);
        assert_eq!(rb.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn a_rejecting_output_does_not_stop_later_outputs() {
        let last = ScriptedOutput::new(Reply::Accept);
        let received = last.received.clone();

        let outputs = output_set(vec![
            ("Upload", ScriptedOutput::new(Reply::Reject)),
            ("Print", last),
        ]);
        assert!(!dispatch(&outputs, &[]).await);
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn a_raising_output_aborts_the_remaining_outputs() {
        let last = ScriptedOutput::new(Reply::Accept);
        let received = last.received.clone();

        let outputs = output_set(vec![
            ("Upload", ScriptedOutput::new(Reply::Raise)),
            ("Print", last),
        ]);
        assert!(!dispatch(&outputs, &[]).await);
        assert!(received.lock().unwrap().is_empty());
        assert!(logs_contain("output Upload failed"));
    }

    #[tokio::test]
    async fn gate_fires_each_key_once_to_every_notifier() {
        let a = RecordingNotifier::new(Reply::Accept);
        let b = RecordingNotifier::new(Reply::Accept);
        let (aa, ab) = (a.alerts.clone(), b.alerts.clone());
        let notifiers = notification_set(vec![("Mail", a), ("Hook", b)]);

        let mut gate = AlertGate::new();
        assert!(gate.fire(&notifiers, AlertKey::Sensor).await);
        assert!(!gate.fire(&notifiers, AlertKey::Sensor).await);
        assert!(gate.fire(&notifiers, AlertKey::Output).await);
        assert!(gate.has_fired(AlertKey::Sensor));

        assert_eq!(*aa.lock().unwrap(), vec![AlertKey::Sensor, AlertKey::Output]);
        assert_eq!(*ab.lock().unwrap(), vec![AlertKey::Sensor, AlertKey::Output]);
    }

    #[tokio::test]
    #[traced_test]
    async fn notifier_failures_are_only_logged() {
        let last = RecordingNotifier::new(Reply::Accept);
        let alerts = last.alerts.clone();
        let notifiers = notification_set(vec![
            ("Broken", RecordingNotifier::new(Reply::Raise)),
            ("Flaky", RecordingNotifier::new(Reply::Reject)),
            ("Mail", last),
        ]);

        let mut gate = AlertGate::new();
        assert!(gate.fire(&notifiers, AlertKey::Output).await);
        assert_eq!(*alerts.lock().unwrap(), vec![AlertKey::Output]);
        assert!(logs_contain("Notifier Broken failed to send alertoutput"));
        assert!(logs_contain("Notifier Flaky could not send alertoutput"));
    }
}
