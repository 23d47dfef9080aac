//! The state one running station owns, and the cycle that drives it.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{
    aggregator,
    dispatch::{self, AlertGate},
    indicator::IndicatorController,
    plugins::{
        loader::{NotificationSet, OutputSet, SensorSet},
        types::AlertKey,
    },
    scheduler::CycleRunner,
};
use crate::print_error;

/// Health classification of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    pub sensors_healthy: bool,
    pub outputs_healthy: bool,
}

/// Everything a cycle reads or mutates: the plugin sets, the indicators
/// and the per-process settings. Owned by the scheduler's caller; nothing
/// else writes to it.
pub struct ServiceContext {
    pub sensors: SensorSet,
    pub outputs: OutputSet,
    pub notifications: NotificationSet,
    pub indicators: IndicatorController,
    /// Echo per-cycle failures to the operator console.
    pub print_errors: bool,
    last_outcome: Option<CycleOutcome>,
}

impl ServiceContext {
    pub fn new(
        sensors: SensorSet,
        outputs: OutputSet,
        notifications: NotificationSet,
        indicators: IndicatorController,
        print_errors: bool,
    ) -> Self {
        Self {
            sensors,
            outputs,
            notifications,
            indicators,
            print_errors,
            last_outcome: None,
        }
    }

    pub fn last_outcome(&self) -> Option<CycleOutcome> {
        self.last_outcome
    }

    /// Runs one full pass: read sensors, raise the sensor alert if needed,
    /// dispatch, raise the output alert if needed, then drive indicators.
    pub async fn cycle(&mut self, cancel: &CancellationToken) -> CycleOutcome {
        let mut alerts = AlertGate::new();

        let aggregation = aggregator::collect(&self.sensors).await;
        if aggregation.sensors_healthy {
            info!("Success: Data obtained from all sensors.");
        } else {
            alerts.fire(&self.notifications, AlertKey::Sensor).await;
            self.report("Failed to obtain data from all sensors.");
        }

        let outputs_healthy = dispatch::dispatch(&self.outputs, &aggregation.readings).await;
        if outputs_healthy {
            info!("Success: Data output in all requested formats.");
        } else {
            alerts.fire(&self.notifications, AlertKey::Output).await;
            self.report("Failed to output in all requested formats.");
        }

        self.indicators.apply(outputs_healthy, cancel).await;

        let outcome = CycleOutcome {
            sensors_healthy: aggregation.sensors_healthy,
            outputs_healthy,
        };
        self.last_outcome = Some(outcome);
        outcome
    }

    /// Stops every sensor, then switches both indicators off.
    pub async fn shutdown(&mut self) {
        for instance in self.sensors.iter() {
            instance.plugin.stop().await;
        }
        self.indicators.clear_all().await;
        info!("Sensors stopped and indicators cleared");
    }

    fn report(&self, msg: &str) {
        if self.print_errors {
            print_error!("{}", msg);
        }
        error!("{}", msg);
    }
}

#[async_trait::async_trait]
impl CycleRunner for ServiceContext {
    async fn run_cycle(&mut self, cancel: &CancellationToken) {
        self.cycle(cancel).await;
    }
}
