//! Success and failure indicator lights.
//!
//! Each indicator is driven only by the outcome of a cycle and its static
//! policy. A lit indicator is switched off again after a short hold, except
//! a failure indicator with the `constant` policy which stays lit until
//! shutdown.

use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::settings::{IndicatorPolicy, MainConfig};

/// A binary output line.
#[async_trait::async_trait]
pub trait IndicatorPin: Send + Sync {
    async fn set(&mut self, on: bool) -> io::Result<()>;
}

/// GPIO line driven through the sysfs GPIO class.
#[derive(Debug)]
pub struct SysfsGpioPin {
    line: u32,
    value_path: PathBuf,
}

impl SysfsGpioPin {
    /// Exports the line if needed, configures it as an output and drives it
    /// low.
    pub async fn open(root: &Path, line: u32) -> io::Result<Self> {
        let dir = root.join(format!("gpio{}", line));
        if tokio::fs::metadata(&dir).await.is_err() {
            debug!("Exporting GPIO line {} under {}", line, root.display());
            tokio::fs::write(root.join("export"), line.to_string()).await?;
        }
        tokio::fs::write(dir.join("direction"), "out").await?;

        let mut pin = SysfsGpioPin {
            line,
            value_path: dir.join("value"),
        };
        pin.set(false).await?;
        Ok(pin)
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

#[async_trait::async_trait]
impl IndicatorPin for SysfsGpioPin {
    async fn set(&mut self, on: bool) -> io::Result<()> {
        tokio::fs::write(&self.value_path, if on { "1" } else { "0" }).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightState {
    Off,
    LitTransient,
    LitConstant,
}

/// Snapshot of both indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorState {
    pub success_lit: bool,
    pub failure_lit: bool,
    pub success_fired: bool,
    pub failure_fired: bool,
}

struct Indicator {
    label: &'static str,
    pin: Option<Box<dyn IndicatorPin>>,
    policy: IndicatorPolicy,
    state: LightState,
    fired: bool,
}

impl Indicator {
    fn new(label: &'static str, pin: Option<Box<dyn IndicatorPin>>, policy: IndicatorPolicy) -> Self {
        Self {
            label,
            pin,
            policy,
            state: LightState::Off,
            fired: false,
        }
    }

    fn wants_light(&self) -> bool {
        match self.policy {
            IndicatorPolicy::Off => false,
            IndicatorPolicy::First => !self.fired,
            IndicatorPolicy::All | IndicatorPolicy::Constant => true,
        }
    }

    async fn light(&mut self) {
        let Some(pin) = self.pin.as_mut() else {
            return;
        };
        if self.state == LightState::Off {
            if let Err(e) = pin.set(true).await {
                warn!("Failed to switch on {} indicator: {}", self.label, e);
            }
        }
        self.state = if self.policy == IndicatorPolicy::Constant {
            LightState::LitConstant
        } else {
            LightState::LitTransient
        };
        self.fired = true;
    }

    async fn switch_off(&mut self, force: bool) {
        let Some(pin) = self.pin.as_mut() else {
            return;
        };
        if force || self.state != LightState::Off {
            if let Err(e) = pin.set(false).await {
                warn!("Failed to switch off {} indicator: {}", self.label, e);
            }
        }
        self.state = LightState::Off;
    }
}

/// Drives the success and failure indicators from cycle outcomes.
pub struct IndicatorController {
    success: Indicator,
    failure: Indicator,
    hold: Duration,
}

impl IndicatorController {
    /// # Arguments
    /// * `success_pin` / `failure_pin` - `None` disables that indicator
    /// * `hold` - How long a transient light stays on
    pub fn new(
        success_pin: Option<Box<dyn IndicatorPin>>,
        success_policy: IndicatorPolicy,
        failure_pin: Option<Box<dyn IndicatorPin>>,
        failure_policy: IndicatorPolicy,
        hold: Duration,
    ) -> Self {
        Self {
            success: Indicator::new("success", success_pin, success_policy),
            failure: Indicator::new("failure", failure_pin, failure_policy),
            hold,
        }
    }

    /// Opens the sysfs GPIO lines named in `[main]`. Line `0` leaves the
    /// indicator disabled.
    pub async fn from_config(cfg: &MainConfig) -> io::Result<Self> {
        let success_pin = open_line(&cfg.gpio_root, cfg.green_pin).await?;
        let failure_pin = open_line(&cfg.gpio_root, cfg.red_pin).await?;
        Ok(Self::new(
            success_pin,
            cfg.success_led,
            failure_pin,
            cfg.fail_led,
            cfg.indicator_hold(),
        ))
    }

    /// Reflects one cycle outcome, holding transient lights for the hold
    /// period or until `cancel` fires.
    pub async fn apply(&mut self, outputs_healthy: bool, cancel: &CancellationToken) {
        if outputs_healthy {
            if self.success.wants_light() {
                self.success.light().await;
            }
        } else if self.failure.wants_light() {
            self.failure.light().await;
        }

        if self.success.state == LightState::LitTransient
            || self.failure.state == LightState::LitTransient
        {
            tokio::select! {
                _ = tokio::time::sleep(self.hold) => {}
                _ = cancel.cancelled() => debug!("Indicator hold interrupted"),
            }
        }

        self.success.switch_off(false).await;
        if self.failure.policy != IndicatorPolicy::Constant {
            self.failure.switch_off(false).await;
        }
    }

    /// Switches both indicators off whatever their policy.
    pub async fn clear_all(&mut self) {
        self.success.switch_off(true).await;
        self.failure.switch_off(true).await;
    }

    pub fn state(&self) -> IndicatorState {
        IndicatorState {
            success_lit: self.success.state != LightState::Off,
            failure_lit: self.failure.state != LightState::Off,
            success_fired: self.success.fired,
            failure_fired: self.failure.fired,
        }
    }

    pub fn success_light(&self) -> LightState {
        self.success.state
    }

    pub fn failure_light(&self) -> LightState {
        self.failure.state
    }
}

async fn open_line(root: &Path, line: u32) -> io::Result<Option<Box<dyn IndicatorPin>>> {
    if line == 0 {
        return Ok(None);
    }
    let pin = SysfsGpioPin::open(root, line).await?;
    Ok(Some(Box::new(pin)))
}
