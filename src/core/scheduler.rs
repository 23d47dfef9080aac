//! Drift-corrected cycle driver.
//!
//! Cycles start on a fixed cadence measured from the start of the previous
//! cycle, so the time a cycle spends working does not push later cycles
//! back. Time is taken from the monotonic tokio clock.

use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Slack subtracted from the interval so a tick landing a hair early still
/// counts as due.
pub const SCHEDULE_MARGIN: Duration = Duration::from_millis(10);

/// Stand-in deadline for intervals too long to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// One acquisition pass, run by the scheduler on every due tick.
#[async_trait::async_trait]
pub trait CycleRunner: Send {
    async fn run_cycle(&mut self, cancel: &CancellationToken);
}

pub struct SamplingScheduler {
    interval: Duration,
    margin: Duration,
    last_run: Option<Instant>,
    cycles: u64,
}

impl SamplingScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            margin: SCHEDULE_MARGIN,
            last_run: None,
            cycles: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start of the most recent cycle, `None` before the first one.
    pub fn last_run(&self) -> Option<Instant> {
        self.last_run
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_run {
            None => true,
            Some(last) => now.saturating_duration_since(last) + self.margin >= self.interval,
        }
    }

    /// Earliest instant the next cycle may start.
    fn next_deadline(&self, now: Instant) -> Instant {
        match self.last_run {
            None => now,
            Some(last) => last
                .checked_add(self.interval.saturating_sub(self.margin))
                .unwrap_or_else(|| now + FAR_FUTURE),
        }
    }

    /// Runs cycles until `cancel` fires.
    ///
    /// Cancellation is observed between cycles and while sleeping; a cycle
    /// in progress is handed the same token and decides itself where it
    /// can stop.
    pub async fn run<R>(&mut self, runner: &mut R, cancel: &CancellationToken)
    where
        R: CycleRunner + ?Sized,
    {
        info!(
            "Sampling started (interval: {:.3}s)",
            self.interval.as_secs_f64()
        );

        while !cancel.is_cancelled() {
            let tick = Instant::now();
            if self.is_due(tick) {
                self.last_run = Some(tick);
                self.cycles += 1;
                trace!("Starting cycle {}", self.cycles);
                runner.run_cycle(cancel).await;
                debug!("Cycle {} took {:?}", self.cycles, tick.elapsed());
            }

            let deadline = self.next_deadline(tick);
            tokio::select! {
                _ = sleep_until(deadline) => {}
                _ = cancel.cancelled() => break,
            }
        }

        info!("Sampling stopped after {} cycles", self.cycles);
    }
}
