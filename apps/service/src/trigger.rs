use std::sync::Arc;
use std::time::Duration;

use svcwatch::{CycleOutcome, PollCoordinator, now_millis};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

/// Scan trigger - wakes the coordinator on a fixed cadence
///
/// Every tick spawns a cycle without waiting for it, so a cycle that outlives
/// the period makes the next tick find the coordinator busy.
pub struct ScanTrigger {
    coordinator: Arc<PollCoordinator>,
    period: Duration,
    active: bool,
}

impl ScanTrigger {
    pub fn new(coordinator: Arc<PollCoordinator>, period: Duration) -> Self {
        Self { coordinator, period, active: true }
    }

    /// An inactive trigger never fires
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Fire until `shutdown` flips to true; the first tick is immediate.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if !self.active {
            info!("Monitoring is not active, scan trigger not started");
            return;
        }

        info!("Scan trigger started, period {}s", self.period.as_secs());
        let mut timer = interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = timer.tick() => self.fire(),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Scan trigger stopped");
                        break;
                    }
                }
            }
        }
    }

    fn fire(&self) {
        let coordinator = self.coordinator.clone();

        tokio::spawn(async move {
            match coordinator.run_cycle(now_millis()).await {
                Ok(CycleOutcome::Completed(report)) => {
                    debug!("Cycle finished with {} apply error(s)", report.apply_errors.len())
                }
                Ok(CycleOutcome::Skipped(reason)) => debug!("Cycle skipped: {:?}", reason),
                Err(e) => error!("Scan cycle failed: {}", e),
            }
        });
    }
}
