//! Poll coordinator - runs one scan cycle at a time
//!
//! A cycle selects the due endpoints, probes each of them in its own task,
//! applies every result to the store as it arrives and, once all probes have
//! resolved, runs the escalation engine exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::Millis;
use crate::connectivity::{AlwaysOnline, Connectivity};
use crate::endpoint::{Endpoint, EndpointId};
use crate::error::{ProbeFailure, StoreError};
use crate::escalation::{Decision, EscalationEngine};
use crate::events::{CycleEvent, EventBus};
use crate::keepalive::{KeepAlive, NoKeepAlive};
use crate::notify::Notifier;
use crate::probe::{Outcome, ProbeExecutor};
use crate::settings::MonitorSettings;
use crate::store::EndpointStore;

/// Why a cycle did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipReason {
    /// A previous cycle is still in flight
    Busy,
    /// The connectivity check reported no network
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    Completed(CycleReport),
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::Completed(report) => Some(report),
            CycleOutcome::Skipped(_) => None,
        }
    }
}

/// Summary of a completed cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub now: Millis,
    /// Endpoints selected for probing
    pub due: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures dropped because the network went away meanwhile
    pub discarded: usize,
    /// Endpoints deleted while their probe was in flight
    pub removed: usize,
    /// Results that could not be stored
    pub apply_errors: Vec<(EndpointId, String)>,
    pub decision: Decision,
    pub elapsed: Duration,
}

#[derive(Default)]
struct Tally {
    succeeded: usize,
    failed: usize,
    discarded: usize,
    removed: usize,
    apply_errors: Vec<(EndpointId, String)>,
}

/// Marks a cycle in flight; cleared on drop
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PollCoordinator {
    settings: MonitorSettings,
    store: Arc<dyn EndpointStore>,
    executor: ProbeExecutor,
    engine: EscalationEngine,
    connectivity: Arc<dyn Connectivity>,
    keep_alive: Arc<dyn KeepAlive>,
    limiter: Option<Arc<Semaphore>>,
    in_flight: AtomicBool,
    events: EventBus,
}

impl PollCoordinator {
    /// Create a coordinator that assumes the network is up and needs no keep-alive
    pub fn new(
        settings: MonitorSettings,
        store: Arc<dyn EndpointStore>,
        executor: ProbeExecutor,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let engine = EscalationEngine::new(store.clone(), notifier, settings.react_interval);
        let limiter = settings.max_concurrency.map(|limit| Arc::new(Semaphore::new(limit)));

        Self {
            settings,
            store,
            executor,
            engine,
            connectivity: Arc::new(AlwaysOnline),
            keep_alive: Arc::new(NoKeepAlive),
            limiter,
            in_flight: AtomicBool::new(false),
            events: EventBus::default(),
        }
    }

    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Arc<dyn KeepAlive>) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Whether a cycle is in flight right now
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one scan cycle at `now`.
    ///
    /// Returns `Skipped` without probing anything when another cycle is in
    /// flight or the network is unreachable. Store errors while selecting
    /// endpoints or evaluating escalation abort the cycle; errors applying a
    /// single result are collected in the report.
    pub async fn run_cycle(&self, now: Millis) -> Result<CycleOutcome, StoreError> {
        let _keep_alive = self.keep_alive.acquire();

        let Some(_in_flight) = InFlight::try_acquire(&self.in_flight) else {
            warn!("Not polling: prior cycle still running");
            return Ok(CycleOutcome::Skipped(SkipReason::Busy));
        };

        if !self.connectivity.is_reachable().await {
            warn!("Not polling: network is not connected");
            return Ok(CycleOutcome::Skipped(SkipReason::Offline));
        }

        let started = Instant::now();
        let due = self.store.list_due(now, self.settings.check_interval).await?;
        info!("Scan cycle started: {} endpoint(s) due", due.len());

        let mut probes = FuturesUnordered::new();
        for endpoint in &due {
            debug!("Scheduling check of {} ({})", endpoint.name, endpoint.address);
            probes.push(self.spawn_probe(endpoint.clone()));
        }

        let mut tally = Tally::default();
        while let Some((endpoint, outcome)) = probes.next().await {
            self.apply(&endpoint, outcome, now, &mut tally).await;
        }

        // Every probe has resolved; escalation sees the complete cycle.
        let decision = self.engine.escalate(now).await?;

        let report = CycleReport {
            now,
            due: due.len(),
            succeeded: tally.succeeded,
            failed: tally.failed,
            discarded: tally.discarded,
            removed: tally.removed,
            apply_errors: tally.apply_errors,
            decision,
            elapsed: started.elapsed(),
        };

        info!(
            "Scan cycle completed {} check(s) in {:.2}s: {} ok, {} failed, alarm {}",
            report.due,
            report.elapsed.as_secs_f64(),
            report.succeeded,
            report.failed,
            report.decision.tier
        );

        self.events.publish(CycleEvent::Completed(report.clone()));
        Ok(CycleOutcome::Completed(report))
    }

    /// Probe one endpoint in its own task; a panicking probe resolves as a failure.
    fn spawn_probe(&self, endpoint: Endpoint) -> impl Future<Output = (Endpoint, Outcome)> {
        let executor = self.executor.clone();
        let limiter = self.limiter.clone();
        let address = endpoint.address.clone();

        let handle = tokio::spawn(async move {
            let _permit = match limiter {
                Some(limiter) => limiter.acquire_owned().await.ok(),
                None => None,
            };
            executor.check(&address).await
        });

        async move {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Probe task for {} failed: {}", endpoint.name, e);
                    Outcome::Failure(ProbeFailure::Internal(e.to_string()))
                }
            };
            (endpoint, outcome)
        }
    }

    async fn apply(&self, endpoint: &Endpoint, outcome: Outcome, now: Millis, tally: &mut Tally) {
        let succeeded = matches!(outcome, Outcome::Success);
        let result = match outcome {
            Outcome::Success => {
                info!("Updating {} ({}): OK", endpoint.name, endpoint.id);
                self.store.record_success(endpoint.id, now).await
            }
            Outcome::Failure(reason) => {
                if self.settings.discard_offline_failures && !self.connectivity.is_reachable().await {
                    warn!(
                        "Network is no longer connected, ignoring failure of {}: {}",
                        endpoint.name, reason
                    );
                    tally.discarded += 1;
                    return;
                }
                info!("Updating {} ({}): FAIL ({})", endpoint.name, endpoint.id, reason);
                self.store.record_failure(endpoint.id, now).await
            }
        };

        // Counted only once the store holds the result
        match result {
            Ok(()) if succeeded => tally.succeeded += 1,
            Ok(()) => tally.failed += 1,
            Err(StoreError::NotFound(id)) => {
                info!("Endpoint {} was removed during the cycle, result dropped", id);
                tally.removed += 1;
            }
            Err(e) => {
                error!("Failed to store result for {}: {}", endpoint.name, e);
                tally.apply_errors.push((endpoint.id, e.to_string()));
            }
        }
    }
}
