//! Escalation engine: turns aggregate endpoint health into an alarm tier.
//!
//! The tier is recomputed from the store every cycle and never persisted, so
//! recovery de-escalates on its own without remembering earlier alerts:
//!
//! - nothing failing: NONE, any active alert is cancelled
//! - failures, none older than the react interval: WEAK, counted by `failing_count`
//! - at least one failure older than the react interval: STRONG, counted by
//!   `persistent_failing_count`

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Millis;
use crate::error::StoreError;
use crate::notify::Notifier;
use crate::store::{EndpointStore, FailureAggregate};

/// Alarm level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    None,
    /// Transient failures: quiet, no sound or vibration
    Weak,
    /// Failures past the react interval: sound, vibration, repeating
    Strong,
}

impl Tier {
    /// Whether the rendering should demand attention (sound, vibration, repeat).
    pub fn is_insistent(&self) -> bool {
        matches!(self, Tier::Strong)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::None => write!(f, "none"),
            Tier::Weak => write!(f, "weak"),
            Tier::Strong => write!(f, "strong"),
        }
    }
}

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub tier: Tier,
    /// Endpoints the alert is about, 0 for NONE
    pub count: u64,
    /// Oldest last success among failing endpoints, used to timestamp the alert
    pub since: Option<Millis>,
}

impl Decision {
    pub fn from_aggregate(aggregate: &FailureAggregate) -> Self {
        let (tier, count) = if aggregate.failing_count == 0 {
            (Tier::None, 0)
        } else if aggregate.persistent_failing_count == 0 {
            (Tier::Weak, aggregate.failing_count)
        } else {
            (Tier::Strong, aggregate.persistent_failing_count)
        };

        Self {
            tier,
            count,
            since: if tier == Tier::None { None } else { aggregate.oldest_last_ok },
        }
    }
}

/// What a notifier is asked to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub tier: Tier,
    pub count: u64,
    pub since: Option<Millis>,
    /// Persistent failures no earlier strong alert had covered, 0 for WEAK
    pub new_failures: u64,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tier {
            Tier::None => write!(f, "All services reachable"),
            Tier::Weak => write!(f, "Problems detected at {} service(s)", self.count),
            Tier::Strong => write!(
                f,
                "{} service(s) down for too long ({} new)",
                self.count, self.new_failures
            ),
        }
    }
}

pub struct EscalationEngine {
    store: Arc<dyn EndpointStore>,
    notifier: Arc<dyn Notifier>,
    react_interval: Duration,
}

impl EscalationEngine {
    pub fn new(store: Arc<dyn EndpointStore>, notifier: Arc<dyn Notifier>, react_interval: Duration) -> Self {
        Self { store, notifier, react_interval }
    }

    /// Compute the tier at `now` without side effects.
    pub async fn evaluate(&self, now: Millis) -> Result<Decision, StoreError> {
        let aggregate = self.store.aggregate_failures(now, self.react_interval).await?;
        debug!(
            failing = aggregate.failing_count,
            persistent = aggregate.persistent_failing_count,
            "Failure aggregate"
        );
        Ok(Decision::from_aggregate(&aggregate))
    }

    /// Evaluate and hand the decision to the notifier.
    ///
    /// Notifier failures are logged; only store failures are returned.
    pub async fn escalate(&self, now: Millis) -> Result<Decision, StoreError> {
        let decision = self.evaluate(now).await?;

        if decision.tier == Tier::None {
            info!("No alarm required, everything is OK");
            if let Err(e) = self.notifier.cancel().await {
                warn!("Failed to cancel alert: {}", e);
            }
            return Ok(decision);
        }

        // Only persistent failures are ever flagged as notified
        let new_failures = match decision.tier {
            Tier::Strong => self.store.mark_notified(now, Some(self.react_interval)).await?,
            _ => 0,
        };

        let alert = Alert {
            tier: decision.tier,
            count: decision.count,
            since: decision.since,
            new_failures,
        };

        match decision.tier {
            Tier::Weak => info!("Weak alarm required, ongoing failures: {}", decision.count),
            _ => info!("Strong alarm required, old failures: {}", decision.count),
        }

        if let Err(e) = self.notifier.raise(&alert).await {
            warn!("Failed to raise {} alert: {}", alert.tier, e);
        }

        Ok(decision)
    }
}
