/// Notifiers render escalation decisions
///
/// The engine calls `raise` every cycle while something fails (a refresh of
/// the same alert) and `cancel` every cycle while nothing does.
pub mod log;
pub mod webhook;

pub use log::LogNotifier;
pub use webhook::WebhookNotifier;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::escalation::Alert;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show or refresh the alert
    async fn raise(&self, alert: &Alert) -> Result<(), NotifyError>;

    /// Remove any active alert
    async fn cancel(&self) -> Result<(), NotifyError>;
}

/// Forwards every call to all inner notifiers
#[derive(Default, Clone)]
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    fn collect(results: Vec<Result<(), NotifyError>>) -> Result<(), NotifyError> {
        let errors: Vec<String> = results.into_iter().filter_map(|r| r.err()).map(|e| e.to_string()).collect();

        match errors.len() {
            0 => Ok(()),
            count => Err(NotifyError::Multiple { count, messages: errors.join("; ") }),
        }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn raise(&self, alert: &Alert) -> Result<(), NotifyError> {
        let results = futures::future::join_all(self.notifiers.iter().map(|n| n.raise(alert))).await;
        Self::collect(results)
    }

    async fn cancel(&self) -> Result<(), NotifyError> {
        let results = futures::future::join_all(self.notifiers.iter().map(|n| n.cancel())).await;
        Self::collect(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::Tier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        raised: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for Counting {
        async fn raise(&self, _alert: &Alert) -> Result<(), NotifyError> {
            self.raised.fetch_add(1, Ordering::SeqCst);
            if self.fail { Err(NotifyError::Delivery("down".to_string())) } else { Ok(()) }
        }

        async fn cancel(&self) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fanout_reaches_all_and_collects_errors() {
        let ok = Arc::new(Counting { raised: AtomicUsize::new(0), fail: false });
        let broken = Arc::new(Counting { raised: AtomicUsize::new(0), fail: true });
        let fanout = FanoutNotifier::new().with(ok.clone()).with(broken.clone());

        let alert = Alert { tier: Tier::Weak, count: 1, since: None, new_failures: 1 };
        let result = fanout.raise(&alert).await;

        assert_eq!(ok.raised.load(Ordering::SeqCst), 1);
        assert_eq!(broken.raised.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(NotifyError::Multiple { count: 1, .. })));
        assert!(fanout.cancel().await.is_ok());
    }
}
