use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::{HttpProbe, Outcome, Probe};
use crate::error::ProbeFailure;
use crate::settings::MonitorSettings;

/// Probe executor - runs bounded-retry checks of single endpoints
#[derive(Clone)]
pub struct ProbeExecutor {
    probe: Arc<dyn Probe>,
    attempts: u32,
    retry_delay: Duration,
}

impl ProbeExecutor {
    /// Create an executor around any probe implementation
    pub fn new(probe: Arc<dyn Probe>, attempts: u32, retry_delay: Duration) -> Self {
        Self {
            probe,
            attempts: attempts.max(1),
            retry_delay,
        }
    }

    /// Create an HTTP executor from the engine settings
    pub fn http(settings: &MonitorSettings) -> reqwest::Result<Self> {
        let probe = HttpProbe::new(settings.probe_timeout)?;
        Ok(Self::new(Arc::new(probe), settings.retry_attempts, settings.retry_delay))
    }

    /// Check an address, retrying sequentially until the first success.
    ///
    /// Returns the last failure when every attempt failed.
    pub async fn check(&self, address: &str) -> Outcome {
        let mut last_failure = ProbeFailure::Internal("no attempt made".to_string());

        for attempt in 1..=self.attempts {
            debug!("Poll {} attempt {}/{}", address, attempt, self.attempts);

            match self.probe.attempt(address).await {
                Ok(()) => return Outcome::Success,
                Err(failure) => {
                    info!("Poll {} attempt {} failed: {}", address, attempt, failure);
                    last_failure = failure;
                }
            }

            if attempt < self.attempts && !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Outcome::Failure(last_failure)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed list of attempt results
    struct Scripted {
        results: Mutex<VecDeque<Result<(), ProbeFailure>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(results: Vec<Result<(), ProbeFailure>>) -> Arc<Self> {
            Arc::new(Self { results: Mutex::new(results.into()), calls: Mutex::new(0) })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl Probe for Scripted {
        async fn attempt(&self, _address: &str) -> Result<(), ProbeFailure> {
            *self.calls.lock().unwrap() += 1;
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProbeFailure::Transport("script exhausted".to_string())))
        }
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let probe = Scripted::new(vec![Err(ProbeFailure::Status(502)), Ok(()), Ok(())]);
        let executor = ProbeExecutor::new(probe.clone(), 5, Duration::ZERO);

        assert_eq!(executor.check("http://svc").await, Outcome::Success);
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn test_returns_last_failure() {
        let probe = Scripted::new(vec![
            Err(ProbeFailure::Status(503)),
            Err(ProbeFailure::Transport("reset".to_string())),
            Err(ProbeFailure::Status(500)),
        ]);
        let executor = ProbeExecutor::new(probe.clone(), 3, Duration::ZERO);

        assert_eq!(executor.check("http://svc").await, Outcome::Failure(ProbeFailure::Status(500)));
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_probes_once() {
        let probe = Scripted::new(vec![Ok(())]);
        let executor = ProbeExecutor::new(probe.clone(), 0, Duration::ZERO);

        assert_eq!(executor.attempts(), 1);
        assert!(executor.check("http://svc").await.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_attempts() {
        let probe = Scripted::new(vec![
            Err(ProbeFailure::Status(503)),
            Err(ProbeFailure::Status(503)),
            Err(ProbeFailure::Status(503)),
        ]);
        let executor = ProbeExecutor::new(probe, 3, Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        let outcome = executor.check("http://svc").await;

        assert!(!outcome.is_success());
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }
}
