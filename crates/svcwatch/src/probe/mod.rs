/// Probe module - checks a single endpoint
///
/// - `http`: one HTTP attempt, classified by status code
/// - `executor`: bounded sequential retries around an attempt
pub mod executor;
pub mod http;

pub use executor::ProbeExecutor;
pub use http::HttpProbe;

use crate::error::ProbeFailure;

/// Classified result of checking one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(ProbeFailure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl From<Result<(), ProbeFailure>> for Outcome {
    fn from(result: Result<(), ProbeFailure>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(failure) => Outcome::Failure(failure),
        }
    }
}

/// A single attempt against an address
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Perform one attempt; `Ok` only when the endpoint is healthy
    async fn attempt(&self, address: &str) -> Result<(), ProbeFailure>;
}
