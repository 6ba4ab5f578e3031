//! HTTP probe attempt.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tracing::debug;

use super::Probe;
use crate::error::ProbeFailure;

/// HTTP checker
///
/// Issues a GET and looks at the status line only; the body is never read.
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()?;

        Ok(Self { client, timeout })
    }

    fn classify(&self, error: reqwest::Error) -> ProbeFailure {
        if error.is_timeout() {
            ProbeFailure::Timeout(self.timeout)
        } else {
            ProbeFailure::Transport(error.to_string())
        }
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn attempt(&self, address: &str) -> Result<(), ProbeFailure> {
        let start = Instant::now();

        let response = self.client.get(address).send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        // Dropping the response closes the connection without reading the body.
        drop(response);

        debug!("Probe {} answered {} in {}ms", address, status.as_u16(), start.elapsed().as_millis());

        // Only 200 counts, redirects are followed by the client.
        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(ProbeFailure::Status(status.as_u16()))
        }
    }
}
