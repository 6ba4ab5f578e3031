//! Network reachability checks gating scan cycles.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

#[async_trait]
pub trait Connectivity: Send + Sync {
    /// Whether probing makes sense right now
    async fn is_reachable(&self) -> bool;
}

/// Assumes the network is always there
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

#[async_trait]
impl Connectivity for AlwaysOnline {
    async fn is_reachable(&self) -> bool {
        true
    }
}

/// Considers the network up when a TCP handshake with a known host succeeds
#[derive(Debug, Clone)]
pub struct TcpConnectivity {
    target: String,
    timeout: Duration,
}

impl TcpConnectivity {
    /// `target` is a `host:port` pair, e.g. a public DNS resolver on port 53.
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self { target: target.into(), timeout }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl Connectivity for TcpConnectivity {
    async fn is_reachable(&self) -> bool {
        match timeout(self.timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Connectivity check to {} failed: {}", self.target, e);
                false
            }
            Err(_) => {
                debug!("Connectivity check to {} timed out", self.target);
                false
            }
        }
    }
}
