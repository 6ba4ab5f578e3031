//! Error types shared by the core and its collaborators.

use std::time::Duration;

use thiserror::Error;

use crate::endpoint::EndpointId;

/// Why a single probe attempt did not count as healthy.
///
/// Escalation treats every variant the same; the detail is kept for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("unexpected status code {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("probe task failed: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("endpoint {0} not found")]
    NotFound(EndpointId),

    #[error("invalid stored value: {0}")]
    Corrupt(String),

    #[error("storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wrap any backend error (driver, pool, IO).
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(error))
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error("{count} notifier(s) failed: {messages}")]
    Multiple { count: usize, messages: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unsupported scheme for HTTP endpoint: {0}")]
    UnsupportedScheme(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("check interval too short: {0:?} (minimum: {1:?})")]
    IntervalTooShort(Duration, Duration),

    #[error("check interval too long: {0:?} (maximum: {1:?})")]
    IntervalTooLong(Duration, Duration),

    #[error("probe timeout out of range: {0:?} (allowed: {1:?}..={2:?})")]
    TimeoutOutOfRange(Duration, Duration, Duration),

    #[error("retry attempts must be at least 1")]
    NoAttempts,

    #[error("max concurrency must be at least 1 when set")]
    ZeroConcurrency,
}
