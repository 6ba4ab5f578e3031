/// Storage seams used by the poll coordinator and the escalation engine
///
/// The engine only needs single-row atomic updates; whole-cycle transactions
/// are never required.
pub mod memory;

pub use memory::MemoryStore;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Millis;
use crate::endpoint::{Endpoint, EndpointId, NewEndpoint};
use crate::error::StoreError;

/// Failure counts over all endpoints at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureAggregate {
    /// Endpoints with status FAIL
    pub failing_count: u64,
    /// Failing endpoints whose last success is older than the react interval
    pub persistent_failing_count: u64,
    /// Smallest `last_ok` among failing endpoints, `None` when nothing fails
    pub oldest_last_ok: Option<Millis>,
}

/// Health records as seen by the engine
#[async_trait]
pub trait EndpointStore: Send + Sync {
    /// Endpoints that a cycle at `now` has to probe, ordered by id
    async fn list_due(&self, now: Millis, check_interval: Duration) -> Result<Vec<Endpoint>, StoreError>;

    /// Mark a successful probe: OK, `last_ok = last_check = now`, not notified
    async fn record_success(&self, id: EndpointId, now: Millis) -> Result<(), StoreError>;

    /// Mark a failed probe: FAIL, `last_check = now`, rest untouched
    async fn record_failure(&self, id: EndpointId, now: Millis) -> Result<(), StoreError>;

    async fn aggregate_failures(&self, now: Millis, react_interval: Duration) -> Result<FailureAggregate, StoreError>;

    /// Flag failing endpoints as notified and return how many were not flagged yet.
    ///
    /// With `older_than` only endpoints failing for longer than that are flagged.
    async fn mark_notified(&self, now: Millis, older_than: Option<Duration>) -> Result<u64, StoreError>;
}

/// Endpoint administration, the edit side of the store
#[async_trait]
pub trait EndpointCatalog: Send + Sync {
    async fn create(&self, endpoint: NewEndpoint) -> Result<Endpoint, StoreError>;

    /// Replace name and address; probe history is reset so the endpoint is re-probed.
    async fn update(&self, id: EndpointId, endpoint: NewEndpoint) -> Result<Endpoint, StoreError>;

    async fn delete(&self, id: EndpointId) -> Result<(), StoreError>;

    async fn get(&self, id: EndpointId) -> Result<Option<Endpoint>, StoreError>;

    /// All endpoints ordered by id
    async fn list(&self) -> Result<Vec<Endpoint>, StoreError>;
}
