use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{EndpointCatalog, EndpointStore, FailureAggregate};
use crate::Millis;
use crate::endpoint::{Endpoint, EndpointId, NewEndpoint, Status};
use crate::error::StoreError;

#[derive(Default)]
struct Inner {
    next_id: i64,
    endpoints: BTreeMap<EndpointId, Endpoint>,
}

/// Process-local store, lost on exit
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully specified endpoint, replacing any with the same id.
    pub async fn insert(&self, endpoint: Endpoint) {
        let mut inner = self.inner.write().await;
        inner.next_id = inner.next_id.max(endpoint.id.0);
        inner.endpoints.insert(endpoint.id, endpoint);
    }

    async fn modify<F>(&self, id: EndpointId, change: F) -> Result<Endpoint, StoreError>
    where
        F: FnOnce(&mut Endpoint),
    {
        let mut inner = self.inner.write().await;
        let endpoint = inner.endpoints.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        change(endpoint);
        Ok(endpoint.clone())
    }
}

#[async_trait]
impl EndpointStore for MemoryStore {
    async fn list_due(&self, now: Millis, check_interval: Duration) -> Result<Vec<Endpoint>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .endpoints
            .values()
            .filter(|endpoint| endpoint.is_due(now, check_interval))
            .cloned()
            .collect())
    }

    async fn record_success(&self, id: EndpointId, now: Millis) -> Result<(), StoreError> {
        self.modify(id, |endpoint| endpoint.record_success(now)).await.map(|_| ())
    }

    async fn record_failure(&self, id: EndpointId, now: Millis) -> Result<(), StoreError> {
        self.modify(id, |endpoint| endpoint.record_failure(now)).await.map(|_| ())
    }

    async fn aggregate_failures(&self, now: Millis, react_interval: Duration) -> Result<FailureAggregate, StoreError> {
        let inner = self.inner.read().await;
        let mut aggregate = FailureAggregate::default();

        for endpoint in inner.endpoints.values().filter(|e| e.status == Status::Fail) {
            aggregate.failing_count += 1;
            if endpoint.is_persistently_failing(now, react_interval) {
                aggregate.persistent_failing_count += 1;
            }
            aggregate.oldest_last_ok = Some(match aggregate.oldest_last_ok {
                Some(oldest) => oldest.min(endpoint.last_ok),
                None => endpoint.last_ok,
            });
        }

        Ok(aggregate)
    }

    async fn mark_notified(&self, now: Millis, older_than: Option<Duration>) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let mut marked = 0;

        for endpoint in inner.endpoints.values_mut() {
            let counted = match older_than {
                Some(threshold) => endpoint.is_persistently_failing(now, threshold),
                None => endpoint.status == Status::Fail,
            };
            if counted && !endpoint.notified {
                endpoint.notified = true;
                marked += 1;
            }
        }

        Ok(marked)
    }
}

#[async_trait]
impl EndpointCatalog for MemoryStore {
    async fn create(&self, endpoint: NewEndpoint) -> Result<Endpoint, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let created = Endpoint::new(EndpointId(inner.next_id), endpoint);
        inner.endpoints.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: EndpointId, endpoint: NewEndpoint) -> Result<Endpoint, StoreError> {
        self.modify(id, |existing| {
            existing.name = endpoint.name;
            existing.address = endpoint.address;
            existing.reset();
        })
        .await
    }

    async fn delete(&self, id: EndpointId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.endpoints.remove(&id).map(|_| ()).ok_or(StoreError::NotFound(id))
    }

    async fn get(&self, id: EndpointId) -> Result<Option<Endpoint>, StoreError> {
        Ok(self.inner.read().await.endpoints.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Endpoint>, StoreError> {
        Ok(self.inner.read().await.endpoints.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60_000;

    async fn store_with(entries: &[(Status, Millis, Millis)]) -> MemoryStore {
        let store = MemoryStore::new();
        for (index, (status, last_ok, last_check)) in entries.iter().enumerate() {
            store
                .insert(Endpoint {
                    id: EndpointId(index as i64 + 1),
                    name: format!("svc-{index}"),
                    address: format!("http://svc-{index}.example"),
                    status: *status,
                    last_ok: *last_ok,
                    last_check: *last_check,
                    notified: false,
                })
                .await;
        }
        store
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let a = store.create(NewEndpoint::new("a", "http://a.example").unwrap()).await.unwrap();
        let b = store.create(NewEndpoint::new("b", "http://b.example").unwrap()).await.unwrap();

        assert!(a.id < b.id);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_resets_history() {
        let store = store_with(&[(Status::Fail, 10, 20)]).await;
        let updated = store
            .update(EndpointId(1), NewEndpoint::new("renamed", "https://new.example").unwrap())
            .await
            .unwrap();

        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.status, Status::New);
        assert_eq!((updated.last_ok, updated.last_check), (0, 0));
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.record_success(EndpointId(9), 1).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete(EndpointId(9)).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_aggregate_counts() {
        let now = 500 * MINUTE;
        let store = store_with(&[
            (Status::Fail, now - 120 * MINUTE, now),
            (Status::Fail, now - 5 * MINUTE, now),
            (Status::Ok, now, now),
            (Status::New, 0, 0),
        ])
        .await;

        let aggregate = store.aggregate_failures(now, Duration::from_secs(55 * 60)).await.unwrap();
        assert_eq!(aggregate.failing_count, 2);
        assert_eq!(aggregate.persistent_failing_count, 1);
        assert_eq!(aggregate.oldest_last_ok, Some(now - 120 * MINUTE));
    }

    #[tokio::test]
    async fn test_mark_notified_counts_only_new() {
        let now = 500 * MINUTE;
        let store = store_with(&[(Status::Fail, now - 120 * MINUTE, now), (Status::Fail, now - 5 * MINUTE, now)]).await;
        let react = Some(Duration::from_secs(55 * 60));

        assert_eq!(store.mark_notified(now, react).await.unwrap(), 1);
        assert_eq!(store.mark_notified(now, react).await.unwrap(), 0);
        assert_eq!(store.mark_notified(now, None).await.unwrap(), 1);
    }
}
