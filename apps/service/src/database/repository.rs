use std::time::Duration;

use async_trait::async_trait;
use libsql::{Row, params};
use svcwatch::endpoint::{duration_millis, half_interval_millis};
use svcwatch::{
    Endpoint, EndpointCatalog, EndpointId, EndpointStore, FailureAggregate, Millis, NewEndpoint, StoreError,
};

use crate::pool::{LibsqlManager, LibsqlPool};

const ENDPOINT_COLUMNS: &str = "id, name, address, status, last_ok, last_check, notified";

fn backend(error: libsql::Error) -> StoreError {
    StoreError::backend(error)
}

fn endpoint_from_row(row: &Row) -> Result<Endpoint, StoreError> {
    let status: String = row.get(3).map_err(backend)?;

    Ok(Endpoint {
        id: EndpointId(row.get(0).map_err(backend)?),
        name: row.get(1).map_err(backend)?,
        address: row.get(2).map_err(backend)?,
        status: status.parse()?,
        last_ok: row.get(4).map_err(backend)?,
        last_check: row.get(5).map_err(backend)?,
        notified: row.get::<i64>(6).map_err(backend)? != 0,
    })
}

/// libsql implementation of the endpoint store and catalog
pub struct LibsqlStore {
    pool: LibsqlPool,
}

impl LibsqlStore {
    /// Create a store from a pool whose database is already migrated
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Open the database at `path`, migrating it if needed
    pub async fn open(path: &str) -> anyhow::Result<Self> {
        let pool = crate::pool::open(path, 8).await?;
        {
            let conn = pool.get().await?;
            super::initialize_database(&conn).await?;
        }
        Ok(Self::new_from_pool(pool))
    }

    #[cfg(test)]
    pub(crate) fn pool_for_tests(&self) -> &LibsqlPool {
        &self.pool
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>, StoreError> {
        self.pool.get().await.map_err(StoreError::backend)
    }

    async fn query_endpoints(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Vec<Endpoint>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(sql, params).await.map_err(backend)?;

        let mut endpoints = Vec::new();
        while let Some(row) = rows.next().await.map_err(backend)? {
            endpoints.push(endpoint_from_row(&row)?);
        }
        Ok(endpoints)
    }

    /// Run a single-row update, mapping "no row touched" to `NotFound`
    async fn update_one(&self, id: EndpointId, sql: &str, params: impl libsql::params::IntoParams) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        match conn.execute(sql, params).await.map_err(backend)? {
            0 => Err(StoreError::NotFound(id)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl EndpointStore for LibsqlStore {
    async fn list_due(&self, now: Millis, check_interval: Duration) -> Result<Vec<Endpoint>, StoreError> {
        let sql = format!(
            "SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE status = 'FAIL' OR ?1 - last_check > ?2 ORDER BY id"
        );
        self.query_endpoints(&sql, params![now, half_interval_millis(check_interval)]).await
    }

    async fn record_success(&self, id: EndpointId, now: Millis) -> Result<(), StoreError> {
        self.update_one(
            id,
            "UPDATE endpoints SET status = 'OK', last_ok = ?2, last_check = ?2, notified = 0 WHERE id = ?1",
            params![id.0, now],
        )
        .await
    }

    async fn record_failure(&self, id: EndpointId, now: Millis) -> Result<(), StoreError> {
        // MAX keeps last_check >= last_ok if the clock stepped backwards.
        self.update_one(
            id,
            "UPDATE endpoints SET status = 'FAIL', last_check = MAX(?2, last_ok) WHERE id = ?1",
            params![id.0, now],
        )
        .await
    }

    async fn aggregate_failures(&self, now: Millis, react_interval: Duration) -> Result<FailureAggregate, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN ?1 - last_ok > ?2 THEN 1 ELSE 0 END), 0),
                        MIN(last_ok)
                 FROM endpoints WHERE status = 'FAIL'",
                params![now, duration_millis(react_interval)],
            )
            .await
            .map_err(backend)?;

        let row = rows
            .next()
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::Corrupt("aggregate returned no row".to_string()))?;

        Ok(FailureAggregate {
            failing_count: row.get::<i64>(0).map_err(backend)?.max(0) as u64,
            persistent_failing_count: row.get::<i64>(1).map_err(backend)?.max(0) as u64,
            oldest_last_ok: row.get::<Option<i64>>(2).map_err(backend)?,
        })
    }

    async fn mark_notified(&self, now: Millis, older_than: Option<Duration>) -> Result<u64, StoreError> {
        let conn = self.get_conn().await?;
        let marked = match older_than {
            Some(threshold) => conn
                .execute(
                    "UPDATE endpoints SET notified = 1
                     WHERE status = 'FAIL' AND notified = 0 AND ?1 - last_ok > ?2",
                    params![now, duration_millis(threshold)],
                )
                .await,
            None => {
                conn.execute("UPDATE endpoints SET notified = 1 WHERE status = 'FAIL' AND notified = 0", ())
                    .await
            }
        };
        marked.map_err(backend)
    }
}

#[async_trait]
impl EndpointCatalog for LibsqlStore {
    async fn create(&self, endpoint: NewEndpoint) -> Result<Endpoint, StoreError> {
        let conn = self.get_conn().await?;
        let now = svcwatch::now_millis();

        conn.execute(
            "INSERT INTO endpoints (name, address, status, last_ok, last_check, notified, created_at, updated_at)
             VALUES (?1, ?2, 'NEW', 0, 0, 0, ?3, ?3)",
            params![endpoint.name.clone(), endpoint.address.clone(), now],
        )
        .await
        .map_err(backend)?;

        Ok(Endpoint::new(EndpointId(conn.last_insert_rowid()), endpoint))
    }

    async fn update(&self, id: EndpointId, endpoint: NewEndpoint) -> Result<Endpoint, StoreError> {
        self.update_one(
            id,
            "UPDATE endpoints
             SET name = ?2, address = ?3, status = 'NEW', last_ok = 0, last_check = 0, notified = 0, updated_at = ?4
             WHERE id = ?1",
            params![id.0, endpoint.name.clone(), endpoint.address.clone(), svcwatch::now_millis()],
        )
        .await?;

        Ok(Endpoint::new(id, endpoint))
    }

    async fn delete(&self, id: EndpointId) -> Result<(), StoreError> {
        self.update_one(id, "DELETE FROM endpoints WHERE id = ?1", params![id.0]).await
    }

    async fn get(&self, id: EndpointId) -> Result<Option<Endpoint>, StoreError> {
        let sql = format!("SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE id = ?1");
        Ok(self.query_endpoints(&sql, params![id.0]).await?.into_iter().next())
    }

    async fn list(&self) -> Result<Vec<Endpoint>, StoreError> {
        let sql = format!("SELECT {ENDPOINT_COLUMNS} FROM endpoints ORDER BY id");
        self.query_endpoints(&sql, ()).await
    }
}
