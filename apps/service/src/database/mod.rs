/// Persistent endpoint store
///
/// Endpoints live in a local libsql (SQLite) file reached through a
/// deadpool connection pool. Every engine update is a single statement.
pub mod migrations;
pub mod repository;


pub use repository::LibsqlStore;

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
