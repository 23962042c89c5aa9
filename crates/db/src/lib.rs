//! Postgres persistence for practice sessions.
//!
//! Models and zero-sized repositories follow the usual layout; on top of
//! them [`PgPracticeStore`] and [`PgSharedCache`] implement the storage and
//! shared-cache seams from `examprep_core`.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub mod cache;
pub mod error;
pub mod models;
pub mod repositories;
pub mod store;

pub use cache::PgSharedCache;
pub use store::PgPracticeStore;

pub type DbPool = sqlx::PgPool;

/// How long a caller waits for a free pooled connection before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}

/// Run a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
