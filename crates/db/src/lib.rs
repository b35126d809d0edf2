//! Persistence layer: PostgreSQL pool, row models, repositories and the
//! [`Store`](store::Store) abstraction used by the execution core.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;
pub mod store;

pub use store::memory::MemoryStore;
pub use store::postgres::PgStore;
pub use store::{Store, StoreError};

pub type DbPool = sqlx::PgPool;

/// Default upper bound on pooled connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// How long a request waits for a pooled connection before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a connection pool without touching the network.
///
/// Connections are opened on first use, so the server can start and serve
/// its health endpoint while the database is still unreachable.
pub fn create_lazy_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_lazy(database_url)
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// First delay between migration attempts.
const MIGRATION_RETRY_BASE: Duration = Duration::from_secs(1);

/// Longest delay between migration attempts.
const MIGRATION_RETRY_MAX: Duration = Duration::from_secs(60);

/// Delay before migration attempt `attempt + 1`: doubling from one second,
/// capped at one minute.
pub fn migration_backoff(attempt: u32) -> Duration {
    MIGRATION_RETRY_BASE
        .checked_mul(2u32.saturating_pow(attempt))
        .map_or(MIGRATION_RETRY_MAX, |d| d.min(MIGRATION_RETRY_MAX))
}

/// Apply the embedded migrations in `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
