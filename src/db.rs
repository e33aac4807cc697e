//! SQLite connection pool construction.
//!
//! Grounded in the teacher's `infrastructure::database::connection`: WAL
//! mode, foreign keys on, a busy timeout so the optimistic claim retries
//! in [`crate::queue`] don't spin hot against `SQLITE_BUSY`, and a
//! configurable pool matching `database.pool.*` (§6).

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

use crate::config::PoolConfig;

/// Open a SQLite pool at `database_url` (e.g. `sqlite::memory:` or
/// `sqlite:/var/lib/registry/gc.db`) with the pragmas this crate's
/// concurrency model relies on.
pub async fn connect(database_url: &str, pool_config: &PoolConfig) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .min_connections(pool_config.max_idle)
        .max_connections(pool_config.max_open)
        .max_lifetime(pool_config.max_lifetime)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}
