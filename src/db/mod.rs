//! Database initialization and migration runner.
//!
//! SYSTEM CONTEXT
//! ==============
//! Startup uses this module to create the shared SQLx pool and enforce schema
//! migrations before accepting websocket/API traffic.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

/// In-memory databases live and die with their connection, so the pool must
/// hold exactly one and never recycle it.
fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Initialize the `SQLite` connection pool and run migrations.
///
/// # Errors
///
/// Returns an error if the URL is malformed, the connection fails, or
/// migrations fail.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let mut options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let memory = is_memory_url(database_url);
    if !memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let mut pool_options = SqlitePoolOptions::new().max_connections(if memory { 1 } else { max_connections.max(1) });
    if memory {
        pool_options = pool_options.idle_timeout(None).max_lifetime(None);
    }

    let pool = pool_options.connect_with(options).await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_urls_are_detected() {
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite://file:chat?mode=memory&cache=shared"));
        assert!(!is_memory_url("sqlite://songboard.db"));
    }

    #[tokio::test]
    async fn init_pool_runs_migrations_in_memory() {
        let pool = init_pool("sqlite::memory:", 5).await.expect("in-memory pool should open");
        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .expect("sqlite_master should be readable");

        for expected in ["access_logs", "chat_messages", "sessions", "song_requests", "users", "ws_tickets"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }
}
