//! Access log — who hit the API from where. Admin traffic is not recorded.

use serde::Serialize;
use sqlx::{Row, SqlitePool};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub accessed_at: OffsetDateTime,
}

pub async fn record(
    pool: &SqlitePool,
    user_id: i64,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO access_logs (user_id, ip_address, user_agent, accessed_at) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(ip_address)
        .bind(user_agent)
        .bind(OffsetDateTime::now_utc())
        .execute(pool)
        .await?;
    Ok(())
}

/// Newest first.
pub async fn list(pool: &SqlitePool) -> Result<Vec<AccessLogEntry>, sqlx::Error> {
    let rows = sqlx::query(
        r"SELECT l.id, l.user_id, u.name AS username, l.ip_address, l.user_agent, l.accessed_at
          FROM access_logs l
          JOIN users u ON u.id = l.user_id
          ORDER BY l.id DESC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| -> Result<AccessLogEntry, sqlx::Error> {
            Ok(AccessLogEntry {
                id: r.try_get("id")?,
                user_id: r.try_get("user_id")?,
                username: r.try_get("username")?,
                ip_address: r.try_get("ip_address")?,
                user_agent: r.try_get("user_agent")?,
                accessed_at: r.try_get("accessed_at")?,
            })
        })
        .collect()
}

/// Returns the number of entries removed.
pub async fn clear(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM access_logs").execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
#[path = "access_log_test.rs"]
mod tests;
