//! Song requests — listeners ask for a track, admins prune the list.

use serde::Serialize;
use sqlx::{Row, SqlitePool};
use time::OffsetDateTime;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("song name and artist name are required")]
    MissingFields,
    #[error("song request not found: {0}")]
    NotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for RequestError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingFields => "E_VALIDATION",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SongRequest {
    pub id: i64,
    pub song_name: String,
    pub artist_name: String,
    pub comment: String,
    pub user_id: i64,
    /// Requester's current name.
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn request_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SongRequest, sqlx::Error> {
    Ok(SongRequest {
        id: row.try_get("id")?,
        song_name: row.try_get("song_name")?,
        artist_name: row.try_get("artist_name")?,
        comment: row.try_get("comment")?,
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        created_at: row.try_get("created_at")?,
    })
}

const SELECT_REQUESTS: &str = r"
    SELECT r.id, r.song_name, r.artist_name, r.comment, r.user_id, u.name AS username, r.created_at
    FROM song_requests r
    JOIN users u ON u.id = r.user_id";

/// File a request on behalf of `user_id`.
///
/// # Errors
///
/// `MissingFields` when song or artist is blank after trimming.
pub async fn create(
    pool: &SqlitePool,
    user_id: i64,
    song_name: &str,
    artist_name: &str,
    comment: Option<&str>,
) -> Result<SongRequest, RequestError> {
    let (song_name, artist_name) = (song_name.trim(), artist_name.trim());
    if song_name.is_empty() || artist_name.is_empty() {
        return Err(RequestError::MissingFields);
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO song_requests (song_name, artist_name, comment, user_id, created_at)
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(song_name)
    .bind(artist_name)
    .bind(comment.map(str::trim).unwrap_or_default())
    .bind(user_id)
    .bind(OffsetDateTime::now_utc())
    .fetch_one(pool)
    .await?;

    let row = sqlx::query(&format!("{SELECT_REQUESTS} WHERE r.id = ?"))
        .bind(id)
        .fetch_one(pool)
        .await?;
    info!(request_id = id, user_id, "song request created");
    Ok(request_from_row(&row)?)
}

/// All requests, oldest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list(pool: &SqlitePool) -> Result<Vec<SongRequest>, RequestError> {
    let rows = sqlx::query(&format!("{SELECT_REQUESTS} ORDER BY r.id ASC"))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(request_from_row).collect::<Result<_, _>>()?)
}

/// # Errors
///
/// `NotFound` for an unknown id.
pub async fn delete(pool: &SqlitePool, request_id: i64) -> Result<(), RequestError> {
    let result = sqlx::query("DELETE FROM song_requests WHERE id = ?")
        .bind(request_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound(request_id));
    }
    info!(request_id, "song request deleted");
    Ok(())
}

#[cfg(test)]
#[path = "song_request_test.rs"]
mod tests;
