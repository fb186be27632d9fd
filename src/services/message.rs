//! Message store — durable append-only chat log.
//!
//! DESIGN
//! ======
//! Messages are appended with a store-assigned id (`AUTOINCREMENT`, so ids
//! are strictly increasing and never reused). Edits rewrite `content` in
//! place and stamp `edited_at`; deletes only flip the `deleted` flag, which
//! never reverts. Listing returns deleted rows too so clients can reconcile
//! edit/delete events against history they already hold.
//!
//! Ownership is checked here, per row. The only path that skips it is
//! `clear_all`, which is reachable solely through the admin-guarded
//! moderation service.
//!
//! ERROR HANDLING
//! ==============
//! Every mutation is a single write statement, so it is atomic on its own
//! and takes the write lock up front. Ownership is part of the `WHERE`
//! clause; the row is only read back to explain a write that matched
//! nothing. A read-then-write transaction would fail with a stale snapshot
//! whenever another connection commits in between.

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use time::OffsetDateTime;

// =============================================================================
// TYPES
// =============================================================================

/// One chat message. Serialized with the wire field names clients see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    #[serde(rename = "message_id")]
    pub id: i64,
    #[serde(rename = "user_id")]
    pub author_id: i64,
    /// Display name snapshot taken when the message was sent.
    #[serde(rename = "username")]
    pub author_name: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub edited_at: Option<OffsetDateTime>,
    pub deleted: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("message content is empty")]
    EmptyContent,
    #[error("message not found: {0}")]
    NotFound(i64),
    #[error("user {user_id} does not own message {message_id}")]
    NotOwner { message_id: i64, user_id: i64 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyContent => "E_VALIDATION",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::NotOwner { .. } => "E_PERMISSION",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Handle to the `chat_messages` table. Cheap to clone.
#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

// =============================================================================
// ROW MAPPING
// =============================================================================

fn message_from_row(row: &SqliteRow) -> Result<ChatMessage, sqlx::Error> {
    Ok(ChatMessage {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        author_name: row.try_get("author_name")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        edited_at: row.try_get("edited_at")?,
        deleted: row.try_get("deleted")?,
    })
}

async fn fetch_message<'e, E>(executor: E, message_id: i64) -> Result<Option<ChatMessage>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        "SELECT id, author_id, author_name, content, created_at, edited_at, deleted
         FROM chat_messages WHERE id = ?",
    )
    .bind(message_id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(message_from_row).transpose()
}

// =============================================================================
// OPERATIONS
// =============================================================================

impl MessageStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a new message. `content` is stored as given; only the
    /// emptiness check trims it.
    ///
    /// # Errors
    ///
    /// `EmptyContent` if `content` is blank, `Database` on write failure.
    pub async fn append(&self, author_id: i64, author_name: &str, content: &str) -> Result<ChatMessage, StoreError> {
        if content.trim().is_empty() {
            return Err(StoreError::EmptyContent);
        }

        let row = sqlx::query(
            "INSERT INTO chat_messages (author_id, author_name, content, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, author_id, author_name, content, created_at, edited_at, deleted",
        )
        .bind(author_id)
        .bind(author_name)
        .bind(content)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await?;

        Ok(message_from_row(&row)?)
    }

    /// Replace the content of a message owned by `requester_id`.
    ///
    /// Deleted messages may still be edited; the `deleted` flag is untouched.
    ///
    /// # Errors
    ///
    /// Checked in order: `NotFound`, `NotOwner`, `EmptyContent`. A non-author
    /// therefore always gets `NotOwner`, whatever the new content.
    pub async fn edit(&self, message_id: i64, requester_id: i64, new_content: &str) -> Result<ChatMessage, StoreError> {
        let content = new_content.trim();
        if !content.is_empty() {
            let row = sqlx::query(
                "UPDATE chat_messages SET content = ?, edited_at = ? WHERE id = ? AND author_id = ?
                 RETURNING id, author_id, author_name, content, created_at, edited_at, deleted",
            )
            .bind(content)
            .bind(OffsetDateTime::now_utc())
            .bind(message_id)
            .bind(requester_id)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(row) = row {
                return Ok(message_from_row(&row)?);
            }
        }

        self.owned(message_id, requester_id).await?;
        Err(StoreError::EmptyContent)
    }

    /// Mark a message owned by `requester_id` as deleted. Idempotent:
    /// deleting an already-deleted message returns it unchanged.
    ///
    /// The flag is `true` only when this call flipped `deleted`.
    ///
    /// # Errors
    ///
    /// `NotFound` or `NotOwner`, checked in that order.
    pub async fn soft_delete(&self, message_id: i64, requester_id: i64) -> Result<(ChatMessage, bool), StoreError> {
        let row = sqlx::query(
            "UPDATE chat_messages SET deleted = 1 WHERE id = ? AND author_id = ? AND deleted = 0
             RETURNING id, author_id, author_name, content, created_at, edited_at, deleted",
        )
        .bind(message_id)
        .bind(requester_id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = row {
            return Ok((message_from_row(&row)?, true));
        }

        let current = self.owned(message_id, requester_id).await?;
        Ok((current, false))
    }

    /// Current row, provided it exists and belongs to `requester_id`.
    async fn owned(&self, message_id: i64, requester_id: i64) -> Result<ChatMessage, StoreError> {
        let current = fetch_message(&self.pool, message_id)
            .await?
            .ok_or(StoreError::NotFound(message_id))?;
        if current.author_id != requester_id {
            return Err(StoreError::NotOwner { message_id, user_id: requester_id });
        }
        Ok(current)
    }

    /// Every message, deleted ones included, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, author_id, author_name, content, created_at, edited_at, deleted
             FROM chat_messages ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// Look up a single message.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails.
    pub async fn get(&self, message_id: i64) -> Result<Option<ChatMessage>, StoreError> {
        Ok(fetch_message(&self.pool, message_id).await?)
    }

    /// Hard-delete every message. Returns the number of rows removed.
    ///
    /// No ownership checks: callers must have verified the admin capability.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the delete fails.
    pub(crate) async fn clear_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM chat_messages").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
