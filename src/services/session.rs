//! Session and WS-ticket management.
//!
//! ARCHITECTURE
//! ============
//! HTTP auth uses long-lived session tokens carried in an HttpOnly cookie,
//! while websocket upgrades may use one-time short-lived tickets instead of
//! the cookie. Either way, the resolved `ChatUser` is the identity the chat
//! gateway binds to a connection.
//!
//! TRADE-OFFS
//! ==========
//! Session tokens are stored as SHA-256 digests so a leaked database does not
//! leak live sessions. Ticket consumption is destructive
//! (`DELETE ... RETURNING`) to guarantee single use; this favors replay
//! safety over reconnect convenience.

use std::fmt::Write;

use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use time::OffsetDateTime;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Generate a short-lived 16-byte hex WS ticket.
#[must_use]
pub(crate) fn generate_ws_ticket() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Digest under which a session token is stored.
pub(crate) fn hash_token(token: &str) -> String {
    bytes_to_hex(&Sha256::digest(token.as_bytes()))
}

fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

// =============================================================================
// TYPES
// =============================================================================

/// Capability level stored on the user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "member" => Some(Self::Member),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Authenticated identity resolved from a session or ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatUser {
    pub id: i64,
    /// Current display name. Messages keep the name they were sent under.
    pub name: String,
    pub role: Role,
}

pub(crate) fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ChatUser, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(ChatUser {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        // Unknown roles degrade to the least privileged one.
        role: Role::parse(&role).unwrap_or(Role::Member),
    })
}

// =============================================================================
// SESSIONS
// =============================================================================

/// Create a session for the given user, returning the raw token.
pub async fn create_session(pool: &SqlitePool, user_id: i64, ttl_hours: i64) -> Result<String, sqlx::Error> {
    let token = generate_token();
    sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(hash_token(&token))
        .bind(user_id)
        .bind(unix_now() + ttl_hours * 3600)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Resolve a session token to its user. Expired or unknown tokens yield `None`.
pub async fn current_user(pool: &SqlitePool, token: &str) -> Result<Option<ChatUser>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT u.id, u.name, u.role
          FROM sessions s
          JOIN users u ON u.id = s.user_id
          WHERE s.token_hash = ? AND s.expires_at > ?",
    )
    .bind(hash_token(token))
    .bind(unix_now())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Delete a session by token.
pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(hash_token(token))
        .execute(pool)
        .await?;
    Ok(())
}

// =============================================================================
// WS TICKETS
// =============================================================================

/// Create a short-lived WS ticket for the given user.
pub async fn create_ws_ticket(pool: &SqlitePool, user_id: i64, ttl_secs: i64) -> Result<String, sqlx::Error> {
    let ticket = generate_ws_ticket();
    sqlx::query("INSERT INTO ws_tickets (ticket, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(&ticket)
        .bind(user_id)
        .bind(unix_now() + ttl_secs)
        .execute(pool)
        .await?;
    Ok(ticket)
}

/// Consume a WS ticket atomically, returning its user if the ticket was valid.
pub async fn consume_ws_ticket(pool: &SqlitePool, ticket: &str) -> Result<Option<ChatUser>, sqlx::Error> {
    let user_id: Option<i64> =
        sqlx::query_scalar("DELETE FROM ws_tickets WHERE ticket = ? AND expires_at > ? RETURNING user_id")
            .bind(ticket)
            .bind(unix_now())
            .fetch_optional(pool)
            .await?;

    let Some(user_id) = user_id else {
        return Ok(None);
    };
    let row = sqlx::query("SELECT id, name, role FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
