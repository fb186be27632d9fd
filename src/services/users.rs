//! Account service — registration, login, credential changes, admin listing.
//!
//! Passwords are hashed with Argon2id and a random salt. Renaming a user
//! never touches `chat_messages.author_name`: messages keep the name they
//! were sent under.

use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use time::OffsetDateTime;
use tracing::info;

use super::session::{ChatUser, Role, user_from_row};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("username and password are required")]
    MissingCredentials,
    #[error("username already taken: {0}")]
    NameTaken(String),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("user not found: {0}")]
    NotFound(i64),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for UserError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "E_VALIDATION",
            Self::NameTaken(_) => "E_CONFLICT",
            Self::InvalidCredentials => "E_AUTH",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Hash(_) => "E_INTERNAL",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// User row as shown in the admin panel.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Requested credential change. `None` or blank fields are left alone.
#[derive(Debug, Default)]
pub struct CredentialChange<'a> {
    pub current_password: &'a str,
    pub new_name: Option<&'a str>,
    pub new_password: Option<&'a str>,
}

// =============================================================================
// PASSWORDS
// =============================================================================

fn hash_password(password: &str) -> Result<String, UserError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| UserError::Hash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Create a member account. Name and password are trimmed.
///
/// # Errors
///
/// `MissingCredentials` when either is blank, `NameTaken` on a duplicate name.
pub async fn register(pool: &SqlitePool, name: &str, password: &str) -> Result<ChatUser, UserError> {
    let (name, password) = (name.trim(), password.trim());
    if name.is_empty() || password.is_empty() {
        return Err(UserError::MissingCredentials);
    }

    let hash = hash_password(password)?;
    let row = sqlx::query(
        "INSERT INTO users (name, password_hash, role, created_at) VALUES (?, ?, ?, ?)
         RETURNING id, name, role",
    )
    .bind(name)
    .bind(hash)
    .bind(Role::Member.as_str())
    .bind(OffsetDateTime::now_utc())
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            UserError::NameTaken(name.to_owned())
        } else {
            UserError::Database(e)
        }
    })?;

    let user = user_from_row(&row)?;
    info!(user_id = user.id, name = %user.name, "user registered");
    Ok(user)
}

/// Check a name/password pair.
///
/// # Errors
///
/// `InvalidCredentials` for an unknown name or a wrong password.
pub async fn authenticate(pool: &SqlitePool, name: &str, password: &str) -> Result<ChatUser, UserError> {
    let row = sqlx::query("SELECT id, name, role, password_hash FROM users WHERE name = ?")
        .bind(name.trim())
        .fetch_optional(pool)
        .await?
        .ok_or(UserError::InvalidCredentials)?;

    let hash: String = row.try_get("password_hash")?;
    if !verify_password(password.trim(), &hash) {
        return Err(UserError::InvalidCredentials);
    }
    Ok(user_from_row(&row)?)
}

/// Change the caller's name and/or password after re-checking the current
/// password.
///
/// # Errors
///
/// `InvalidCredentials` if the current password is wrong, `NameTaken` if the
/// new name belongs to someone else.
pub async fn update_credentials(
    pool: &SqlitePool,
    user_id: i64,
    change: &CredentialChange<'_>,
) -> Result<ChatUser, UserError> {
    let hash: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(UserError::NotFound(user_id))?;
    if !verify_password(change.current_password.trim(), &hash) {
        return Err(UserError::InvalidCredentials);
    }

    let new_name = change.new_name.map(str::trim).filter(|n| !n.is_empty());
    let new_hash = match change.new_password.map(str::trim).filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let row = sqlx::query(
        "UPDATE users
         SET name = COALESCE(?, name), password_hash = COALESCE(?, password_hash)
         WHERE id = ?
         RETURNING id, name, role",
    )
    .bind(new_name)
    .bind(new_hash)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            UserError::NameTaken(new_name.unwrap_or_default().to_owned())
        } else {
            UserError::Database(e)
        }
    })?;

    Ok(user_from_row(&row)?)
}

/// Every account, oldest first.
///
/// # Errors
///
/// Returns `Database` if the query fails.
pub async fn list_users(pool: &SqlitePool) -> Result<Vec<UserSummary>, UserError> {
    let rows = sqlx::query("SELECT id, name, role, created_at FROM users ORDER BY id ASC")
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|r| -> Result<UserSummary, UserError> {
            let role: String = r.try_get("role")?;
            Ok(UserSummary {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
                role: Role::parse(&role).unwrap_or(Role::Member),
                created_at: r.try_get("created_at")?,
            })
        })
        .collect()
}

/// Delete an account. Sessions, tickets, song requests and access logs go
/// with it; chat messages stay.
///
/// # Errors
///
/// `NotFound` if no such user exists.
pub async fn delete_user(pool: &SqlitePool, user_id: i64) -> Result<String, UserError> {
    let name: Option<String> = sqlx::query_scalar("DELETE FROM users WHERE id = ? RETURNING name")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    let name = name.ok_or(UserError::NotFound(user_id))?;
    info!(user_id, %name, "user deleted");
    Ok(name)
}

/// Create `name` if missing, then force its role to admin. Used for the
/// startup `BOOTSTRAP_ADMIN` account.
///
/// # Errors
///
/// Propagates registration and database failures.
pub async fn ensure_admin(pool: &SqlitePool, name: &str, password: &str) -> Result<ChatUser, UserError> {
    match register(pool, name, password).await {
        Ok(_) | Err(UserError::NameTaken(_)) => {}
        Err(e) => return Err(e),
    }

    let row = sqlx::query("UPDATE users SET role = ? WHERE name = ? RETURNING id, name, role")
        .bind(Role::Admin.as_str())
        .bind(name.trim())
        .fetch_one(pool)
        .await?;
    let user = user_from_row(&row)?;
    info!(user_id = user.id, name = %user.name, "admin account ensured");
    Ok(user)
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;
