//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, the chat room (message store + broadcast
//! hub), the admin capability check, and the loaded configuration.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::services::chat::ChatRoom;
use crate::services::moderation::{Authorizer, RoleAuthorizer};

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub room: ChatRoom,
    /// External admin capability check. Defaults to the stored user role.
    pub authorizer: Arc<dyn Authorizer>,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        Self::with_authorizer(pool, config, Arc::new(RoleAuthorizer))
    }

    #[must_use]
    pub fn with_authorizer(pool: SqlitePool, config: Config, authorizer: Arc<dyn Authorizer>) -> Self {
        Self { room: ChatRoom::new(pool.clone()), pool, authorizer, config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::services::session::{ChatUser, Role, user_from_row};

    /// Fresh in-memory database with every migration applied.
    pub async fn memory_pool() -> SqlitePool {
        crate::db::init_pool("sqlite::memory:", 1)
            .await
            .expect("in-memory pool should open")
    }

    /// Create a test `AppState` backed by its own in-memory database.
    pub async fn test_app_state() -> AppState {
        AppState::new(memory_pool().await, Config::default())
    }

    /// Insert a user row directly, skipping password hashing.
    pub async fn seed_user(state: &AppState, name: &str, role: Role) -> ChatUser {
        let row = sqlx::query(
            "INSERT INTO users (name, password_hash, role, created_at) VALUES (?, 'x', ?, ?)
             RETURNING id, name, role",
        )
        .bind(name)
        .bind(role.as_str())
        .bind(time::OffsetDateTime::now_utc())
        .fetch_one(&state.pool)
        .await
        .expect("seed user insert should succeed");
        user_from_row(&row).expect("seeded row should decode")
    }

    /// `Cookie` header value carrying a fresh session for `user`.
    pub async fn session_cookie(state: &AppState, user: &ChatUser) -> String {
        let token = crate::services::session::create_session(&state.pool, user.id, 1)
            .await
            .expect("session insert should succeed");
        format!("session_token={token}")
    }

    /// A `ChatUser` that exists only in memory (no row).
    #[must_use]
    pub fn dummy_user(id: i64, name: &str) -> ChatUser {
        ChatUser { id, name: name.into(), role: Role::Member }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_state_starts_with_empty_hub() {
        let state = test_helpers::test_app_state().await;
        assert_eq!(state.room.hub().connection_count().await, 0);
        assert!(state.room.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clones_share_the_same_hub() {
        let state = test_helpers::test_app_state().await;
        let clone = state.clone();
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        clone.room.hub().register(uuid::Uuid::new_v4(), 1, tx).await;
        assert_eq!(state.room.hub().connection_count().await, 1);
    }
}
