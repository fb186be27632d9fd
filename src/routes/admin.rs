//! Admin panel routes. Every handler takes `AdminUser`, so a missing session
//! is a 401 and a non-admin session is a 403.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::json;

use super::ApiError;
use super::auth::AdminUser;
use crate::services::access_log::{self, AccessLogEntry};
use crate::services::users::{self, UserSummary};
use crate::services::{moderation, song_request};
use crate::state::AppState;

/// `GET /api/admin/users`
pub async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<Vec<UserSummary>>, ApiError> {
    Ok(Json(users::list_users(&state.pool).await?))
}

/// `POST /api/admin/users/{id}/delete` — remove an account; its chat
/// messages stay.
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if admin.id == user_id {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "E_VALIDATION", "cannot delete yourself"));
    }
    users::delete_user(&state.pool, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/admin/access-logs` — newest first.
pub async fn list_access_logs(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<AccessLogEntry>>, ApiError> {
    Ok(Json(access_log::list(&state.pool).await?))
}

/// `POST /api/admin/access-logs/clear`
pub async fn clear_access_logs(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = access_log::clear(&state.pool).await?;
    tracing::info!(user_id = admin.id, removed, "access logs cleared");
    Ok(Json(json!({ "removed": removed })))
}

/// `POST /api/admin/requests/{id}/delete`
pub async fn delete_request(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(request_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    song_request::delete(&state.pool, request_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/admin/messages/clear` — wipe the chat log and broadcast
/// `all_cleared`.
pub async fn clear_messages(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = moderation::clear_all(&state.room, &state.authorizer, &admin).await?;
    Ok(Json(json!({ "removed": removed })))
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
