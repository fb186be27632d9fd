//! Chat message routes — the HTTP twins of the websocket intents.
//!
//! Edits and deletes go through the same `ChatRoom` operations as the
//! websocket, so they validate and broadcast identically.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;

use super::ApiError;
use super::auth::AuthUser;
use crate::services::message::ChatMessage;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct EditBody {
    pub content: String,
}

/// `GET /api/messages` — full history, deleted messages flagged. No auth.
pub async fn list_messages(State(state): State<AppState>) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    Ok(Json(state.room.list_active().await?))
}

/// `GET /api/messages/{id}` — one message, deleted or not. No auth.
pub async fn get_message(State(state): State<AppState>, Path(message_id): Path<i64>) -> Result<Json<ChatMessage>, ApiError> {
    Ok(Json(state.room.get(message_id).await?))
}

/// `POST /api/messages/{id}/edit` — edit one of the caller's messages.
pub async fn edit_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<i64>,
    Json(body): Json<EditBody>,
) -> Result<Json<ChatMessage>, ApiError> {
    let message = state.room.edit_own(&auth.user, message_id, &body.content).await?;
    Ok(Json(message))
}

/// `POST /api/messages/{id}/delete` — soft-delete one of the caller's messages.
pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<i64>,
) -> Result<Json<ChatMessage>, ApiError> {
    let message = state.room.delete_own(&auth.user, message_id).await?;
    Ok(Json(message))
}

#[cfg(test)]
#[path = "messages_test.rs"]
mod tests;
