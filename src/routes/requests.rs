//! Song request routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use super::ApiError;
use super::auth::AuthUser;
use crate::services::song_request::{self, SongRequest};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateRequestBody {
    pub song_name: String,
    pub artist_name: String,
    #[serde(default)]
    pub comment: Option<String>,
}

/// `GET /api/requests` — every request, oldest first.
pub async fn list_requests(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<Vec<SongRequest>>, ApiError> {
    Ok(Json(song_request::list(&state.pool).await?))
}

/// `POST /api/requests` — file a request as the caller.
pub async fn create_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<SongRequest>), ApiError> {
    let created = song_request::create(
        &state.pool,
        auth.user.id,
        &body.song_name,
        &body.artist_name,
        body.comment.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[cfg(test)]
#[path = "requests_test.rs"]
mod tests;
