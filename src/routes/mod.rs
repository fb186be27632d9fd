//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the HTTP API and the chat websocket under a single Axum
//! router. Every request passes through the access-log middleware and the
//! tower-http trace layer.
//!
//! ERROR HANDLING
//! ==============
//! Handlers return `ApiError`, which renders `{"code", "message"}` with an
//! HTTP status derived from the service error's grepable code.

pub mod access;
pub mod admin;
pub mod auth;
pub mod messages;
pub mod requests;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::frame::ErrorCode;
use crate::services::chat::ChatError;
use crate::services::song_request::RequestError;
use crate::services::users::UserError;
use crate::state::AppState;

// =============================================================================
// ROUTER
// =============================================================================

/// Full application router: JSON API, websocket, health check.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me).patch(auth::update_me))
        .route("/api/auth/ws-ticket", post(auth::ws_ticket))
        .route("/api/messages", get(messages::list_messages))
        .route("/api/messages/{id}", get(messages::get_message))
        .route("/api/messages/{id}/edit", post(messages::edit_message))
        .route("/api/messages/{id}/delete", post(messages::delete_message))
        .route("/api/requests", get(requests::list_requests).post(requests::create_request))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/{id}/delete", post(admin::delete_user))
        .route("/api/admin/access-logs", get(admin::list_access_logs))
        .route("/api/admin/access-logs/clear", post(admin::clear_access_logs))
        .route("/api/admin/requests/{id}/delete", post(admin::delete_request))
        .route("/api/admin/messages/clear", post(admin::clear_messages))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(middleware::from_fn_with_state(state.clone(), access::record_access))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// API ERROR
// =============================================================================

/// JSON error response shared by every HTTP handler.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E_AUTH", "authentication required")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "E_FORBIDDEN", "admin capability required")
    }

    pub fn internal(err: &impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "api: internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "E_INTERNAL", "internal error")
    }

    /// Map a typed service error onto a status through its error code.
    fn from_code(err: &impl ErrorCode) -> Self {
        let status = status_for_code(err.error_code());
        if status.is_server_error() {
            tracing::error!(error = %err, code = err.error_code(), "api: service failure");
        }
        Self::new(status, err.error_code(), err.to_string())
    }
}

pub(crate) fn status_for_code(code: &str) -> StatusCode {
    match code {
        "E_VALIDATION" => StatusCode::BAD_REQUEST,
        "E_AUTH" => StatusCode::UNAUTHORIZED,
        "E_PERMISSION" | "E_FORBIDDEN" => StatusCode::FORBIDDEN,
        "E_NOT_FOUND" => StatusCode::NOT_FOUND,
        "E_CONFLICT" => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "code": self.code, "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self::from_code(&err)
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        Self::from_code(&err)
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        Self::from_code(&err)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::internal(&err)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
