//! Auth routes — registration, password login, session management, WS tickets.

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use super::ApiError;
use crate::services::session::{self, ChatUser};
use crate::services::users::{self, CredentialChange};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

fn session_cookie(token: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

/// Resolve the session cookie on a request, if any, to its user.
pub(crate) async fn user_from_jar(state: &AppState, jar: &CookieJar) -> Result<Option<ChatUser>, sqlx::Error> {
    match jar.get(COOKIE_NAME).map(Cookie::value) {
        Some(token) if !token.is_empty() => session::current_user(&state.pool, token).await,
        _ => Ok(None),
    }
}

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Authenticated user extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: ChatUser,
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(ApiError::unauthorized());
        }

        let app_state = AppState::from_ref(state);
        let user = session::current_user(&app_state.pool, token)
            .await?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(Self { user, token: token.to_owned() })
    }
}

/// Authenticated user that also holds the admin capability.
pub struct AdminUser(pub ChatUser);

impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser { user, .. } = AuthUser::from_request_parts(parts, state).await?;
        let app_state = AppState::from_ref(state);
        if !app_state.authorizer.is_admin(&user).await {
            tracing::warn!(user_id = user.id, "admin route rejected");
            return Err(ApiError::forbidden());
        }
        Ok(Self(user))
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct CredentialsBody {
    pub name: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateMeBody {
    pub current_password: String,
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Issue a session for `user` and attach its cookie to the response.
async fn start_session(state: &AppState, jar: CookieJar, user: ChatUser, status: StatusCode) -> Result<Response, ApiError> {
    let token = session::create_session(&state.pool, user.id, state.config.session_ttl_hours).await?;
    let cookie = session_cookie(token, state.config.cookie_secure, Duration::hours(state.config.session_ttl_hours));
    Ok((status, jar.add(cookie), Json(user)).into_response())
}

/// `POST /api/auth/register` — create a member account and log it in.
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<CredentialsBody>,
) -> Result<Response, ApiError> {
    let user = users::register(&state.pool, &body.name, &body.password).await?;
    start_session(&state, jar, user, StatusCode::CREATED).await
}

/// `POST /api/auth/login` — check credentials, set the session cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<CredentialsBody>,
) -> Result<Response, ApiError> {
    let user = users::authenticate(&state.pool, &body.name, &body.password).await?;
    tracing::info!(user_id = user.id, "user logged in");
    start_session(&state, jar, user, StatusCode::OK).await
}

/// `GET /api/auth/me` — return current user.
pub async fn me(auth: AuthUser) -> Json<ChatUser> {
    Json(auth.user)
}

/// `PATCH /api/auth/me` — change name and/or password.
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateMeBody>,
) -> Result<Json<ChatUser>, ApiError> {
    let change = CredentialChange {
        current_password: &body.current_password,
        new_name: body.name.as_deref(),
        new_password: body.password.as_deref(),
    };
    let user = users::update_credentials(&state.pool, auth.user.id, &change).await?;
    Ok(Json(user))
}

/// `POST /api/auth/logout` — delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, "session delete failed");
    }

    let cookie = session_cookie(String::new(), state.config.cookie_secure, Duration::ZERO);
    (CookieJar::new().add(cookie), StatusCode::NO_CONTENT)
}

/// `POST /api/auth/ws-ticket` — create a one-time WS ticket.
pub async fn ws_ticket(State(state): State<AppState>, auth: AuthUser) -> Result<Json<serde_json::Value>, ApiError> {
    let ticket = session::create_ws_ticket(&state.pool, auth.user.id, state.config.ws_ticket_ttl_secs).await?;
    Ok(Json(serde_json::json!({ "ticket": ticket })))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
