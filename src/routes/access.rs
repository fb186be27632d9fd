//! Access-log middleware.
//!
//! Records `(user, ip, user agent)` for every request that carries a valid
//! member session. Admin traffic and anonymous traffic are not recorded.
//! The write runs on a detached task and never affects the response.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use super::auth::user_from_jar;
use crate::services::access_log;
use crate::state::AppState;

/// Client IP: first `X-Forwarded-For` hop, else the socket peer.
pub(crate) fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_owned)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

pub async fn record_access(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let user = match user_from_jar(&state, &jar).await {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "access log: session lookup failed");
            None
        }
    };

    if let Some(user) = user {
        if !state.authorizer.is_admin(&user).await {
            let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0);
            let ip = client_ip(req.headers(), peer);
            let agent = req
                .headers()
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let pool = state.pool.clone();
            tokio::spawn(async move {
                if let Err(e) = access_log::record(&pool, user.id, ip.as_deref(), agent.as_deref()).await {
                    warn!(error = %e, user_id = user.id, "access log: record failed");
                }
            });
        }
    }

    next.run(req).await
}

#[cfg(test)]
#[path = "access_test.rs"]
mod tests;
