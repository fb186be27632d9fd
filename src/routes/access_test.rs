use super::*;
use axum::body::Body;
use axum::http::header::COOKIE;
use axum::http::{HeaderValue, StatusCode};
use tokio::time::{Duration, sleep};
use tower::ServiceExt;

use crate::routes::app;
use crate::services::session::Role;
use crate::state::test_helpers::{seed_user, session_cookie, test_app_state};

#[test]
fn client_ip_prefers_first_forwarded_hop() {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
    let peer = "127.0.0.1:9000".parse().ok();
    assert_eq!(client_ip(&headers, peer).as_deref(), Some("203.0.113.7"));
}

#[test]
fn client_ip_falls_back_to_peer() {
    let peer = "192.0.2.1:443".parse().ok();
    assert_eq!(client_ip(&HeaderMap::new(), peer).as_deref(), Some("192.0.2.1"));
    assert_eq!(client_ip(&HeaderMap::new(), None), None);
}

async fn get_with_cookie(state: &AppState, cookie: Option<&str>) -> StatusCode {
    let mut builder = axum::http::Request::builder().uri("/api/messages").header(USER_AGENT, "test-agent");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    let resp = app(state.clone()).oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
    resp.status()
}

/// The record is written on a detached task; give it a moment.
async fn settled_logs(state: &AppState) -> Vec<access_log::AccessLogEntry> {
    sleep(Duration::from_millis(50)).await;
    access_log::list(&state.pool).await.unwrap()
}

#[tokio::test]
async fn member_requests_are_recorded() {
    let state = test_app_state().await;
    let alice = seed_user(&state, "alice", Role::Member).await;
    let cookie = session_cookie(&state, &alice).await;

    assert_eq!(get_with_cookie(&state, Some(&cookie)).await, StatusCode::OK);
    let logs = settled_logs(&state).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].user_id, alice.id);
    assert_eq!(logs[0].user_agent.as_deref(), Some("test-agent"));
}

#[tokio::test]
async fn admin_and_anonymous_requests_are_not_recorded() {
    let state = test_app_state().await;
    let ops = seed_user(&state, "ops", Role::Admin).await;
    let cookie = session_cookie(&state, &ops).await;

    assert_eq!(get_with_cookie(&state, Some(&cookie)).await, StatusCode::OK);
    assert_eq!(get_with_cookie(&state, None).await, StatusCode::OK);
    assert!(settled_logs(&state).await.is_empty());
}
