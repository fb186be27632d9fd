use super::*;
use axum::body::Body;
use axum::http::Request;
use axum::http::header::{CONTENT_TYPE, COOKIE};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::routes::app;
use crate::services::session::Role;
use crate::state::test_helpers::{seed_user, session_cookie, test_app_state};

#[tokio::test]
async fn create_then_list() {
    let state = test_app_state().await;
    let alice = seed_user(&state, "alice", Role::Member).await;
    let cookie = session_cookie(&state, &alice).await;

    let body = json!({ "song_name": "Yesterday", "artist_name": "The Beatles" });
    let req = Request::builder()
        .method("POST")
        .uri("/api/requests")
        .header(CONTENT_TYPE, "application/json")
        .header(COOKIE, &cookie)
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = Request::builder().uri("/api/requests").header(COOKIE, &cookie).body(Body::empty()).unwrap();
    let resp = app(state).oneshot(req).await.unwrap();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let listed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(listed[0]["song_name"], "Yesterday");
    assert_eq!(listed[0]["username"], "alice");
}

#[tokio::test]
async fn blank_artist_is_bad_request() {
    let state = test_app_state().await;
    let alice = seed_user(&state, "alice", Role::Member).await;
    let cookie = session_cookie(&state, &alice).await;

    let body = json!({ "song_name": "Yesterday", "artist_name": "" });
    let req = Request::builder()
        .method("POST")
        .uri("/api/requests")
        .header(CONTENT_TYPE, "application/json")
        .header(COOKIE, &cookie)
        .body(Body::from(body.to_string()))
        .unwrap();
    assert_eq!(app(state).oneshot(req).await.unwrap().status(), StatusCode::BAD_REQUEST);
}
