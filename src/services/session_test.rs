use super::*;
use crate::state::test_helpers::{seed_user, test_app_state};

// =============================================================================
// bytes_to_hex
// =============================================================================

#[test]
fn bytes_to_hex_empty() {
    assert_eq!(bytes_to_hex(&[]), "");
}

#[test]
fn bytes_to_hex_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a]), "0a");
}

#[test]
fn bytes_to_hex_multi_byte() {
    assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
}

// =============================================================================
// tokens
// =============================================================================

#[test]
fn generate_token_is_64_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_ws_ticket_is_32_hex_chars() {
    assert_eq!(generate_ws_ticket().len(), 32);
}

#[test]
fn generate_token_two_calls_differ() {
    assert_ne!(generate_token(), generate_token());
}

#[test]
fn hash_token_is_stable_and_not_identity() {
    let token = generate_token();
    assert_eq!(hash_token(&token), hash_token(&token));
    assert_ne!(hash_token(&token), token);
    assert_eq!(hash_token("").len(), 64);
}

// =============================================================================
// Role
// =============================================================================

#[test]
fn role_parses_its_own_names() {
    for role in [Role::Member, Role::Admin] {
        assert_eq!(Role::parse(role.as_str()), Some(role));
    }
    assert_eq!(Role::parse("Admin"), None);
    assert_eq!(Role::parse("root"), None);
}

// =============================================================================
// sessions
// =============================================================================

#[tokio::test]
async fn session_resolves_to_its_user() {
    let state = test_app_state().await;
    let alice = seed_user(&state, "alice", Role::Member).await;

    let token = create_session(&state.pool, alice.id, 1).await.unwrap();
    let resolved = current_user(&state.pool, &token).await.unwrap();
    assert_eq!(resolved, Some(alice));
}

#[tokio::test]
async fn session_token_is_stored_hashed() {
    let state = test_app_state().await;
    let alice = seed_user(&state, "alice", Role::Member).await;
    let token = create_session(&state.pool, alice.id, 1).await.unwrap();

    let stored: String = sqlx::query_scalar("SELECT token_hash FROM sessions")
        .fetch_one(&state.pool)
        .await
        .unwrap();
    assert_eq!(stored, hash_token(&token));
}

#[tokio::test]
async fn expired_session_is_ignored() {
    let state = test_app_state().await;
    let alice = seed_user(&state, "alice", Role::Member).await;
    let token = create_session(&state.pool, alice.id, -1).await.unwrap();
    assert_eq!(current_user(&state.pool, &token).await.unwrap(), None);
}

#[tokio::test]
async fn unknown_session_is_none() {
    let state = test_app_state().await;
    assert_eq!(current_user(&state.pool, "nope").await.unwrap(), None);
}

#[tokio::test]
async fn deleted_session_no_longer_resolves() {
    let state = test_app_state().await;
    let alice = seed_user(&state, "alice", Role::Member).await;
    let token = create_session(&state.pool, alice.id, 1).await.unwrap();

    delete_session(&state.pool, &token).await.unwrap();
    assert_eq!(current_user(&state.pool, &token).await.unwrap(), None);
}

#[tokio::test]
async fn session_reports_admin_role() {
    let state = test_app_state().await;
    let ops = seed_user(&state, "ops", Role::Admin).await;
    let token = create_session(&state.pool, ops.id, 1).await.unwrap();
    let resolved = current_user(&state.pool, &token).await.unwrap().unwrap();
    assert_eq!(resolved.role, Role::Admin);
}

// =============================================================================
// ws tickets
// =============================================================================

#[tokio::test]
async fn ws_ticket_is_single_use() {
    let state = test_app_state().await;
    let alice = seed_user(&state, "alice", Role::Member).await;
    let ticket = create_ws_ticket(&state.pool, alice.id, 60).await.unwrap();

    assert_eq!(consume_ws_ticket(&state.pool, &ticket).await.unwrap(), Some(alice));
    assert_eq!(consume_ws_ticket(&state.pool, &ticket).await.unwrap(), None);
}

#[tokio::test]
async fn expired_ws_ticket_is_rejected() {
    let state = test_app_state().await;
    let alice = seed_user(&state, "alice", Role::Member).await;
    let ticket = create_ws_ticket(&state.pool, alice.id, -1).await.unwrap();
    assert_eq!(consume_ws_ticket(&state.pool, &ticket).await.unwrap(), None);
}
