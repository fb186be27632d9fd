use super::*;
use crate::frame::Frame;
use crate::state::test_helpers::{dummy_user, memory_pool};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use uuid::Uuid;

/// Grants admin to everyone; proves the check is delegated, not name-based.
struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn is_admin(&self, _user: &ChatUser) -> bool {
        true
    }
}

fn admin(id: i64) -> ChatUser {
    ChatUser { id, name: "ops".into(), role: Role::Admin }
}

#[tokio::test]
async fn role_authorizer_checks_stored_role() {
    let authz = RoleAuthorizer;
    assert!(authz.is_admin(&admin(1)).await);
    assert!(!authz.is_admin(&dummy_user(2, "admin")).await, "the name 'admin' grants nothing");
}

#[tokio::test]
async fn clear_all_as_member_is_forbidden_and_keeps_messages() {
    let room = ChatRoom::new(memory_pool().await);
    let member = dummy_user(1, "alice");
    room.send(&member, "keep me").await.unwrap();

    let authz: Arc<dyn Authorizer> = Arc::new(RoleAuthorizer);
    let err = clear_all(&room, &authz, &member).await.unwrap_err();
    assert!(matches!(err, ChatError::NotAdmin));
    assert_eq!(room.list_active().await.unwrap().len(), 1);
}

#[tokio::test]
async fn clear_all_as_admin_wipes_log_and_notifies_every_client() {
    let room = ChatRoom::new(memory_pool().await);
    let (tx_a, mut rx_a) = mpsc::channel::<Frame>(8);
    let (tx_b, mut rx_b) = mpsc::channel::<Frame>(8);
    room.hub().register(Uuid::new_v4(), 1, tx_a).await;
    room.hub().register(Uuid::new_v4(), 2, tx_b).await;

    // Someone else's messages: no ownership check applies.
    room.send(&dummy_user(1, "alice"), "A").await.unwrap();
    room.send(&dummy_user(2, "bob"), "B").await.unwrap();

    let authz: Arc<dyn Authorizer> = Arc::new(RoleAuthorizer);
    assert_eq!(clear_all(&room, &authz, &admin(3)).await.unwrap(), 2);
    assert!(room.list_active().await.unwrap().is_empty());

    for rx in [&mut rx_a, &mut rx_b] {
        let mut cleared = 0;
        while let Ok(Some(frame)) = timeout(Duration::from_millis(80), rx.recv()).await {
            if frame.kind == "all_cleared" {
                cleared += 1;
            }
        }
        assert_eq!(cleared, 1, "each client gets exactly one all_cleared");
    }
}

#[tokio::test]
async fn custom_authorizer_is_honored() {
    let room = ChatRoom::new(memory_pool().await);
    let authz: Arc<dyn Authorizer> = Arc::new(AllowAll);
    assert_eq!(clear_all(&room, &authz, &dummy_user(1, "alice")).await.unwrap(), 0);
}
