use super::*;
use crate::frame::Status;
use time::OffsetDateTime;
use tokio::time::{Duration, timeout};

async fn assert_channel_has_frame(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("frame receive timed out")
        .expect("channel closed")
}

async fn assert_channel_empty(rx: &mut mpsc::Receiver<Frame>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected channel to remain empty"
    );
}

fn sample_message() -> ChatMessage {
    ChatMessage {
        id: 1,
        author_id: 7,
        author_name: "alice".into(),
        content: "hello".into(),
        created_at: OffsetDateTime::UNIX_EPOCH,
        edited_at: None,
        deleted: false,
    }
}

// =============================================================================
// EVENT FRAMES
// =============================================================================

#[test]
fn created_event_carries_full_message() {
    let frame = ChatEvent::Created(sample_message()).to_frame();
    assert_eq!(frame.kind, "message_created");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.parent_id.is_none());
    assert_eq!(frame.message_id(), Some(1));
    assert_eq!(frame.str_field("content"), Some("hello"));
    assert_eq!(frame.str_field("username"), Some("alice"));
    assert_eq!(frame.data.get("user_id"), Some(&serde_json::json!(7)));
    assert_eq!(frame.str_field("created_at"), Some("1970-01-01T00:00:00Z"));
}

#[test]
fn edited_event_carries_id_content_and_timestamp() {
    let mut message = sample_message();
    message.content = "edited".into();
    message.edited_at = Some(OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(60));

    let frame = ChatEvent::Edited(message).to_frame();
    assert_eq!(frame.kind, "message_edited");
    assert_eq!(frame.message_id(), Some(1));
    assert_eq!(frame.str_field("content"), Some("edited"));
    assert_eq!(frame.str_field("edited_at"), Some("1970-01-01T00:01:00Z"));
    assert!(frame.data.get("username").is_none());
}

#[test]
fn deleted_and_cleared_events_are_minimal() {
    let deleted = ChatEvent::Deleted { message_id: 4 }.to_frame();
    assert_eq!(deleted.kind, "message_deleted");
    assert_eq!(deleted.message_id(), Some(4));
    assert_eq!(deleted.data.len(), 1);

    let cleared = ChatEvent::AllCleared.to_frame();
    assert_eq!(cleared.kind, "all_cleared");
    assert!(cleared.data.is_empty());
}

// =============================================================================
// FAN-OUT
// =============================================================================

#[tokio::test]
async fn publish_reaches_every_registered_connection() {
    let hub = Hub::new();
    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);
    hub.register(Uuid::new_v4(), 1, tx_a).await;
    hub.register(Uuid::new_v4(), 2, tx_b).await;

    let delivered = hub.publish(&ChatEvent::Deleted { message_id: 3 }).await;
    assert_eq!(delivered, 2);

    assert_eq!(assert_channel_has_frame(&mut rx_a).await.kind, "message_deleted");
    assert_eq!(assert_channel_has_frame(&mut rx_b).await.kind, "message_deleted");
}

#[tokio::test]
async fn full_queue_skips_only_that_connection() {
    let hub = Hub::new();
    let slow = Uuid::new_v4();
    let (tx_slow, mut rx_slow) = mpsc::channel(1);
    let (tx_fast, mut rx_fast) = mpsc::channel(8);
    hub.register(slow, 1, tx_slow).await;
    hub.register(Uuid::new_v4(), 2, tx_fast).await;

    assert_eq!(hub.publish(&ChatEvent::Deleted { message_id: 1 }).await, 2);
    assert_eq!(hub.publish(&ChatEvent::Deleted { message_id: 2 }).await, 1);

    assert_eq!(assert_channel_has_frame(&mut rx_fast).await.message_id(), Some(1));
    assert_eq!(assert_channel_has_frame(&mut rx_fast).await.message_id(), Some(2));
    assert_eq!(assert_channel_has_frame(&mut rx_slow).await.message_id(), Some(1));
    assert_channel_empty(&mut rx_slow).await;

    // The slow connection stays registered and receives later events.
    assert_eq!(hub.connection_count().await, 2);
    assert_eq!(hub.publish(&ChatEvent::AllCleared).await, 2);
}

#[tokio::test]
async fn closed_connections_are_pruned() {
    let hub = Hub::new();
    let (tx, rx) = mpsc::channel(8);
    hub.register(Uuid::new_v4(), 1, tx).await;
    drop(rx);

    assert_eq!(hub.publish(&ChatEvent::AllCleared).await, 0);
    assert_eq!(hub.connection_count().await, 0);
}

#[tokio::test]
async fn unregister_stops_delivery() {
    let hub = Hub::new();
    let client_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel(8);
    // A second handle keeps the channel open once the hub drops its sender.
    let _keep_open = tx.clone();
    hub.register(client_id, 1, tx).await;
    hub.unregister(client_id).await;

    assert_eq!(hub.publish(&ChatEvent::AllCleared).await, 0);
    assert_channel_empty(&mut rx).await;
}

#[tokio::test]
async fn publish_to_empty_hub_is_noop() {
    let hub = Hub::new();
    assert_eq!(hub.publish(&ChatEvent::AllCleared).await, 0);
}

#[tokio::test]
async fn events_for_one_message_arrive_in_publish_order() {
    let hub = Hub::new();
    let (tx, mut rx) = mpsc::channel(8);
    hub.register(Uuid::new_v4(), 1, tx).await;

    hub.publish(&ChatEvent::Created(sample_message())).await;
    hub.publish(&ChatEvent::Edited(sample_message())).await;
    hub.publish(&ChatEvent::Deleted { message_id: 1 }).await;

    let kinds: Vec<String> = vec![
        assert_channel_has_frame(&mut rx).await.kind,
        assert_channel_has_frame(&mut rx).await.kind,
        assert_channel_has_frame(&mut rx).await.kind,
    ];
    assert_eq!(kinds, ["message_created", "message_edited", "message_deleted"]);
}
