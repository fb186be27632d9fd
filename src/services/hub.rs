//! Broadcast hub — fan-out of chat lifecycle events to live connections.
//!
//! DESIGN
//! ======
//! The hub is a registry of authenticated connections, each represented by
//! the sending half of its bounded outbound channel. Publishing walks the
//! registry and `try_send`s one frame per connection: a full or closed
//! channel skips that connection only, so a slow client never stalls the
//! publisher or its peers.
//!
//! There is no replay buffer. A client that connects after an event missed
//! it and catches up through the message listing.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;
use uuid::Uuid;

use super::message::ChatMessage;
use crate::frame::{Data, FRAME_CONTENT, FRAME_MESSAGE_ID, Frame};

// =============================================================================
// EVENTS
// =============================================================================

/// A committed state change, announced to every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Created(ChatMessage),
    Edited(ChatMessage),
    Deleted { message_id: i64 },
    AllCleared,
}

impl ChatEvent {
    /// Wire `type` of the event frame.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created(_) => "message_created",
            Self::Edited(_) => "message_edited",
            Self::Deleted { .. } => "message_deleted",
            Self::AllCleared => "all_cleared",
        }
    }

    /// Build the unsolicited event frame sent to every connection.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        let frame = Frame::request(self.kind(), Data::new());
        match self {
            Self::Created(message) => Frame { data: message_data(message), ..frame }.with_from(message.author_id.to_string()),
            Self::Edited(message) => frame
                .with_from(message.author_id.to_string())
                .with_data(FRAME_MESSAGE_ID, message.id)
                .with_content(message.content.clone())
                .with_data("edited_at", rfc3339_or_null(message.edited_at)),
            Self::Deleted { message_id } => frame.with_data(FRAME_MESSAGE_ID, *message_id),
            Self::AllCleared => frame,
        }
    }
}

/// Flatten a message into frame data using its wire field names.
#[must_use]
pub fn message_data(message: &ChatMessage) -> Data {
    match serde_json::to_value(message) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => {
            // Serialization of a plain struct cannot fail; keep the id at least.
            let mut data = Data::new();
            data.insert(FRAME_MESSAGE_ID.into(), serde_json::json!(message.id));
            data.insert(FRAME_CONTENT.into(), serde_json::json!(message.content));
            data
        }
    }
}

fn rfc3339_or_null(ts: Option<time::OffsetDateTime>) -> serde_json::Value {
    ts.and_then(|t| t.format(&time::format_description::well_known::Rfc3339).ok())
        .map_or(serde_json::Value::Null, serde_json::Value::String)
}

// =============================================================================
// HUB
// =============================================================================

/// One registered connection.
struct Subscriber {
    user_id: i64,
    tx: mpsc::Sender<Frame>,
}

/// Registry of live connections. Clone shares the same registry.
#[derive(Clone, Default)]
pub struct Hub {
    subscribers: Arc<RwLock<HashMap<Uuid, Subscriber>>>,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated connection. Re-registering a client id
    /// replaces its sender.
    pub async fn register(&self, client_id: Uuid, user_id: i64, tx: mpsc::Sender<Frame>) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(client_id, Subscriber { user_id, tx });
    }

    /// Remove a connection. Unknown ids are ignored.
    pub async fn unregister(&self, client_id: Uuid) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.remove(&client_id);
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Deliver `event` to every registered connection. Returns how many
    /// connections accepted it.
    ///
    /// Connections whose channel is closed are pruned; full channels drop
    /// this event for that connection only.
    pub async fn publish(&self, event: &ChatEvent) -> usize {
        let frame = event.to_frame();
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let subscribers = self.subscribers.read().await;
            for (client_id, subscriber) in subscribers.iter() {
                match subscriber.tx.try_send(frame.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(%client_id, user_id = subscriber.user_id, kind = event.kind(), "hub: client queue full, event dropped");
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*client_id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for client_id in closed {
                subscribers.remove(&client_id);
            }
        }

        delivered
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
