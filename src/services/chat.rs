//! Chat room — commits intents to the store and announces them on the hub.
//!
//! DESIGN
//! ======
//! Every mutation runs as `lock → store commit → hub publish → unlock`. The
//! single commit lock makes commit order and publish order identical, so
//! each connection sees the events of any one message in the order they were
//! committed. Publishing only happens after a successful commit; a failed
//! commit publishes nothing.
//!
//! The commit runs on its own task. If the requesting connection goes away
//! mid-operation, the commit and its broadcast still finish and reach
//! everyone else.

use std::future::Future;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::info;

use super::hub::{ChatEvent, Hub};
use super::message::{ChatMessage, MessageStore, StoreError};
use super::session::ChatUser;
use crate::frame::ErrorCode;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("authentication required")]
    Unauthenticated,
    #[error("admin capability required")]
    NotAdmin,
    #[error("commit interrupted: {0}")]
    Interrupted(String),
}

impl ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.error_code(),
            Self::Unauthenticated => "E_AUTH",
            Self::NotAdmin => "E_FORBIDDEN",
            Self::Interrupted(_) => "E_INTERNAL",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.retryable(),
            Self::Interrupted(_) => true,
            Self::Unauthenticated | Self::NotAdmin => false,
        }
    }
}

/// Shared handle to the message store, the hub and the commit lock.
#[derive(Clone)]
pub struct ChatRoom {
    store: MessageStore,
    hub: Hub,
    commit_lock: Arc<Mutex<()>>,
}

// =============================================================================
// OPERATIONS
// =============================================================================

impl ChatRoom {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { store: MessageStore::new(pool), hub: Hub::new(), commit_lock: Arc::new(Mutex::new(())) }
    }

    #[must_use]
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Append a message as `author` and broadcast `message_created`.
    ///
    /// # Errors
    ///
    /// `EmptyContent` for blank content (nothing stored, nothing broadcast).
    pub async fn send(&self, author: &ChatUser, content: &str) -> Result<ChatMessage, ChatError> {
        let store = self.store.clone();
        let (author_id, author_name, content) = (author.id, author.name.clone(), content.to_owned());
        self.commit(async move {
            let message = store.append(author_id, &author_name, &content).await?;
            info!(message_id = message.id, user_id = author_id, "chat: message created");
            Ok::<_, ChatError>((Some(ChatEvent::Created(message.clone())), message))
        })
        .await
    }

    /// Edit one of `requester`'s own messages and broadcast `message_edited`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `NotOwner` or `EmptyContent`; none of them broadcast.
    pub async fn edit_own(&self, requester: &ChatUser, message_id: i64, content: &str) -> Result<ChatMessage, ChatError> {
        let store = self.store.clone();
        let (requester_id, content) = (requester.id, content.to_owned());
        self.commit(async move {
            let message = store.edit(message_id, requester_id, &content).await?;
            info!(message_id, user_id = requester_id, "chat: message edited");
            Ok::<_, ChatError>((Some(ChatEvent::Edited(message.clone())), message))
        })
        .await
    }

    /// Soft-delete one of `requester`'s own messages and broadcast
    /// `message_deleted`. Repeating the delete succeeds without a broadcast.
    ///
    /// # Errors
    ///
    /// `NotFound` or `NotOwner`; neither broadcasts.
    pub async fn delete_own(&self, requester: &ChatUser, message_id: i64) -> Result<ChatMessage, ChatError> {
        let store = self.store.clone();
        let requester_id = requester.id;
        self.commit(async move {
            let (message, changed) = store.soft_delete(message_id, requester_id).await?;
            if !changed {
                return Ok::<_, ChatError>((None, message));
            }
            info!(message_id, user_id = requester_id, "chat: message deleted");
            Ok((Some(ChatEvent::Deleted { message_id }), message))
        })
        .await
    }

    /// Full history, deleted messages included, oldest first. Needs no
    /// identity: this is the catch-up path for fresh page loads.
    ///
    /// # Errors
    ///
    /// Returns the store error if the query fails.
    pub async fn list_active(&self) -> Result<Vec<ChatMessage>, ChatError> {
        Ok(self.store.list_active().await?)
    }

    /// Look up a single message, deleted or not.
    ///
    /// # Errors
    ///
    /// `NotFound` if no message has that id.
    pub async fn get(&self, message_id: i64) -> Result<ChatMessage, ChatError> {
        Ok(self.store.get(message_id).await?.ok_or(StoreError::NotFound(message_id))?)
    }

    /// Hard-delete every message and broadcast `all_cleared`.
    ///
    /// Only the moderation service may call this, after its admin check.
    pub(super) async fn clear_all(&self) -> Result<u64, ChatError> {
        let store = self.store.clone();
        self.commit(async move {
            let removed = store.clear_all().await?;
            info!(removed, "chat: all messages cleared");
            Ok::<_, ChatError>((Some(ChatEvent::AllCleared), removed))
        })
        .await
    }

    /// Run `op` under the commit lock on a detached task and publish the
    /// event it yields, if any, before releasing the lock.
    async fn commit<T, F>(&self, op: F) -> Result<T, ChatError>
    where
        T: Send + 'static,
        F: Future<Output = Result<(Option<ChatEvent>, T), ChatError>> + Send + 'static,
    {
        let lock = Arc::clone(&self.commit_lock);
        let hub = self.hub.clone();
        let task = tokio::spawn(async move {
            let _guard = lock.lock().await;
            let (event, value) = op.await?;
            if let Some(event) = event {
                hub.publish(&event).await;
            }
            Ok::<T, ChatError>(value)
        });

        task.await.map_err(|e| ChatError::Interrupted(e.to_string()))?
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
