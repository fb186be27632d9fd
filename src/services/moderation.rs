//! Moderation — the admin capability check and the bulk clear it guards.
//!
//! DESIGN
//! ======
//! Two authorization tiers exist side by side. Per-message ownership is
//! enforced by the message store on edit/delete. The blanket admin override
//! lives here: `clear_all` skips every per-message check, and its only guard
//! is `Authorizer::is_admin`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::chat::{ChatError, ChatRoom};
use super::session::{ChatUser, Role};

/// Answers whether a user holds the admin capability.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_admin(&self, user: &ChatUser) -> bool;
}

/// Default authorizer: trusts the role stored on the user row.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAuthorizer;

#[async_trait]
impl Authorizer for RoleAuthorizer {
    async fn is_admin(&self, user: &ChatUser) -> bool {
        user.role == Role::Admin
    }
}

/// Hard-delete the whole chat log and broadcast `all_cleared`.
///
/// # Errors
///
/// `NotAdmin` if `requester` lacks the capability (nothing is touched), or
/// the store error if the delete fails.
pub async fn clear_all(room: &ChatRoom, authorizer: &Arc<dyn Authorizer>, requester: &ChatUser) -> Result<u64, ChatError> {
    if !authorizer.is_admin(requester).await {
        warn!(user_id = requester.id, "moderation: clear rejected, not an admin");
        return Err(ChatError::NotAdmin);
    }

    let removed = room.clear_all().await?;
    info!(user_id = requester.id, removed, "moderation: chat log cleared");
    Ok(removed)
}

#[cfg(test)]
#[path = "moderation_test.rs"]
mod tests;
