//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.
//! `chat` ties the message store to the broadcast hub; `moderation` is the
//! only path to the admin bulk clear.

pub mod access_log;
pub mod chat;
pub mod hub;
pub mod message;
pub mod moderation;
pub mod session;
pub mod song_request;
pub mod users;
