//! # messageai-store
//!
//! On-device cache for the MessageAI client, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for messages,
//! conversations, cached user profiles and cached translations. The remote
//! document store stays authoritative; rows here exist so the UI can render
//! instantly and offline, and so unsent messages survive until they sync.

pub mod conversations;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod translations;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
