use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::session::record::ConversationRecord;

/// Error type for conversation store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Unsupported record format version: {0}")]
    UnsupportedVersion(u32),

    /// Error occurred during a store operation
    #[error("Storage error: {0}")]
    Backend(String),
}

/// Trait defining the interface for conversation stores
#[async_trait]
pub trait ConversationStore: Send + Sync + Debug {
    /// Get a record by session ID, whether or not it has expired
    async fn get(&self, session_id: &str) -> Result<Option<ConversationRecord>, StoreError>;

    /// Write the full record, replacing any previous version (last write wins)
    async fn put(&self, record: &ConversationRecord) -> Result<(), StoreError>;

    /// Delete records whose expiry is at or before `now`; returns how many were removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Type alias for Arc-wrapped ConversationStore trait objects
pub type ConversationStoreRef = Arc<dyn ConversationStore>;
