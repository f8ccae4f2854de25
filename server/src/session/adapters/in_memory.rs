use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::session::record::ConversationRecord;
use crate::session::store::{ConversationStore, StoreError};

/// In-memory implementation of ConversationStore
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    /// Thread-safe storage of records
    records: Arc<RwLock<HashMap<String, ConversationRecord>>>,
}

impl InMemoryConversationStore {
    /// Create a new InMemoryConversationStore
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, expired or not
    pub fn len(&self) -> usize {
        match self.records.read() {
            Ok(records) => records.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, session_id: &str) -> Result<Option<ConversationRecord>, StoreError> {
        let records = self.records.read().map_err(|e| {
            StoreError::Backend(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(records.get(session_id).cloned())
    }

    async fn put(&self, record: &ConversationRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|e| {
            StoreError::Backend(format!("Failed to acquire write lock: {}", e))
        })?;

        records.insert(record.session_id.clone(), record.clone());
        debug!(session_id = %record.session_id, history = record.history.len(), "Stored record");
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut records = self.records.write().map_err(|e| {
            StoreError::Backend(format!("Failed to acquire write lock: {}", e))
        })?;

        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        let count = before - records.len();

        if count > 0 {
            debug!("Purged {} expired records", count);
        }

        Ok(count)
    }
}
