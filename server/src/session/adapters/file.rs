use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::session::record::ConversationRecord;
use crate::session::store::{ConversationStore, StoreError};

const RECORD_EXTENSION: &str = "json";

/// Durable store keeping one JSON document per session in a directory.
///
/// Writes land in a temporary sibling first and are renamed over the target, so readers
/// only ever see a complete record.
#[derive(Debug, Clone)]
pub struct FileConversationStore {
    dir: PathBuf,
}

impl FileConversationStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "Opened file conversation store");
        Ok(Self { dir })
    }

    /// Map a session ID to its file. Only canonical UUIDs map to a path, which keeps
    /// client-supplied IDs from escaping the store directory.
    fn record_path(&self, session_id: &str) -> Option<PathBuf> {
        let parsed = Uuid::parse_str(session_id).ok()?;
        let canonical = parsed.hyphenated().to_string();
        if canonical != session_id {
            return None;
        }
        Some(self.dir.join(format!("{}.{}", canonical, RECORD_EXTENSION)))
    }
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    async fn get(&self, session_id: &str) -> Result<Option<ConversationRecord>, StoreError> {
        let Some(path) = self.record_path(session_id) else {
            return Ok(None);
        };

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(ConversationRecord::decode(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, record: &ConversationRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.session_id).ok_or_else(|| {
            StoreError::Backend(format!("Invalid session ID: {}", record.session_id))
        })?;

        let bytes = record.encode()?;
        let tmp_path = self
            .dir
            .join(format!(".{}.{}.tmp", record.session_id, Uuid::new_v4().simple()));

        fs::write(&tmp_path, &bytes).await?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        debug!(session_id = %record.session_id, history = record.history.len(), "Stored record");
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut count = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            let record = match fs::read(&path).await {
                Ok(bytes) => match ConversationRecord::decode(&bytes) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                        continue;
                    }
                },
                // Removed by a concurrent sweep
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            if record.is_expired_at(now) {
                match fs::remove_file(&path).await {
                    Ok(()) => count += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if count > 0 {
            debug!("Purged {} expired records", count);
        }

        Ok(count)
    }
}
