use chrono::{Duration, Utc};
use coach_core::client::{CompletionGateway, CompletionGatewayRef};
use coach_core::errors::CompletionError;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::prompt;
use crate::session::{ConversationRecord, ConversationStore, ConversationStoreRef, StoreError};

/// Default retention window, measured from the last mutation
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("{0}")]
    Validation(String),

    /// Session absent or expired; the client has to start over
    #[error("Session not found or expired: {0}")]
    NotFound(String),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a successful `create_session`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub session_id: String,
    pub initial_feedback: String,
}

/// Creates, looks up and extends conversation records.
///
/// Records are written only after the completion call succeeded, so a failed call never
/// leaves a half-written turn behind. Concurrent turns on the same session are not
/// serialized: both read the same history and the later `put` wins.
#[derive(Clone)]
pub struct ConversationManager {
    store: ConversationStoreRef,
    gateway: CompletionGatewayRef,
    retention: Duration,
}

impl ConversationManager {
    pub fn new(store: ConversationStoreRef, gateway: CompletionGatewayRef) -> Self {
        Self::with_retention(store, gateway, Duration::hours(DEFAULT_RETENTION_HOURS))
    }

    pub fn with_retention(
        store: ConversationStoreRef,
        gateway: CompletionGatewayRef,
        retention: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            retention,
        }
    }

    /// Generate the initial feedback for a document pair and open a new session for it
    pub async fn create_session(
        &self,
        primary_text: &str,
        reference_text: &str,
    ) -> Result<CreatedSession, ConversationError> {
        if primary_text.trim().is_empty() || reference_text.trim().is_empty() {
            return Err(ConversationError::Validation(
                "Both \"resume\" and \"job_description\" are required in the request body."
                    .to_string(),
            ));
        }

        info!(
            primary_len = primary_text.len(),
            reference_len = reference_text.len(),
            "Starting initial analysis"
        );

        let prompt = prompt::initial_prompt(primary_text, reference_text);
        let initial_feedback = self.gateway.invoke(&prompt).await.map_err(|e| {
            warn!(kind = e.kind(), error = %e, "Initial analysis failed");
            e
        })?;

        let session_id = Uuid::new_v4().to_string();
        let record = ConversationRecord::new(
            session_id.clone(),
            primary_text.to_string(),
            reference_text.to_string(),
            initial_feedback.clone(),
            Utc::now(),
            self.retention,
        );
        self.store.put(&record).await?;

        info!(session_id = %session_id, "Created session");
        Ok(CreatedSession {
            session_id,
            initial_feedback,
        })
    }

    /// Answer a follow-up question within an existing, unexpired session
    pub async fn continue_session(
        &self,
        session_id: &str,
        question: &str,
    ) -> Result<String, ConversationError> {
        if question.trim().is_empty() {
            return Err(ConversationError::Validation(
                "Missing required fields: question.".to_string(),
            ));
        }

        let mut record = self.load_active(session_id).await?;

        debug!(
            session_id = %session_id,
            history = record.history.len(),
            "Continuing session"
        );

        let prompt = prompt::follow_up_prompt(
            &record.primary_text,
            &record.reference_text,
            &record.initial_feedback,
            &record.history,
            question,
        );
        let answer = self.gateway.invoke(&prompt).await.map_err(|e| {
            warn!(session_id = %session_id, kind = e.kind(), error = %e, "Follow-up failed");
            e
        })?;

        record.append_turn(question.to_string(), answer.clone(), Utc::now(), self.retention);
        self.store.put(&record).await?;

        info!(session_id = %session_id, turns = record.turn_count(), "Session updated");
        Ok(answer)
    }

    /// Fetch a record, treating one past its expiry exactly like a missing one
    async fn load_active(&self, session_id: &str) -> Result<ConversationRecord, ConversationError> {
        match self.store.get(session_id).await? {
            Some(record) if !record.is_expired_at(Utc::now()) => Ok(record),
            Some(_) => {
                debug!(session_id = %session_id, "Session expired");
                Err(ConversationError::NotFound(session_id.to_string()))
            }
            None => Err(ConversationError::NotFound(session_id.to_string())),
        }
    }
}
