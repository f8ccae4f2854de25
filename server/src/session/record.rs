use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::session::store::StoreError;

/// Version written into every encoded record
pub const RECORD_FORMAT_VERSION: u32 = 1;

/// Who produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One side of a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Speaker,
    pub text: String,
}

/// Durable state of one coaching conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub session_id: String,
    pub primary_text: String,
    pub reference_text: String,
    pub initial_feedback: String,
    /// Append-only; insertion order is conversation order
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(
        session_id: String,
        primary_text: String,
        reference_text: String,
        initial_feedback: String,
        now: DateTime<Utc>,
        retention: Duration,
    ) -> Self {
        Self {
            session_id,
            primary_text,
            reference_text,
            initial_feedback,
            history: Vec::new(),
            created_at: now,
            last_updated_at: now,
            expires_at: now + retention,
        }
    }

    /// Append a completed turn and push the expiry out from `now`
    pub fn append_turn(
        &mut self,
        question: String,
        answer: String,
        now: DateTime<Utc>,
        retention: Duration,
    ) {
        self.history.push(HistoryEntry {
            role: Speaker::User,
            text: question,
        });
        self.history.push(HistoryEntry {
            role: Speaker::Assistant,
            text: answer,
        });
        self.last_updated_at = now;
        self.expires_at = now + retention;
    }

    /// A record is readable only strictly before its expiry
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn turn_count(&self) -> usize {
        self.history.len() / 2
    }

    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        let envelope = EncodedRecord {
            version: RECORD_FORMAT_VERSION,
            record: self.clone(),
        };
        Ok(serde_json::to_vec_pretty(&envelope)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        let probe: VersionProbe = serde_json::from_slice(bytes)?;
        if probe.version != RECORD_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion(probe.version));
        }
        let envelope: EncodedRecord = serde_json::from_slice(bytes)?;
        Ok(envelope.record)
    }
}

#[derive(Serialize, Deserialize)]
struct EncodedRecord {
    version: u32,
    #[serde(flatten)]
    record: ConversationRecord,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample(now: DateTime<Utc>) -> ConversationRecord {
        ConversationRecord::new(
            "5f0c7c1e-8d7e-4d6b-9a55-0c2f3c1b2a10".to_string(),
            "Senior backend engineer, 5 yrs Go, AWS".to_string(),
            "Looking for Go engineer with cloud experience".to_string(),
            "Strong match".to_string(),
            now,
            Duration::hours(24),
        )
    }

    #[test]
    fn new_record_has_empty_history_and_expiry_from_creation() {
        let now = Utc::now();
        let record = sample(now);

        assert!(record.history.is_empty());
        assert_eq!(record.created_at, now);
        assert_eq!(record.last_updated_at, now);
        assert_eq!(record.expires_at, now + Duration::hours(24));
    }

    #[test]
    fn append_turn_pushes_user_then_assistant_and_extends_expiry() {
        let created = Utc::now();
        let mut record = sample(created);
        let later = created + Duration::hours(3);

        record.append_turn("What should I add?".into(), "Add Kubernetes".into(), later, Duration::hours(24));

        assert_eq!(record.history.len(), 2);
        assert_eq!(record.history[0].role, Speaker::User);
        assert_eq!(record.history[0].text, "What should I add?");
        assert_eq!(record.history[1].role, Speaker::Assistant);
        assert_eq!(record.created_at, created);
        assert_eq!(record.last_updated_at, later);
        assert_eq!(record.expires_at, later + Duration::hours(24));
        assert_eq!(record.turn_count(), 1);
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let record = sample(Utc::now());
        assert!(!record.is_expired_at(record.expires_at - Duration::seconds(1)));
        assert!(record.is_expired_at(record.expires_at));
    }

    #[test]
    fn encoding_is_versioned_and_round_trips() {
        let now = Utc::now();
        let mut record = sample(now);
        record.append_turn("q1".into(), "a1".into(), now, Duration::hours(24));
        record.append_turn("q2".into(), "a2".into(), now, Duration::hours(24));

        let bytes = record.encode().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["version"], RECORD_FORMAT_VERSION);
        assert_eq!(value["sessionId"], record.session_id.as_str());
        assert_eq!(value["history"][0]["role"], "user");
        assert_eq!(value["history"][3]["text"], "a2");

        assert_eq!(ConversationRecord::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut value: Value = serde_json::from_slice(&sample(Utc::now()).encode().unwrap()).unwrap();
        value["version"] = Value::from(99);
        let bytes = serde_json::to_vec(&value).unwrap();

        let err = ConversationRecord::decode(&bytes).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion(99)));
    }
}
