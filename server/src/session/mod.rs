//! Conversation state for the coaching pipeline
//!
//! This module holds the durable conversation record and the `ConversationStore` trait
//! that persists it. Stores are plain keyed get/put with last-write-wins semantics;
//! interpreting expiry is left to the caller, so a record that is logically expired but
//! not yet swept is still returned by `get`.

pub mod adapters;
pub mod record;
pub mod store;

pub use adapters::{FileConversationStore, InMemoryConversationStore};
pub use record::{ConversationRecord, HistoryEntry, Speaker, RECORD_FORMAT_VERSION};
pub use store::{ConversationStore, ConversationStoreRef, StoreError};
