// This crate contains the pieces the conversation pipeline needs from the outside world:
// - Completion gateway trait and the OpenAI-compatible client
// - Prompt/message data structures
// - Configuration loading
// - Shared error types

// Export client module - completion gateway and HTTP client
pub mod client;
pub use client::*;

// Export types module - prompt and upstream wire structures
pub mod types;
pub use types::*;

// Export config module - configuration loading
pub mod config;
pub use config::*;

// Export errors module - completion error taxonomy
pub mod errors;
pub use errors::*;
