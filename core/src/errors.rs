use thiserror::Error;

/// Failures surfaced by a completion gateway invocation
#[derive(Error, Debug)]
pub enum CompletionError {
    /// No credential is available, so no request was attempted
    #[error("Completion service is not configured: {0}")]
    Unconfigured(String),

    /// The service answered with an error or with a body we could not use
    #[error("Upstream Error: {0}")]
    Upstream(String),

    #[error("Completion request timed out")]
    Timeout,
}

impl CompletionError {
    /// Short, stable label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::Unconfigured(_) => "unconfigured",
            CompletionError::Upstream(_) => "upstream",
            CompletionError::Timeout => "timeout",
        }
    }
}

/// Result type for completion operations
pub type CompletionResult<T> = Result<T, CompletionError>;
