//! AI gateway error types.

use thiserror::Error;

pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    /// Hard precondition: the user has not configured an API key. Surfaced
    /// to the caller, never retried.
    #[error("No API key configured. Please go to Settings and add your API key.")]
    MissingApiKey,

    #[error("AI backend error: {0}")]
    Backend(String),

    #[error("Invalid AI response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AiError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}
