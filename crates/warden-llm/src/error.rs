//! LLM-related error types.
//!
//! The actual provider HTTP calls are out of scope for this crate; this
//! enum covers the failures the rest of the control plane needs to
//! represent — a malformed history, an unclassifiable response, and so on.

use thiserror::Error;

/// Errors that can occur while working with the conversational data model.
#[derive(Debug, Error)]
pub enum LlmError {
    /// A message part carried an unsupported discriminator.
    #[error("unsupported content part: {0}")]
    UnsupportedContentPart(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for LLM data-model operations.
pub type LlmResult<T> = Result<T, LlmError>;
