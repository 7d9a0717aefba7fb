//! Runtime error types.

use thiserror::Error;

use crate::contract::ContractValidationError;

/// Errors that can occur in the context discipline, failure economics, and
/// session auto-compaction engines.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The supplied context window was zero (or otherwise non-positive).
    #[error("invalid context window: {0}")]
    InvalidContextWindow(String),

    /// The supplied budget ratios were negative or summed to more than
    /// `1.0` (within tolerance).
    #[error("invalid budget ratios: {0}")]
    InvalidRatios(String),

    /// The underlying session store failed.
    #[error("storage error: {0}")]
    Storage(#[from] warden_storage::StorageError),

    /// A stored document failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A boundary-crossing data envelope (§7) failed contract validation.
    #[error("contract validation failed: {0:?}")]
    Contract(Vec<ContractValidationError>),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
