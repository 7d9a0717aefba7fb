//! Credential store error types.

use thiserror::Error;

/// Errors that can occur working with the auth profile store.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// The underlying storage backend failed.
    #[error("storage error: {0}")]
    Storage(#[from] warden_storage::StorageError),

    /// The stored document failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for credential store operations.
pub type CredentialsResult<T> = Result<T, CredentialsError>;
