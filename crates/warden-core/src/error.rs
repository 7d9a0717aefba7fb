//! Core error types.

use thiserror::Error;

/// Errors that can occur resolving shared filesystem conventions.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Neither `$WARDEN_HOME` nor `$HOME` is set.
    #[error("cannot resolve home directory: {0}")]
    HomeNotFound(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
