//! Error types for state operations.

use thiserror::Error;

/// Errors from the state and resource stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// Object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Object already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persisted data could not be decoded.
    #[error("invalid data for key {key}: {value:?}")]
    InvalidData { key: String, value: String },

    /// Backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// Backend rejected or failed the request.
    #[error("storage error: {0}")]
    Storage(String),
}

impl StateError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StateError::NotFound(_))
    }
}

/// Result type for state operations.
pub type StateResult<T> = std::result::Result<T, StateError>;
