//! Store error definitions.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the external store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transport or connection failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete before its deadline.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// No store was ever initialized.
    #[error("store not configured")]
    NotConfigured,

    /// The key holds a value of another type.
    #[error("wrong value type at key '{0}'")]
    WrongType(String),
}

impl StoreError {
    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Timeout(_) => "timeout",
            StoreError::NotConfigured => "not_configured",
            StoreError::WrongType(_) => "wrong_type",
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
