//! Error types for fxq-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid ticker: {0:?}")]
    InvalidTicker(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
