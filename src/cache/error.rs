//! Cache-specific error types

use std::fmt;

/// Cache operation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A key could not be built or parsed
    KeyError(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::KeyError(msg) => write!(f, "Cache key error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
