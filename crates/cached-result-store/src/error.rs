//! Error types for cache backends

use thiserror::Error;

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors a cache backend may report
///
/// A missing key is never an error; backends answer `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the key
    #[error("invalid cache key {key:?}: {reason}")]
    InvalidKey {
        /// Offending key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// Any other backend-specific failure
    #[error(transparent)]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wrap an arbitrary backend failure
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}
