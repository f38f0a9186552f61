//! Error types for cached-result

use std::fmt;

use cached_result_store::StoreError;
use thiserror::Error;

use crate::template::TemplateError;

/// Result type alias using the crate error
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Attribute operation that may be unsupported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOp {
    /// Assigning a new value
    Set,
    /// Deleting the value
    Delete,
}

impl fmt::Display for AttributeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeOp::Set => f.write_str("set"),
            AttributeOp::Delete => f.write_str("delete"),
        }
    }
}

/// Errors raised by the caching layer
///
/// Wrappers return the caller's own error type `E: From<Error>`; target,
/// setter and deleter failures are passed through as produced and never
/// turned into one of these variants.
#[derive(Debug, Error)]
pub enum Error {
    /// A key or id strategy that is neither a callable nor a template
    #[error("{0} keys are invalid")]
    InvalidKeySpec(String),

    /// Write or delete on an attribute with no setter or deleter
    #[error("can't {op} attribute `{attribute}`")]
    UnsupportedOperation {
        /// Rejected operation
        op: AttributeOp,
        /// Attribute name
        attribute: String,
    },

    /// A key template failed to parse or render
    #[error("cannot format cache key: {0}")]
    KeyFormat(#[from] TemplateError),

    /// A method wrapper was called without an instance
    #[error("`{0}` must be called through a bound instance")]
    Unbound(String),

    /// A missing or mistyped call argument
    #[error("argument error: {0}")]
    Argument(String),

    /// A value could not be converted to or from its stored form
    #[error("cached value codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Failure reported by the persistent cache backend
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Failure of a wrapped computation, for callers using this type as
    /// their own error type
    #[error(transparent)]
    Computation(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap a computation failure
    pub fn computation<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Computation(err.into())
    }

    pub(crate) fn unsupported(op: AttributeOp, attribute: &str) -> Self {
        Error::UnsupportedOperation {
            op,
            attribute: attribute.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::InvalidKeySpec("int".to_string()).to_string(), "int keys are invalid");
        assert_eq!(
            Error::unsupported(AttributeOp::Set, "name").to_string(),
            "can't set attribute `name`"
        );
        assert_eq!(
            Error::unsupported(AttributeOp::Delete, "name").to_string(),
            "can't delete attribute `name`"
        );
        assert_eq!(
            Error::computation("boom").to_string(),
            "boom"
        );
    }

    #[test]
    fn test_store_error_passes_through() {
        let err: Error = StoreError::Unavailable("down".to_string()).into();
        assert!(matches!(err, Error::Store(StoreError::Unavailable(_))));
        assert_eq!(err.to_string(), "cache backend unavailable: down");
    }
}
