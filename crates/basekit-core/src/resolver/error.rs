//! Resolver error types.

use basekit_lang::ParseError;
use thiserror::Error;

/// Errors raised while resolving field paths or compiling filters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// The path references something the schema does not define.
    #[error("unknown field {path:?}: {reason}")]
    UnknownField { path: String, reason: String },

    /// The path is malformed or uses a modifier where it is not allowed.
    #[error("invalid field path {path:?}: {reason}")]
    InvalidFormat { path: String, reason: String },

    /// The caller may not access a field or collection.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The path chains more relations than allowed.
    #[error("field path {path:?} exceeds the maximum relation depth of {max}")]
    MaxDepthExceeded { path: String, max: usize },

    /// A filter expression or stored rule failed to parse.
    #[error("invalid filter: {0}")]
    Parse(#[from] ParseError),

    /// The query cannot be built.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl ResolveError {
    /// Create an unknown field error.
    pub fn unknown_field(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ResolveError::UnknownField {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid format error.
    pub fn invalid_format(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ResolveError::InvalidFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error should be reported as an access failure rather than
    /// a bad request.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, ResolveError::PermissionDenied(_))
    }
}

/// Result type for resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ResolveError::MaxDepthExceeded {
            path: "a.b.c".into(),
            max: 2,
        };
        assert_eq!(
            err.to_string(),
            "field path \"a.b.c\" exceeds the maximum relation depth of 2"
        );
        assert!(!err.is_access_denied());
        assert!(ResolveError::PermissionDenied("hidden".into()).is_access_denied());
    }

    #[test]
    fn test_from_parse_error() {
        let err: ResolveError = basekit_lang::parse_filter("a =").unwrap_err().into();
        assert!(matches!(err, ResolveError::Parse(_)));
    }
}
