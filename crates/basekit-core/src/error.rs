//! Core error types.

use thiserror::Error;

/// Catalog and schema loading errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading a schema file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A schema document is not valid JSON or does not match the format.
    #[error("invalid schema json: {0}")]
    Json(#[from] serde_json::Error),

    /// Two collections share a name or id.
    #[error("duplicate collection {0:?}")]
    DuplicateCollection(String),

    /// A collection defines the same field name twice.
    #[error("duplicate field {field:?} in collection {collection:?}")]
    DuplicateField {
        /// Collection name.
        collection: String,
        /// Field name.
        field: String,
    },

    /// A collection or field name is not a plain identifier.
    #[error("invalid name {0:?}: only letters, digits and '_' are allowed")]
    InvalidName(String),

    /// A referenced collection does not exist.
    #[error("unknown collection {0:?}")]
    UnknownCollection(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DuplicateField {
            collection: "posts".to_string(),
            field: "title".to_string(),
        };
        assert!(err.to_string().contains("\"title\""));
        assert!(err.to_string().contains("\"posts\""));

        let err = Error::InvalidName("bad-name".into());
        assert!(err.to_string().contains("bad-name"));
    }
}
