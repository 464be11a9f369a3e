//! CLI error types.

use std::path::PathBuf;

use basekit_core::ResolveError;
use thiserror::Error;

/// Errors reported by the `basekit` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// The schema file could not be loaded.
    #[error("failed to load schema: {0}")]
    Schema(#[from] basekit_core::Error),

    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A request file is not valid JSON.
    #[error("invalid request file: {0}")]
    RequestJson(#[from] serde_json::Error),

    /// A request file is valid JSON but describes an impossible request.
    #[error("invalid request file: {0}")]
    Request(String),

    /// The named collection is not in the schema.
    #[error("unknown collection {0:?}")]
    UnknownCollection(String),

    /// A filter or sort expression could not be compiled.
    #[error("{0}")]
    Resolve(#[from] ResolveError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Resolve(err) if err.is_access_denied() => 3,
            CliError::Resolve(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::UnknownCollection("x".into()).exit_code(), 1);
        assert_eq!(
            CliError::Resolve(ResolveError::PermissionDenied("no".into())).exit_code(),
            3
        );
        assert_eq!(
            CliError::Resolve(ResolveError::InvalidQuery("bad".into())).exit_code(),
            2
        );
    }

    #[test]
    fn test_display() {
        let err = CliError::UnknownCollection("posts".into());
        assert_eq!(err.to_string(), "unknown collection \"posts\"");
    }
}
