//! Request documents for `--request`.
//!
//! ```json
//! {
//!   "method": "PATCH",
//!   "query": {"page": "2"},
//!   "headers": {"X-Token": "abc"},
//!   "body": {"title": "New"},
//!   "auth": {"collection": "users", "record": {"id": "u1", "email": "a@b.c"}}
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use basekit_core::request::CONTEXT_DEFAULT;
use basekit_core::{Record, RequestInfo, SchemaBundle};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::CliError;

/// On-disk shape of a request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestFile {
    pub context: Option<String>,
    pub method: Option<String>,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Map<String, Value>,
    pub auth: Option<AuthFile>,
}

/// The authenticated record of a request.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthFile {
    /// Auth collection name or id.
    pub collection: String,
    #[serde(default)]
    pub record: Map<String, Value>,
}

impl RequestFile {
    /// Read a request document.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let json = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Build request info, resolving the auth collection in `schema`.
    pub fn into_request_info(self, schema: &SchemaBundle) -> Result<RequestInfo, CliError> {
        let mut info = RequestInfo::new(self.method.unwrap_or_else(|| "GET".to_string()))
            .with_context(self.context.unwrap_or_else(|| CONTEXT_DEFAULT.to_string()));
        for (key, value) in self.query {
            info = info.with_query(key, value);
        }
        for (key, value) in &self.headers {
            info = info.with_header(key, value.clone());
        }
        for (key, value) in self.body {
            info = info.with_body(key, value);
        }

        if let Some(auth) = self.auth {
            let collection = schema
                .collection(&auth.collection)
                .ok_or_else(|| CliError::UnknownCollection(auth.collection.clone()))?;
            if !collection.is_auth() {
                return Err(CliError::Request(format!(
                    "auth collection {:?} is not an auth collection",
                    collection.name
                )));
            }
            if !auth.record.get("id").is_some_and(Value::is_string) {
                return Err(CliError::Request("auth record needs a string \"id\"".into()));
            }
            info = info.with_auth(Record::from_data(collection, auth.record));
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basekit_core::Collection;
    use serde_json::json;
    use std::io::Write;

    fn schema() -> SchemaBundle {
        SchemaBundle::new(1)
            .with_collection(Collection::auth("users"))
            .with_collection(Collection::new("posts"))
    }

    #[test]
    fn test_load_and_convert() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "method": "PATCH",
                "query": {{"page": "2"}},
                "headers": {{"X-Token": "abc"}},
                "body": {{"title": "New"}},
                "auth": {{"collection": "users", "record": {{"id": "u1"}}}}
            }}"#
        )
        .unwrap();

        let info = RequestFile::load(file.path())
            .unwrap()
            .into_request_info(&schema())
            .unwrap();
        assert_eq!(info.method, "PATCH");
        assert_eq!(info.context, CONTEXT_DEFAULT);
        assert_eq!(info.query.get("page").map(String::as_str), Some("2"));
        assert_eq!(info.headers.get("x_token").map(String::as_str), Some("abc"));
        assert_eq!(info.body.get("title"), Some(&json!("New")));
        assert_eq!(info.auth.as_ref().map(|a| a.id()), Some("u1"));
    }

    #[test]
    fn test_defaults() {
        let info = RequestFile::default().into_request_info(&schema()).unwrap();
        assert_eq!(info.method, "GET");
        assert!(info.auth.is_none());
    }

    #[test]
    fn test_invalid_auth() {
        let request: RequestFile = serde_json::from_value(json!({
            "auth": {"collection": "posts", "record": {"id": "p1"}}
        }))
        .unwrap();
        assert!(matches!(
            request.into_request_info(&schema()),
            Err(CliError::Request(_))
        ));

        let request: RequestFile = serde_json::from_value(json!({
            "auth": {"collection": "users", "record": {}}
        }))
        .unwrap();
        assert!(matches!(
            request.into_request_info(&schema()),
            Err(CliError::Request(_))
        ));

        let request: RequestFile = serde_json::from_value(json!({
            "auth": {"collection": "nope"}
        }))
        .unwrap();
        assert!(matches!(
            request.into_request_info(&schema()),
            Err(CliError::UnknownCollection(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RequestFile::load(&dir.path().join("missing.json")),
            Err(CliError::Read { .. })
        ));
    }
}
