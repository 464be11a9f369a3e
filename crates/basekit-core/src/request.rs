//! Per-request information available to filters as `@request.*`.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::record::Record;

/// Default request context.
pub const CONTEXT_DEFAULT: &str = "default";
/// Realtime subscription messages.
pub const CONTEXT_REALTIME: &str = "realtime";
/// Protected file token checks.
pub const CONTEXT_PROTECTED_FILE: &str = "protectedFile";
/// OAuth2 sign-in.
pub const CONTEXT_OAUTH2: &str = "oauth2";
/// One-time-password sign-in.
pub const CONTEXT_OTP: &str = "otp";
/// Password sign-in.
pub const CONTEXT_PASSWORD: &str = "password";

/// Data of the request being authorized.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    /// The context the request was made in.
    pub context: String,
    /// HTTP method.
    pub method: String,
    /// Query parameters.
    pub query: HashMap<String, String>,
    /// Headers keyed by normalized name, see [`normalize_header_key`].
    pub headers: HashMap<String, String>,
    /// Submitted body.
    pub body: Map<String, Value>,
    /// The authenticated record, if any.
    pub auth: Option<Record>,
}

impl Default for RequestInfo {
    fn default() -> Self {
        Self::new("GET")
    }
}

impl RequestInfo {
    /// Create request info for a method in the default context.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            context: CONTEXT_DEFAULT.to_string(),
            method: method.into(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: Map::new(),
            auth: None,
        }
    }

    /// Set the request context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Add a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a header. The name is normalized.
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(normalize_header_key(key), value.into());
        self
    }

    /// Add a body value.
    pub fn with_body(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    /// Set the authenticated record.
    pub fn with_auth(mut self, auth: Record) -> Self {
        self.auth = Some(auth);
        self
    }
}

/// Normalize a header name for lookup: lowercase with `-` replaced by `_`.
pub fn normalize_header_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('-', "_")
}
