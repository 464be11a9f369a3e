//! Records and their public/privileged export.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::catalog::{Collection, FIELD_EMAIL, FIELD_EMAIL_VISIBILITY, FIELD_ID};

/// How much of a record an export exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportView {
    /// Include the email of auth records even when `emailVisibility` is off.
    pub ignore_email_visibility: bool,
    /// Include hidden fields.
    pub include_hidden: bool,
}

impl ExportView {
    /// The view an unprivileged reader gets.
    pub fn public() -> Self {
        Self::default()
    }

    /// Everything, including hidden fields and private emails.
    pub fn unrestricted() -> Self {
        Self {
            ignore_email_visibility: true,
            include_hidden: true,
        }
    }
}

/// A single record of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    collection: Arc<Collection>,
    data: Map<String, Value>,
}

impl Record {
    /// Create an empty record.
    pub fn new(collection: Arc<Collection>) -> Self {
        Self {
            collection,
            data: Map::new(),
        }
    }

    /// Create a record from stored data.
    pub fn from_data(collection: Arc<Collection>, data: Map<String, Value>) -> Self {
        Self { collection, data }
    }

    /// Set a value (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// The record id, empty if unset.
    pub fn id(&self) -> &str {
        self.data.get(FIELD_ID).and_then(Value::as_str).unwrap_or("")
    }

    /// The collection this record belongs to.
    pub fn collection(&self) -> &Arc<Collection> {
        &self.collection
    }

    /// Whether the record's email may be shown to other users.
    pub fn email_visibility(&self) -> bool {
        self.data
            .get(FIELD_EMAIL_VISIBILITY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Export the record's known fields as a JSON object.
    ///
    /// Values of keys that are not fields of the collection are dropped.
    /// `collectionId` and `collectionName` are always present.
    pub fn export(&self, view: ExportView) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert(
            "collectionId".to_string(),
            Value::String(self.collection.id.clone()),
        );
        out.insert(
            "collectionName".to_string(),
            Value::String(self.collection.name.clone()),
        );

        for (key, value) in &self.data {
            let Some(field) = self.collection.field(key) else {
                continue;
            };
            if field.hidden && !view.include_hidden {
                continue;
            }
            if self.collection.is_auth()
                && key == FIELD_EMAIL
                && !view.ignore_email_visibility
                && !self.email_visibility()
            {
                continue;
            }
            out.insert(key.clone(), value.clone());
        }
        out
    }

    /// Export with public visibility rules.
    pub fn public_export(&self) -> Map<String, Value> {
        self.export(ExportView::public())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Field;
    use serde_json::json;

    fn user() -> Record {
        let users = Arc::new(Collection::auth("users").with_field(Field::text("secret").hidden()));
        Record::new(users)
            .with("id", "u1")
            .with("email", "u1@example.com")
            .with("emailVisibility", false)
            .with("secret", "s3")
            .with("unknown", 1)
    }

    #[test]
    fn test_public_export_hides_private_data() {
        let out = user().public_export();
        assert_eq!(out.get("id"), Some(&json!("u1")));
        assert_eq!(out.get("collectionName"), Some(&json!("users")));
        assert!(out.get("email").is_none());
        assert!(out.get("secret").is_none());
        assert!(out.get("unknown").is_none());
    }

    #[test]
    fn test_unrestricted_export() {
        let record = user();
        let out = record.export(ExportView::unrestricted());
        assert_eq!(out.get("email"), Some(&json!("u1@example.com")));
        assert_eq!(out.get("secret"), Some(&json!("s3")));
        // Exporting never mutates the record.
        assert!(!record.email_visibility());
        assert_eq!(record.get("email"), Some(&json!("u1@example.com")));
    }

    #[test]
    fn test_visible_email() {
        let out = user().with("emailVisibility", true).public_export();
        assert_eq!(out.get("email"), Some(&json!("u1@example.com")));
        assert_eq!(user().id(), "u1");
    }
}
