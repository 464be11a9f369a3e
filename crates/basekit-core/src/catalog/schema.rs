//! Schema bundle containing all collection definitions.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Collection;
use crate::error::Error;

/// A complete, versioned schema: the set of collections a resolver can see.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Schema version number.
    #[serde(default)]
    pub version: u64,
    /// Collection definitions.
    pub collections: Vec<Arc<Collection>>,
}

impl SchemaBundle {
    /// Create an empty schema bundle.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            collections: Vec::new(),
        }
    }

    /// Add a collection.
    pub fn with_collection(mut self, collection: Collection) -> Self {
        self.collections.push(Arc::new(collection));
        self
    }

    /// Look up a collection by id, then by name (case-insensitive).
    pub fn collection(&self, name_or_id: &str) -> Option<Arc<Collection>> {
        self.collections
            .iter()
            .find(|c| c.id == name_or_id)
            .or_else(|| {
                self.collections
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(name_or_id))
            })
            .cloned()
    }

    /// Get all collection names.
    pub fn collection_names(&self) -> Vec<&str> {
        self.collections.iter().map(|c| c.name.as_str()).collect()
    }

    /// Parse a schema document.
    ///
    /// Accepts either a bare array of collections or an object with a
    /// `collections` array. Missing collection ids default to the name.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Document {
            Bundle(SchemaBundle),
            Collections(Vec<Collection>),
        }

        let bundle = match serde_json::from_str::<Document>(json)? {
            Document::Bundle(bundle) => bundle,
            Document::Collections(collections) => Self {
                version: 0,
                collections: collections.into_iter().map(Arc::new).collect(),
            },
        };
        bundle.normalized()
    }

    /// Read and parse a schema document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Fill defaults and validate the bundle.
    pub fn normalized(mut self) -> Result<Self, Error> {
        for collection in &mut self.collections {
            if collection.id.is_empty() {
                let c = Arc::make_mut(collection);
                c.id = c.name.clone();
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate names, uniqueness and relation targets.
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for collection in &self.collections {
            if !is_identifier(&collection.name) {
                return Err(Error::InvalidName(collection.name.clone()));
            }
            if !seen.insert(collection.name.to_ascii_lowercase()) {
                return Err(Error::DuplicateCollection(collection.name.clone()));
            }
            if collection.id != collection.name && !seen.insert(collection.id.clone()) {
                return Err(Error::DuplicateCollection(collection.id.clone()));
            }

            let mut fields = HashSet::new();
            for field in &collection.fields {
                if !is_identifier(&field.name) {
                    return Err(Error::InvalidName(field.name.clone()));
                }
                if !fields.insert(field.name.as_str()) {
                    return Err(Error::DuplicateField {
                        collection: collection.name.clone(),
                        field: field.name.clone(),
                    });
                }
                if let Some(options) = field.relation_options() {
                    if self.collection(&options.collection_id).is_none() {
                        return Err(Error::UnknownCollection(options.collection_id.clone()));
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Field, RelationOptions};

    fn sample() -> SchemaBundle {
        SchemaBundle::new(1)
            .with_collection(Collection::auth("users"))
            .with_collection(
                Collection::new("posts")
                    .with_id("pbc_posts")
                    .with_field(Field::text("title"))
                    .with_field(Field::relation("author", RelationOptions::new("users"))),
            )
    }

    #[test]
    fn test_collection_lookup() {
        let bundle = sample();
        assert_eq!(bundle.collection("pbc_posts").unwrap().name, "posts");
        assert_eq!(bundle.collection("Posts").unwrap().id, "pbc_posts");
        assert!(bundle.collection("comments").is_none());
        assert_eq!(bundle.collection_names(), vec!["users", "posts"]);
        assert!(bundle.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let bundle = sample().with_collection(Collection::new("POSTS"));
        assert!(matches!(
            bundle.validate(),
            Err(Error::DuplicateCollection(name)) if name == "POSTS"
        ));

        let bundle = SchemaBundle::new(1).with_collection(
            Collection::new("posts")
                .with_field(Field::text("title"))
                .with_field(Field::number("title")),
        );
        assert!(matches!(bundle.validate(), Err(Error::DuplicateField { .. })));
    }

    #[test]
    fn test_validate_rejects_dangling_relation() {
        let bundle = SchemaBundle::new(1).with_collection(
            Collection::new("posts")
                .with_field(Field::relation("author", RelationOptions::new("missing"))),
        );
        assert!(matches!(bundle.validate(), Err(Error::UnknownCollection(_))));
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let bundle = SchemaBundle::new(1).with_collection(Collection::new("my posts"));
        assert!(matches!(bundle.validate(), Err(Error::InvalidName(_))));
    }

    #[test]
    fn test_from_json_array() {
        let bundle = SchemaBundle::from_json(
            r#"[
                {"name": "users", "type": "auth"},
                {"name": "posts", "listRule": "", "fields": [
                    {"name": "author", "type": "relation", "collectionId": "users"}
                ]}
            ]"#,
        )
        .unwrap();
        let posts = bundle.collection("posts").unwrap();
        assert_eq!(posts.id, "posts");
        assert_eq!(bundle.collections.len(), 2);
    }

    #[test]
    fn test_from_json_round_trip() {
        let bundle = sample();
        let parsed = SchemaBundle::from_json(&bundle.to_json().unwrap()).unwrap();
        assert_eq!(parsed, bundle);
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{"version": 3, "collections": [{"name": "tags"}]}"#).unwrap();
        let bundle = SchemaBundle::from_path(&path).unwrap();
        assert_eq!(bundle.version, 3);
        assert!(bundle.collection("tags").is_some());

        assert!(matches!(
            SchemaBundle::from_path(dir.path().join("missing.json")),
            Err(Error::Io(_))
        ));
    }
}
