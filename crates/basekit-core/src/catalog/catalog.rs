//! Catalog holding the active schema.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::{Collection, SchemaBundle};
use crate::error::Error;

/// The catalog of collection definitions.
///
/// Readers take cheap [`Arc`] snapshots; applying a schema swaps the snapshot
/// atomically so resolvers built from an older snapshot keep a consistent view.
pub struct Catalog {
    /// Current schema version (cached).
    current_version: AtomicU64,
    /// Current schema.
    current_schema: RwLock<Arc<SchemaBundle>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            current_version: AtomicU64::new(0),
            current_schema: RwLock::new(Arc::new(SchemaBundle::default())),
        }
    }

    /// Create a catalog from an initial schema.
    pub fn with_schema(bundle: SchemaBundle) -> Result<Self, Error> {
        let catalog = Self::new();
        catalog.apply_schema(bundle)?;
        Ok(catalog)
    }

    /// Get the current schema version.
    pub fn current_version(&self) -> u64 {
        self.current_version.load(Ordering::SeqCst)
    }

    /// Get a snapshot of the current schema.
    pub fn snapshot(&self) -> Arc<SchemaBundle> {
        self.current_schema.read().clone()
    }

    /// Apply a new schema bundle.
    ///
    /// The bundle is validated and receives the next version number, which is
    /// returned.
    pub fn apply_schema(&self, bundle: SchemaBundle) -> Result<u64, Error> {
        let mut bundle = bundle.normalized()?;

        let mut guard = self.current_schema.write();
        let new_version = self.current_version() + 1;
        bundle.version = new_version;
        *guard = Arc::new(bundle);
        self.current_version.store(new_version, Ordering::SeqCst);

        info!(
            version = new_version,
            collections = guard.collections.len(),
            "applied schema"
        );
        Ok(new_version)
    }

    /// Get a collection by name or id from the current schema.
    pub fn collection(&self, name_or_id: &str) -> Option<Arc<Collection>> {
        self.current_schema.read().collection(name_or_id)
    }

    /// List all collection names in the current schema.
    pub fn list_collections(&self) -> Vec<String> {
        self.current_schema
            .read()
            .collections
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Field;

    #[test]
    fn test_empty_catalog() {
        let catalog = Catalog::new();
        assert_eq!(catalog.current_version(), 0);
        assert!(catalog.snapshot().collections.is_empty());
        assert!(catalog.collection("posts").is_none());
    }

    #[test]
    fn test_apply_schema_bumps_version() {
        let catalog = Catalog::new();
        let v1 = catalog
            .apply_schema(SchemaBundle::new(0).with_collection(Collection::new("posts")))
            .unwrap();
        assert_eq!(v1, 1);

        let before = catalog.snapshot();
        let v2 = catalog
            .apply_schema(
                SchemaBundle::new(0).with_collection(
                    Collection::new("posts").with_field(Field::text("title")),
                ),
            )
            .unwrap();
        assert_eq!(v2, 2);

        // Old snapshots are unaffected.
        assert!(!before.collection("posts").unwrap().fields.iter().any(|f| f.name == "title"));
        assert!(catalog.collection("posts").unwrap().has_field("title"));
        assert_eq!(catalog.snapshot().version, 2);
    }

    #[test]
    fn test_apply_invalid_schema_keeps_current() {
        let catalog =
            Catalog::with_schema(SchemaBundle::new(0).with_collection(Collection::new("posts")))
                .unwrap();
        let result = catalog.apply_schema(
            SchemaBundle::new(0)
                .with_collection(Collection::new("tags"))
                .with_collection(Collection::new("tags")),
        );
        assert!(result.is_err());
        assert_eq!(catalog.current_version(), 1);
        assert_eq!(catalog.list_collections(), vec!["posts".to_string()]);
    }
}
