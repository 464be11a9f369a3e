//! Collection catalog.
//!
//! Collections, their fields and access rules, grouped into a versioned
//! [`SchemaBundle`] that the [`Catalog`] hands out as immutable snapshots.

#[allow(clippy::module_inception)]
mod catalog;
mod collection;
mod field;
mod rule;
mod schema;

pub use catalog::Catalog;
pub use collection::{
    Collection, CollectionKind, FIELD_CREATED, FIELD_EMAIL, FIELD_EMAIL_VISIBILITY, FIELD_ID,
    FIELD_UPDATED, FIELD_VERIFIED,
};
pub use field::{Field, FieldKind, RelationOptions};
pub(crate) use field::number_value;
pub use rule::{Rule, RuleKind};
pub use schema::SchemaBundle;
