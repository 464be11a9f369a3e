//! Collection definitions.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::field::{Field, FieldKind};
use super::rule::{Rule, RuleKind};

/// Primary key column of every collection.
pub const FIELD_ID: &str = "id";
/// Creation timestamp column.
pub const FIELD_CREATED: &str = "created";
/// Update timestamp column.
pub const FIELD_UPDATED: &str = "updated";
/// Email column of auth collections.
pub const FIELD_EMAIL: &str = "email";
/// Flag controlling whether an auth record's email is publicly visible.
pub const FIELD_EMAIL_VISIBILITY: &str = "emailVisibility";
/// Verification flag of auth collections.
pub const FIELD_VERIFIED: &str = "verified";

static BASE_SYSTEM_FIELDS: LazyLock<Vec<Field>> = LazyLock::new(|| {
    vec![
        Field::text(FIELD_ID),
        Field::new(FIELD_CREATED, FieldKind::Autodate),
        Field::new(FIELD_UPDATED, FieldKind::Autodate),
    ]
});

static AUTH_SYSTEM_FIELDS: LazyLock<Vec<Field>> = LazyLock::new(|| {
    vec![
        Field::new(FIELD_EMAIL, FieldKind::Email),
        Field::bool(FIELD_EMAIL_VISIBILITY),
        Field::bool(FIELD_VERIFIED),
        Field::text("password").hidden(),
        Field::text("tokenKey").hidden(),
    ]
});

/// The type of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// Regular record storage.
    #[default]
    Base,
    /// Records that can authenticate.
    Auth,
    /// Read-only collection backed by a query.
    View,
}

/// A named set of records with typed fields and access rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Collection id (defaults to the name when loaded from a document).
    #[serde(default)]
    pub id: String,
    /// Collection name, also the table name.
    pub name: String,
    /// Collection type.
    #[serde(rename = "type", default)]
    pub kind: CollectionKind,
    /// Declared fields. System fields are implicit.
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub list_rule: Rule,
    #[serde(default)]
    pub view_rule: Rule,
    #[serde(default)]
    pub create_rule: Rule,
    #[serde(default)]
    pub update_rule: Rule,
    #[serde(default)]
    pub delete_rule: Rule,
}

impl Collection {
    /// Create a base collection. All rules start superuser-only.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            kind: CollectionKind::Base,
            fields: Vec::new(),
            list_rule: Rule::SuperuserOnly,
            view_rule: Rule::SuperuserOnly,
            create_rule: Rule::SuperuserOnly,
            update_rule: Rule::SuperuserOnly,
            delete_rule: Rule::SuperuserOnly,
        }
    }

    /// Create an auth collection.
    pub fn auth(name: impl Into<String>) -> Self {
        Self {
            kind: CollectionKind::Auth,
            ..Self::new(name)
        }
    }

    /// Set the collection id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Add a field.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Set the list and view rules.
    pub fn with_read_rule(mut self, rule: Rule) -> Self {
        self.list_rule = rule.clone();
        self.view_rule = rule;
        self
    }

    /// Set a single rule.
    pub fn with_rule(mut self, kind: RuleKind, rule: Rule) -> Self {
        match kind {
            RuleKind::List => self.list_rule = rule,
            RuleKind::View => self.view_rule = rule,
            RuleKind::Create => self.create_rule = rule,
            RuleKind::Update => self.update_rule = rule,
            RuleKind::Delete => self.delete_rule = rule,
        }
        self
    }

    /// Get the rule for an operation.
    pub fn rule(&self, kind: RuleKind) -> &Rule {
        match kind {
            RuleKind::List => &self.list_rule,
            RuleKind::View => &self.view_rule,
            RuleKind::Create => &self.create_rule,
            RuleKind::Update => &self.update_rule,
            RuleKind::Delete => &self.delete_rule,
        }
    }

    /// Check if this is an auth collection.
    pub fn is_auth(&self) -> bool {
        self.kind == CollectionKind::Auth
    }

    /// Check if `name_or_id` refers to this collection.
    pub fn matches(&self, name_or_id: &str) -> bool {
        self.id == name_or_id || self.name.eq_ignore_ascii_case(name_or_id)
    }

    /// Look up a field by name, including implicit system fields.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.system_fields().find(|f| f.name == name))
    }

    /// Check if a field exists.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Implicit fields present on every record of this collection.
    pub fn system_fields(&self) -> impl Iterator<Item = &'static Field> + '_ {
        let auth: &'static [Field] = if self.is_auth() {
            AUTH_SYSTEM_FIELDS.as_slice()
        } else {
            &[]
        };
        BASE_SYSTEM_FIELDS.iter().chain(auth.iter())
    }
}
