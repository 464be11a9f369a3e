//! Field definitions for collections.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A field definition within a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field id (optional in schema documents).
    #[serde(default)]
    pub id: String,
    /// Field name, also the column name.
    pub name: String,
    /// Hidden fields are only visible to privileged callers.
    #[serde(default)]
    pub hidden: bool,
    /// Field type and type-specific options.
    #[serde(flatten)]
    pub kind: FieldKind,
}

/// The kind of a field together with its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Bool,
    Email,
    Url,
    Date,
    Autodate,
    Select {
        #[serde(rename = "maxSelect", default = "default_max_select")]
        max_select: u32,
        #[serde(default)]
        values: Vec<String>,
    },
    File {
        #[serde(rename = "maxSelect", default = "default_max_select")]
        max_select: u32,
    },
    Relation(RelationOptions),
    Json,
}

fn default_max_select() -> u32 {
    1
}

/// Options of a relation field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationOptions {
    /// Target collection id (or name).
    pub collection_id: String,
    /// More than one selectable id makes the field multi-valued.
    #[serde(default = "default_max_select")]
    pub max_select: u32,
    /// Delete the referencing record when the target is deleted.
    #[serde(default)]
    pub cascade_delete: bool,
    /// Whether the field carries a unique index. Single unique relations make
    /// the back-relation single-valued.
    #[serde(default)]
    pub unique: bool,
}

impl RelationOptions {
    /// Create relation options targeting a collection.
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            max_select: 1,
            cascade_delete: false,
            unique: false,
        }
    }

    /// Set the maximum number of selectable ids.
    pub fn with_max_select(mut self, max_select: u32) -> Self {
        self.max_select = max_select;
        self
    }

    /// Mark the relation column as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            hidden: false,
            kind,
        }
    }

    /// Create a text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Create a number field.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    /// Create a bool field.
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    /// Create a JSON field.
    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Json)
    }

    /// Create a select field.
    pub fn select(name: impl Into<String>, values: &[&str], max_select: u32) -> Self {
        Self::new(
            name,
            FieldKind::Select {
                max_select,
                values: values.iter().map(|v| v.to_string()).collect(),
            },
        )
    }

    /// Create a file field.
    pub fn file(name: impl Into<String>, max_select: u32) -> Self {
        Self::new(name, FieldKind::File { max_select })
    }

    /// Create a relation field.
    pub fn relation(name: impl Into<String>, options: RelationOptions) -> Self {
        Self::new(name, FieldKind::Relation(options))
    }

    /// Set the field id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Mark the field hidden.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Check if the field stores more than one value.
    pub fn is_multiple(&self) -> bool {
        match &self.kind {
            FieldKind::Select { max_select, .. } | FieldKind::File { max_select } => {
                *max_select > 1
            }
            FieldKind::Relation(options) => options.max_select > 1,
            _ => false,
        }
    }

    /// Check if the field stores arbitrary JSON.
    pub fn is_json(&self) -> bool {
        matches!(self.kind, FieldKind::Json)
    }

    /// Relation options, if this is a relation field.
    pub fn relation_options(&self) -> Option<&RelationOptions> {
        match &self.kind {
            FieldKind::Relation(options) => Some(options),
            _ => None,
        }
    }

    /// Normalize a submitted request value to the shape this field stores.
    ///
    /// Numeric and boolean strings (as sent by form posts) become numbers and
    /// booleans, single-valued list fields keep the last submitted element and
    /// multi-valued ones wrap scalars in an array.
    pub fn cast_request_value(&self, value: &Value) -> Value {
        match (&self.kind, value) {
            (FieldKind::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(number_value)
                .unwrap_or_else(|| value.clone()),
            (FieldKind::Number, Value::Bool(b)) => Value::from(u8::from(*b)),
            (FieldKind::Bool, Value::String(s)) => match s.trim() {
                "true" | "1" | "on" => Value::Bool(true),
                "false" | "0" | "off" | "" => Value::Bool(false),
                _ => value.clone(),
            },
            (FieldKind::Bool, Value::Number(n)) => Value::Bool(n.as_f64() != Some(0.0)),
            (
                FieldKind::Select { .. } | FieldKind::File { .. } | FieldKind::Relation(_),
                Value::Array(items),
            ) if !self.is_multiple() => items
                .last()
                .cloned()
                .unwrap_or_else(|| Value::String(String::new())),
            (
                FieldKind::Select { .. } | FieldKind::File { .. } | FieldKind::Relation(_),
                Value::String(_),
            ) if self.is_multiple() => Value::Array(vec![value.clone()]),
            _ => value.clone(),
        }
    }
}

/// Convert a float to a JSON number, keeping integral values integral.
pub(crate) fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(Value::from(n as i64))
    } else {
        serde_json::Number::from_f64(n).map(Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_json_shape() {
        let field: Field = serde_json::from_value(json!({
            "name": "author",
            "type": "relation",
            "collectionId": "users",
            "maxSelect": 1,
            "unique": true
        }))
        .unwrap();
        assert_eq!(field.name, "author");
        let options = field.relation_options().unwrap();
        assert_eq!(options.collection_id, "users");
        assert!(options.unique);
        assert!(!field.is_multiple());

        let field: Field =
            serde_json::from_value(json!({"name": "tags", "type": "select", "maxSelect": 3}))
                .unwrap();
        assert!(field.is_multiple());

        let field: Field =
            serde_json::from_value(json!({"name": "secret", "type": "text", "hidden": true}))
                .unwrap();
        assert_eq!(field, Field::text("secret").hidden());
    }

    #[test]
    fn test_is_multiple() {
        assert!(!Field::text("title").is_multiple());
        assert!(Field::file("docs", 5).is_multiple());
        assert!(!Field::file("avatar", 1).is_multiple());
        assert!(Field::relation("tags", RelationOptions::new("tags").with_max_select(9)).is_multiple());
    }

    #[test]
    fn test_cast_request_value() {
        assert_eq!(Field::number("n").cast_request_value(&json!("12")), json!(12));
        assert_eq!(Field::number("n").cast_request_value(&json!("1.5")), json!(1.5));
        assert_eq!(Field::number("n").cast_request_value(&json!("abc")), json!("abc"));
        assert_eq!(Field::bool("b").cast_request_value(&json!("true")), json!(true));
        assert_eq!(Field::bool("b").cast_request_value(&json!("0")), json!(false));
        assert_eq!(
            Field::select("s", &["a", "b"], 1).cast_request_value(&json!(["a", "b"])),
            json!("b")
        );
        assert_eq!(
            Field::select("s", &["a", "b"], 2).cast_request_value(&json!("a")),
            json!(["a"])
        );
        assert_eq!(Field::text("t").cast_request_value(&json!("12")), json!("12"));
    }
}
