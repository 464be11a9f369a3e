//! `@request.*` paths.
//!
//! Request values are known before the query runs, so most of them are bound
//! as parameters. Only paths that walk relations from the authenticated record
//! or from submitted relation ids need joins.

use serde_json::{Map, Value};
use tracing::debug;

use super::error::{ResolveError, ResolveResult};
use super::path::{FieldPath, Modifier};
use super::resolved::ResolvedField;
use super::walk::Walker;
use super::RecordFieldResolver;
use crate::catalog::Field;
use crate::record::ExportView;
use crate::request::{normalize_header_key, RequestInfo};

/// The request as a JSON document, as seen by `@request.*` lookups.
///
/// The authenticated record is exported unrestricted (hidden fields and a
/// private email included) without modifying the record.
pub(crate) fn static_request_info(info: Option<&RequestInfo>) -> Value {
    let Some(info) = info else {
        return Value::Null;
    };

    let strings = |map: &std::collections::HashMap<String, String>| -> Value {
        Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    };
    let headers = info
        .headers
        .iter()
        .map(|(k, v)| (normalize_header_key(k), v.clone()))
        .collect();

    let mut out = Map::new();
    out.insert("context".into(), Value::String(info.context.clone()));
    out.insert("method".into(), Value::String(info.method.clone()));
    out.insert("query".into(), strings(&info.query));
    out.insert("headers".into(), strings(&headers));
    out.insert("body".into(), Value::Object(info.body.clone()));
    out.insert(
        "auth".into(),
        info.auth
            .as_ref()
            .map(|r| Value::Object(r.export(ExportView::unrestricted())))
            .unwrap_or(Value::Null),
    );
    Value::Object(out)
}

impl RecordFieldResolver {
    pub(crate) fn resolve_request(&mut self, path: &FieldPath) -> ResolveResult<ResolvedField> {
        let segments = &path.segments;
        let modifier = path.modifier;

        match segments[0].as_str() {
            "context" | "method" | "query" | "headers" | "body" | "auth" => {}
            other => {
                return Err(ResolveError::unknown_field(
                    &path.raw,
                    format!("unknown request property {other:?}"),
                ))
            }
        }

        if self.context.request_info.is_none() {
            debug!(path = %path.raw, "no request info, resolving to NULL");
            return absent(modifier);
        }

        match segments[0].as_str() {
            "auth" if segments.len() > 2 => self.resolve_request_auth(path),
            "body" if segments.len() > 1 => self.resolve_request_body(path),
            _ => self.resolve_static(path, segments, None),
        }
    }

    /// Deep auth paths walk relations from the authenticated record.
    fn resolve_request_auth(&mut self, path: &FieldPath) -> ResolveResult<ResolvedField> {
        let Some(auth) = self
            .context
            .request_info
            .as_ref()
            .and_then(|info| info.auth.as_ref())
        else {
            return absent(path.modifier);
        };

        let collection = self
            .lookup_collection(&auth.collection().id)
            .unwrap_or_else(|| auth.collection().clone());
        let id = auth.id().to_string();

        let mut walker = Walker::new(self, &path.raw);
        walker.enter_auth(collection, &id)?;
        walker.process(&path.segments[1..], path.modifier)
    }

    fn resolve_request_body(&mut self, path: &FieldPath) -> ResolveResult<ResolvedField> {
        let segments = &path.segments;
        let base = self.context.base_collection.clone();
        let Some(field) = base.field(&segments[1]) else {
            return self.resolve_static(path, segments, None);
        };

        if field.relation_options().is_some() && segments.len() > 2 {
            let ids = string_list(self.body_value(&field.name));
            if ids.is_empty() {
                return absent(path.modifier);
            }
            let mut walker = Walker::new(self, &path.raw);
            walker.enter_body_relation(field, &ids)?;
            return walker.process(&segments[2..], path.modifier);
        }

        if segments.len() == 2 {
            match path.modifier {
                Some(Modifier::Each) => {
                    require_multiple(path, field)?;
                    let items = string_list(self.body_value(&field.name));
                    return Walker::new(self, &path.raw).body_each(field, &items);
                }
                Some(Modifier::Length) => {
                    require_multiple(path, field)?;
                    let count = string_list(self.body_value(&field.name)).len();
                    return Ok(self.bind(Value::from(count)));
                }
                Some(Modifier::Changed) => return Ok(self.body_changed(field)),
                _ => return self.resolve_static(path, segments, Some(field)),
            }
        }

        self.resolve_static(path, segments, None)
    }

    /// Bind a value looked up in the static request document.
    fn resolve_static(
        &mut self,
        path: &FieldPath,
        segments: &[String],
        cast: Option<&Field>,
    ) -> ResolveResult<ResolvedField> {
        let mut keys = segments.to_vec();
        if keys.len() > 1 && keys[0] == "headers" {
            keys[1] = normalize_header_key(&keys[1]);
        }
        let value = lookup(&self.static_request, &keys).cloned();

        match path.modifier {
            Some(Modifier::Isset) => {
                return Ok(ResolvedField::literal(if value.is_some() { "TRUE" } else { "FALSE" }))
            }
            Some(m @ (Modifier::Changed | Modifier::Each | Modifier::Length)) => {
                return Err(ResolveError::invalid_format(
                    &path.raw,
                    format!(":{m} is only supported for @request.body fields of the collection"),
                ))
            }
            Some(Modifier::Lower) | None => {}
        }

        let value = match value {
            None | Some(Value::Null) => return Ok(ResolvedField::literal("NULL")),
            Some(value) => match cast {
                Some(field) => field.cast_request_value(&value),
                None => value,
            },
        };
        let value = match value {
            Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
            scalar => scalar,
        };

        let mut result = self.bind(value);
        if path.modifier == Some(Modifier::Lower) {
            result.identifier = format!("LOWER({})", result.identifier);
        }
        Ok(result)
    }

    /// Whether a submitted value differs from the stored record.
    fn body_changed(&self, field: &Field) -> ResolvedField {
        let Some(submitted) = self.body_value(&field.name) else {
            return ResolvedField::literal("FALSE");
        };
        let submitted = field.cast_request_value(submitted);
        let changed = match &self.context.original {
            Some(original) => {
                let stored = original
                    .get(&field.name)
                    .map(|v| field.cast_request_value(v))
                    .unwrap_or(Value::Null);
                stored != submitted
            }
            None => true,
        };
        ResolvedField::literal(if changed { "TRUE" } else { "FALSE" })
    }

    fn body_value(&self, key: &str) -> Option<&Value> {
        self.context
            .request_info
            .as_ref()
            .and_then(|info| info.body.get(key))
    }
}

/// Result for a request path without a value.
fn absent(modifier: Option<Modifier>) -> ResolveResult<ResolvedField> {
    match modifier {
        Some(Modifier::Isset) | Some(Modifier::Changed) => Ok(ResolvedField::literal("FALSE")),
        _ => Ok(ResolvedField::literal("NULL")),
    }
}

fn require_multiple(path: &FieldPath, field: &Field) -> ResolveResult<()> {
    if field.is_multiple() {
        Ok(())
    } else {
        Err(ResolveError::invalid_format(
            &path.raw,
            format!("{:?} is single-valued", field.name),
        ))
    }
}

/// Walk a JSON document by path segments; numeric segments index arrays.
fn lookup<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Distinct non-empty strings of a submitted scalar or array value.
fn string_list(value: Option<&Value>) -> Vec<String> {
    let items: Vec<&Value> = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    };
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let s = match item {
            Value::String(s) => s.clone(),
            Value::Null => continue,
            other => other.to_string(),
        };
        if !s.is_empty() && !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup() {
        let doc = json!({"a": {"b": [10, {"c": "x"}]}});
        let path = |p: &str| p.split('.').map(str::to_string).collect::<Vec<_>>();
        assert_eq!(lookup(&doc, &path("a.b.0")), Some(&json!(10)));
        assert_eq!(lookup(&doc, &path("a.b.1.c")), Some(&json!("x")));
        assert_eq!(lookup(&doc, &path("a.x")), None);
        assert_eq!(lookup(&doc, &path("a.b.c")), None);
    }

    #[test]
    fn test_string_list() {
        assert_eq!(string_list(None), Vec::<String>::new());
        assert_eq!(string_list(Some(&json!("a"))), vec!["a"]);
        assert_eq!(string_list(Some(&json!(["a", "", "b", "a", 3]))), vec!["a", "b", "3"]);
    }

    #[test]
    fn test_static_request_info() {
        let info = RequestInfo::new("POST")
            .with_query("q", "")
            .with_body("title", "t");
        let doc = static_request_info(Some(&info));
        assert_eq!(doc["method"], json!("POST"));
        assert_eq!(doc["query"]["q"], json!(""));
        assert_eq!(doc["auth"], Value::Null);
        assert_eq!(static_request_info(None), Value::Null);
    }
}
