//! Collection access rules.

use serde::{Deserialize, Serialize};

/// An access rule attached to a collection.
///
/// In schema documents a rule is `null` (superuser only), `""` (public) or a
/// filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Rule {
    /// Only privileged callers may access records.
    #[default]
    SuperuserOnly,
    /// Everyone may access records.
    Public,
    /// Records are accessible when the filter expression matches.
    Filter(String),
}

impl Rule {
    /// Create a filter rule. Blank expressions become [`Rule::Public`].
    pub fn filter(expression: impl Into<String>) -> Self {
        Rule::from(Some(expression.into()))
    }

    /// Check if this is the superuser-only sentinel.
    pub fn is_superuser_only(&self) -> bool {
        matches!(self, Rule::SuperuserOnly)
    }
}

impl From<Option<String>> for Rule {
    fn from(value: Option<String>) -> Self {
        match value {
            None => Rule::SuperuserOnly,
            Some(expr) if expr.trim().is_empty() => Rule::Public,
            Some(expr) => Rule::Filter(expr),
        }
    }
}

impl From<Rule> for Option<String> {
    fn from(rule: Rule) -> Self {
        match rule {
            Rule::SuperuserOnly => None,
            Rule::Public => Some(String::new()),
            Rule::Filter(expr) => Some(expr),
        }
    }
}

/// Which of a collection's rules applies to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Listing/searching records.
    #[default]
    List,
    /// Viewing a single record.
    View,
    /// Creating records.
    Create,
    /// Updating records.
    Update,
    /// Deleting records.
    Delete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_from_option() {
        assert_eq!(Rule::from(None), Rule::SuperuserOnly);
        assert_eq!(Rule::from(Some("  ".to_string())), Rule::Public);
        assert_eq!(
            Rule::filter("owner = @request.auth.id"),
            Rule::Filter("owner = @request.auth.id".to_string())
        );
    }

    #[test]
    fn test_rule_json_round_trip() {
        let rules: Vec<Rule> = serde_json::from_str(r#"[null, "", "a = 1"]"#).unwrap();
        assert_eq!(
            rules,
            vec![Rule::SuperuserOnly, Rule::Public, Rule::filter("a = 1")]
        );
        assert_eq!(
            serde_json::to_string(&rules).unwrap(),
            r#"[null,"","a = 1"]"#
        );
    }
}
