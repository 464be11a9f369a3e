//! Abstract Syntax Tree types for filter expressions.

use crate::span::{Span, Spanned};
use std::fmt;

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// A single `left op right` comparison.
    Comparison(Comparison),
    /// All conditions must hold.
    And(Vec<FilterExpr>),
    /// At least one condition must hold.
    Or(Vec<FilterExpr>),
}

impl FilterExpr {
    /// Combine conditions with AND, flattening a single element.
    pub fn and(mut conditions: Vec<FilterExpr>) -> Self {
        if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            FilterExpr::And(conditions)
        }
    }

    /// Iterate over every comparison in the tree, depth first.
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        self.collect_comparisons(&mut out);
        out
    }

    fn collect_comparisons<'a>(&'a self, out: &mut Vec<&'a Comparison>) {
        match self {
            FilterExpr::Comparison(c) => out.push(c),
            FilterExpr::And(items) | FilterExpr::Or(items) => {
                for item in items {
                    item.collect_comparisons(out);
                }
            }
        }
    }
}

/// A comparison between two operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub left: Spanned<Operand>,
    pub op: SignOp,
    pub right: Spanned<Operand>,
}

impl Comparison {
    /// Span covering both operands.
    pub fn span(&self) -> Span {
        self.left.span.cover(self.right.span)
    }
}

/// A comparison operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A field path such as `author.name` or `@request.auth.id`.
    Identifier(String),
    /// A quoted string literal.
    Text(String),
    /// A numeric literal.
    Number(f64),
    /// `true` / `false`.
    Bool(bool),
    /// `null`.
    Null,
}

/// Comparison operators.
///
/// The `Any*` variants are the `?`-prefixed forms: over a multi-valued operand
/// they require at least one element to match instead of all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignOp {
    Eq,
    Ne,
    Like,
    NotLike,
    Lt,
    Le,
    Gt,
    Ge,
    AnyEq,
    AnyNe,
    AnyLike,
    AnyNotLike,
    AnyLt,
    AnyLe,
    AnyGt,
    AnyGe,
}

impl SignOp {
    /// Check if this is a `?`-prefixed "any element" operator.
    pub fn is_any(self) -> bool {
        matches!(
            self,
            SignOp::AnyEq
                | SignOp::AnyNe
                | SignOp::AnyLike
                | SignOp::AnyNotLike
                | SignOp::AnyLt
                | SignOp::AnyLe
                | SignOp::AnyGt
                | SignOp::AnyGe
        )
    }

    /// The operator with the `?` prefix stripped.
    pub fn base(self) -> SignOp {
        match self {
            SignOp::AnyEq => SignOp::Eq,
            SignOp::AnyNe => SignOp::Ne,
            SignOp::AnyLike => SignOp::Like,
            SignOp::AnyNotLike => SignOp::NotLike,
            SignOp::AnyLt => SignOp::Lt,
            SignOp::AnyLe => SignOp::Le,
            SignOp::AnyGt => SignOp::Gt,
            SignOp::AnyGe => SignOp::Ge,
            other => other,
        }
    }

    /// Source spelling of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            SignOp::Eq => "=",
            SignOp::Ne => "!=",
            SignOp::Like => "~",
            SignOp::NotLike => "!~",
            SignOp::Lt => "<",
            SignOp::Le => "<=",
            SignOp::Gt => ">",
            SignOp::Ge => ">=",
            SignOp::AnyEq => "?=",
            SignOp::AnyNe => "?!=",
            SignOp::AnyLike => "?~",
            SignOp::AnyNotLike => "?!~",
            SignOp::AnyLt => "?<",
            SignOp::AnyLe => "?<=",
            SignOp::AnyGt => "?>",
            SignOp::AnyGe => "?>=",
        }
    }
}

impl fmt::Display for SignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_op_base() {
        assert!(SignOp::AnyGe.is_any());
        assert!(!SignOp::Ge.is_any());
        assert_eq!(SignOp::AnyNotLike.base(), SignOp::NotLike);
        assert_eq!(SignOp::Lt.base(), SignOp::Lt);
        assert_eq!(SignOp::AnyNe.to_string(), "?!=");
    }

    #[test]
    fn test_and_flattens_single() {
        let cmp = FilterExpr::Comparison(Comparison {
            left: Spanned::new(Operand::Identifier("a".into()), Span::new(0, 1)),
            op: SignOp::Eq,
            right: Spanned::new(Operand::Number(1.0), Span::new(4, 5)),
        });
        assert_eq!(FilterExpr::and(vec![cmp.clone()]), cmp);
        assert_eq!(FilterExpr::and(vec![cmp.clone(), cmp.clone()]).comparisons().len(), 2);
    }
}
