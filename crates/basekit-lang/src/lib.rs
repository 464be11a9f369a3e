//! basekit filter language
//!
//! This crate tokenizes and parses the filter expressions used by collection
//! access rules and record search. It only produces syntax; resolving field
//! paths into SQL is done by `basekit-core`.
//!
//! # Syntax
//!
//! ```text
//! title = 'hello' && views > 10
//! author.name ~ 'doe' || @request.auth.id = author
//! tags:each ?= 'news'
//! (status = 'draft' || status = 'review') && @request.auth.verified = true
//! ```
//!
//! Operators: `=`, `!=`, `~` (contains), `!~`, `<`, `<=`, `>`, `>=` and the
//! `?`-prefixed "any element" variants of each. Conditions are joined with
//! `&&` and `||` (`&&` binds tighter) and may be grouped with parentheses.
//! `//` starts a line comment.
//!
//! # Usage
//!
//! ```rust
//! use basekit_lang::{parse_filter, FilterExpr, SignOp};
//!
//! let expr = parse_filter("author.name ?~ 'doe'").unwrap();
//! if let FilterExpr::Comparison(c) = expr {
//!     assert_eq!(c.op, SignOp::AnyLike);
//! }
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

pub use ast::{Comparison, FilterExpr, Operand, SignOp};
pub use error::ParseError;
pub use span::{Span, Spanned};

/// Parse a filter expression into an AST.
///
/// # Example
///
/// ```rust
/// use basekit_lang::parse_filter;
///
/// let expr = parse_filter("title = 'x' && views > 1").unwrap();
/// assert_eq!(expr.comparisons().len(), 2);
/// ```
pub fn parse_filter(source: &str) -> Result<FilterExpr, ParseError> {
    parser::parse_filter(source)
}

/// Tokenize a source string (for debugging/testing).
pub fn tokenize(source: &str) -> Result<Vec<lexer::SpannedToken>, ParseError> {
    lexer::tokenize(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_expression() {
        let expr =
            parse_filter("@request.auth.id != '' && (owner = @request.auth.id || public = true)")
                .unwrap();
        let comparisons = expr.comparisons();
        assert_eq!(comparisons.len(), 3);
        assert_eq!(
            comparisons[0].left.value,
            Operand::Identifier("@request.auth.id".to_string())
        );
        assert_eq!(comparisons[2].right.value, Operand::Bool(true));
    }

    #[test]
    fn test_error_with_source_context() {
        let source = "title == 'x'";
        let err = parse_filter(source).unwrap_err();
        let formatted = err.format_with_source(source);
        assert!(formatted.contains("line 1"));
        assert!(formatted.contains("error"));
    }
}
