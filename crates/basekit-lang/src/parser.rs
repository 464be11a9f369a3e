//! Recursive descent parser for filter expressions.
//!
//! Grammar (`&&` binds tighter than `||`):
//!
//! ```text
//! filter     := or_expr EOF
//! or_expr    := and_expr ("||" and_expr)*
//! and_expr   := primary ("&&" primary)*
//! primary    := "(" or_expr ")" | operand sign operand
//! operand    := identifier | string | number | true | false | null
//! ```

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Lexer, SpannedToken, Token};
use crate::span::{Span, Spanned};

/// Parser for the filter language.
pub struct Parser<'source> {
    lexer: Lexer<'source>,
    source: &'source str,
}

impl<'source> Parser<'source> {
    /// Create a new parser for the given source.
    pub fn new(source: &'source str) -> Self {
        Self {
            lexer: Lexer::new(source),
            source,
        }
    }

    /// Parse a complete filter expression.
    pub fn parse_filter(&mut self) -> Result<FilterExpr, ParseError> {
        if self.lexer.peek()?.is_none() {
            return Err(ParseError::new(
                "empty filter expression",
                Span::new(0, self.source.len()),
            ));
        }

        let expr = self.parse_or()?;

        if let Some(tok) = self.lexer.next_token()? {
            return Err(ParseError::new(
                format!("unexpected {:?} after complete expression", tok.token),
                tok.span,
            )
            .with_hint("join conditions with '&&' or '||'"));
        }

        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<FilterExpr, ParseError> {
        let mut left = self.parse_and()?;

        while self.peek_is(&Token::Or)? {
            self.next_token()?; // consume ||

            let right = self.parse_and()?;
            left = match left {
                FilterExpr::Or(mut conditions) => {
                    conditions.push(right);
                    FilterExpr::Or(conditions)
                }
                _ => FilterExpr::Or(vec![left, right]),
            };
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<FilterExpr, ParseError> {
        let mut left = self.parse_primary()?;

        while self.peek_is(&Token::And)? {
            self.next_token()?; // consume &&

            let right = self.parse_primary()?;
            left = match left {
                FilterExpr::And(mut conditions) => {
                    conditions.push(right);
                    FilterExpr::And(conditions)
                }
                _ => FilterExpr::And(vec![left, right]),
            };
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<FilterExpr, ParseError> {
        if self.peek_is(&Token::LParen)? {
            let open = self.next_token()?;
            if self.peek_is(&Token::RParen)? {
                return Err(ParseError::new("empty group", open.span));
            }
            let inner = self.parse_or()?;
            self.expect_token(Token::RParen)
                .map_err(|e| e.with_hint("unbalanced parentheses"))?;
            return Ok(inner);
        }

        let left = self.parse_operand()?;
        let op_tok = self.next_token()?;
        let op = sign_op(&op_tok).ok_or_else(|| {
            ParseError::new(
                format!("expected comparison operator, found {:?}", op_tok.token),
                op_tok.span,
            )
        })?;
        let right = self.parse_operand()?;

        Ok(FilterExpr::Comparison(Comparison { left, op, right }))
    }

    fn parse_operand(&mut self) -> Result<Spanned<Operand>, ParseError> {
        let tok = self.next_token()?;
        let operand = match tok.token {
            Token::Ident(name) => Operand::Identifier(name),
            Token::String(s) | Token::StringSingle(s) => Operand::Text(s),
            Token::Number(n) => Operand::Number(n),
            Token::True => Operand::Bool(true),
            Token::False => Operand::Bool(false),
            Token::Null => Operand::Null,
            other => {
                return Err(ParseError::new(
                    format!("expected identifier or literal, found {:?}", other),
                    tok.span,
                ))
            }
        };

        Ok(Spanned::new(operand, tok.span))
    }

    fn peek_is(&mut self, expected: &Token) -> Result<bool, ParseError> {
        Ok(matches!(self.lexer.peek()?, Some(tok) if &tok.token == expected))
    }

    fn expect_token(&mut self, expected: Token) -> Result<SpannedToken, ParseError> {
        let tok = self.next_token()?;
        if std::mem::discriminant(&tok.token) == std::mem::discriminant(&expected) {
            Ok(tok)
        } else {
            Err(ParseError::new(
                format!("expected {:?}, found {:?}", expected, tok.token),
                tok.span,
            ))
        }
    }

    /// Get the next token or error on end of input.
    fn next_token(&mut self) -> Result<SpannedToken, ParseError> {
        self.lexer.next_token()?.ok_or_else(|| {
            ParseError::new(
                "unexpected end of input",
                Span::new(self.source.len(), self.source.len()),
            )
        })
    }
}

fn sign_op(tok: &SpannedToken) -> Option<SignOp> {
    let op = match tok.token {
        Token::Eq => SignOp::Eq,
        Token::Ne => SignOp::Ne,
        Token::Like => SignOp::Like,
        Token::NotLike => SignOp::NotLike,
        Token::Lt => SignOp::Lt,
        Token::Le => SignOp::Le,
        Token::Gt => SignOp::Gt,
        Token::Ge => SignOp::Ge,
        Token::AnyEq => SignOp::AnyEq,
        Token::AnyNe => SignOp::AnyNe,
        Token::AnyLike => SignOp::AnyLike,
        Token::AnyNotLike => SignOp::AnyNotLike,
        Token::AnyLt => SignOp::AnyLt,
        Token::AnyLe => SignOp::AnyLe,
        Token::AnyGt => SignOp::AnyGt,
        Token::AnyGe => SignOp::AnyGe,
        _ => return None,
    };
    Some(op)
}

/// Parse a source string into a filter expression.
pub fn parse_filter(source: &str) -> Result<FilterExpr, ParseError> {
    Parser::new(source).parse_filter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> Operand {
        Operand::Identifier(name.to_string())
    }

    #[test]
    fn test_parse_comparison() {
        let expr = parse_filter("self_rel_one.title > true").unwrap();
        let FilterExpr::Comparison(c) = expr else {
            panic!("expected Comparison");
        };
        assert_eq!(c.left.value, ident("self_rel_one.title"));
        assert_eq!(c.op, SignOp::Gt);
        assert_eq!(c.right.value, Operand::Bool(true));
        assert_eq!(c.left.span, Span::new(0, 18));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse_filter("a = 1 || b = 2 && c = 3").unwrap();
        let FilterExpr::Or(items) = expr else {
            panic!("expected Or");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1], FilterExpr::And(inner) if inner.len() == 2));
    }

    #[test]
    fn test_groups() {
        let expr = parse_filter("(a = 1 || b = 2) && c ?~ 'x'").unwrap();
        let FilterExpr::And(items) = expr else {
            panic!("expected And");
        };
        assert!(matches!(&items[0], FilterExpr::Or(_)));
        let FilterExpr::Comparison(c) = &items[1] else {
            panic!("expected Comparison");
        };
        assert_eq!(c.op, SignOp::AnyLike);
        assert_eq!(c.right.value, Operand::Text("x".to_string()));
    }

    #[test]
    fn test_chained_and_is_flat() {
        let expr = parse_filter("a = 1 && b = 2 && c = null").unwrap();
        assert!(matches!(&expr, FilterExpr::And(items) if items.len() == 3));
        assert_eq!(expr.comparisons()[2].right.value, Operand::Null);
    }

    #[test]
    fn test_literal_on_left() {
        let expr = parse_filter("'x' = @request.query.q").unwrap();
        let c = expr.comparisons()[0].clone();
        assert_eq!(c.left.value, Operand::Text("x".to_string()));
        assert_eq!(c.right.value, ident("@request.query.q"));
    }

    #[test]
    fn test_empty_filter() {
        let err = parse_filter("   ").unwrap_err();
        assert_eq!(err.message, "empty filter expression");
    }

    #[test]
    fn test_missing_operator() {
        let err = parse_filter("title 'x'").unwrap_err();
        assert!(err.message.contains("expected comparison operator"));
        assert_eq!(err.span, Span::new(6, 9));
    }

    #[test]
    fn test_dangling_join() {
        let err = parse_filter("a = 1 &&").unwrap_err();
        assert_eq!(err.message, "unexpected end of input");
    }

    #[test]
    fn test_unbalanced_parens() {
        let err = parse_filter("(a = 1").unwrap_err();
        assert_eq!(err.hint.as_deref(), Some("unbalanced parentheses"));
        assert!(parse_filter("a = 1)").is_err());
        assert!(parse_filter("()").is_err());
    }

    #[test]
    fn test_error_formatting() {
        let source = "title = 'a' title = 'b'";
        let err = parse_filter(source).unwrap_err();
        let formatted = err.format_with_source(source);
        assert!(formatted.contains("line 1:13"));
        assert!(formatted.contains("hint: join conditions"));
    }
}
