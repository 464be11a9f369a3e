//! Lexer for filter expressions using logos.

use crate::error::ParseError;
use crate::span::Span;
use logos::Logos;

/// Token types for the filter language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    // "All must match" comparison operators
    #[token("=")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("~")]
    Like,
    #[token("!~")]
    NotLike,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,

    // "Any must match" comparison operators
    #[token("?=")]
    AnyEq,
    #[token("?!=")]
    AnyNe,
    #[token("?~")]
    AnyLike,
    #[token("?!~")]
    AnyNotLike,
    #[token("?<")]
    AnyLt,
    #[token("?<=")]
    AnyLe,
    #[token("?>")]
    AnyGt,
    #[token("?>=")]
    AnyGe,

    // Logical operators
    #[token("&&")]
    And,
    #[token("||")]
    Or,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    // Literals
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // Field path, validated later by the resolver
    #[regex(r"[@a-zA-Z_][a-zA-Z0-9_.:@]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1])
    })]
    String(String),

    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1])
    })]
    StringSingle(String),

    #[regex(r"-?[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),
}

impl Token {
    /// Check whether the token is a comparison operator.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Token::Eq
                | Token::Ne
                | Token::Like
                | Token::NotLike
                | Token::Lt
                | Token::Le
                | Token::Gt
                | Token::Ge
                | Token::AnyEq
                | Token::AnyNe
                | Token::AnyLike
                | Token::AnyNotLike
                | Token::AnyLt
                | Token::AnyLe
                | Token::AnyGt
                | Token::AnyGe
        )
    }
}

/// Unescape a quoted string body.
///
/// Only the quote characters and the backslash itself are escapable; any other
/// escape sequence is kept verbatim so LIKE patterns such as `\%` survive.
fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some('"') | Some('\'') => {
                if let Some(quote) = chars.next() {
                    result.push(quote);
                }
            }
            _ => result.push('\\'),
        }
    }

    result
}

/// A token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Lexer that produces spanned tokens with one token of lookahead.
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    peeked: Option<Result<Option<SpannedToken>, ParseError>>,
}

impl<'source> Lexer<'source> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
            peeked: None,
        }
    }

    /// Peek at the next token without consuming it.
    pub fn peek(&mut self) -> Result<Option<&SpannedToken>, ParseError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.next_inner());
        }
        match self.peeked.as_ref() {
            Some(Ok(tok)) => Ok(tok.as_ref()),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(None),
        }
    }

    /// Consume the next token.
    pub fn next_token(&mut self) -> Result<Option<SpannedToken>, ParseError> {
        match self.peeked.take() {
            Some(peeked) => peeked,
            None => self.next_inner(),
        }
    }

    fn next_inner(&mut self) -> Result<Option<SpannedToken>, ParseError> {
        match self.inner.next() {
            Some(Ok(token)) => Ok(Some(SpannedToken {
                token,
                span: self.inner.span().into(),
            })),
            Some(Err(())) => {
                let span: Span = self.inner.span().into();
                Err(ParseError::new(
                    format!("unexpected character sequence {:?}", self.inner.slice()),
                    span,
                ))
            }
            None => Ok(None),
        }
    }

    /// Get the source string.
    pub fn source(&self) -> &'source str {
        self.inner.source()
    }
}

/// Tokenize a source string into a vector of spanned tokens.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token()? {
        tokens.push(tok);
    }
    Ok(tokens)
}
