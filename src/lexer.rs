use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::source::Span;

/// Token set for the surface syntax: parentheses delimit lists, and any other
/// run of printable, non-space, non-paren characters is one opaque symbol.
/// There is no escaping, no string/number literal syntax and no comments;
/// whether a symbol is a number is decided at evaluation time, not here.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[\x00-\x20\x7f]+")] // Skip whitespace and other non-printables
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[regex(r"[^\x00-\x20\x7f()]+", |lex| lex.slice().to_string())]
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Symbol(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Error)]
pub enum LexerErrorKind {
    #[default]
    #[error("Invalid token")]
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct LexerError {
    pub kind: LexerErrorKind,
    pub span: Span,
}

// Result type alias for convenience
type LexerResult<T> = Result<T, LexerError>;

// Helper function to tokenize a string directly (useful for tests and parser)
pub fn tokenize(input: &str) -> LexerResult<Vec<Token>> {
    TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| match result {
            Ok(kind) => Ok(Token {
                kind,
                span: Span::new(range.start, range.end),
            }),
            Err(kind) => Err(LexerError {
                kind,
                span: Span::new(range.start, range.end),
            }),
        })
        .collect()
}
