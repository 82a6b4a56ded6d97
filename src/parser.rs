use crate::lexer::{LexerError, Token, TokenKind};
use crate::source::Span;
use crate::types::Expr;
use std::iter::Peekable;
use std::vec::IntoIter;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Unexpected token '{}' at {}..{}, expected {expected}", found.kind, found.span.start, found.span.end)]
    UnexpectedToken { found: Token, expected: String },
    // A list missing its closing token is a hard parse error; nothing is
    // silently synthesized to close it.
    #[error("Unexpected end of input, expected {0}")]
    UnexpectedEof(String),
    #[error("Lexer error during parse: {0}")]
    Lexer(#[from] LexerError),
}

// Result type alias for convenience
type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    // We iterate over owned Tokens, consuming them.
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    /// Reads a single expression from the token stream. Any token other than
    /// `(` becomes an atom holding the token text verbatim.
    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        match self.next_token() {
            Some(Token {
                kind: TokenKind::LParen,
                span,
            }) => self.parse_list(span),
            Some(Token { kind, span }) => Ok(Expr::atom(kind.to_string(), span)),
            None => Err(ParseError::UnexpectedEof("an expression".to_string())),
        }
    }

    /// Reads child expressions until the `)` matching an already-consumed `(`.
    fn parse_list(&mut self, lparen_span: Span) -> ParseResult<Expr> {
        let mut items = Vec::new();
        loop {
            match self.tokens.peek() {
                Some(Token {
                    kind: TokenKind::RParen,
                    span,
                }) => {
                    let span = lparen_span.merge(*span);
                    self.next_token();
                    return Ok(Expr::list(items, span));
                }
                Some(_) => items.push(self.parse_expr()?),
                None => return Err(ParseError::UnexpectedEof("')'".to_string())),
            }
        }
    }

    /// Parses exactly one top-level expression from the token stream. An
    /// empty stream yields the canonical empty-list value; trailing tokens
    /// after the expression are an error.
    pub fn parse(mut self) -> ParseResult<Expr> {
        if self.tokens.peek().is_none() {
            return Ok(Expr::falsity(Span::default()));
        }

        let expr = self.parse_expr()?;

        if let Some(found) = self.next_token() {
            Err(ParseError::UnexpectedToken {
                found,
                expected: "end of input".to_string(),
            })
        } else {
            Ok(expr)
        }
    }
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Expr> {
    let tokens = crate::lexer::tokenize(input)?;
    Parser::new(tokens).parse()
}
