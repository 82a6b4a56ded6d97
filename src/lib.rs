// Declare modules publicly so they are part of the library interface
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod numeric;
pub mod parser;
pub mod pretty_print;
pub mod source;
pub mod types;

pub use environment::Environment;
pub use evaluator::{EvalError, EvalResult, Interpreter, NativeProcedure, SpecialForm};
pub use lexer::{LexerError, Token, TokenKind, tokenize};
pub use numeric::{Dialect, NumericProcedure, NumericValue};
pub use parser::{ParseError, Parser, parse_str};
pub use source::Span;
pub use types::{Expr, ExprKind};
