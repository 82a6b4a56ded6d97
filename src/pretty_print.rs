use crate::evaluator::EvalError;
use crate::parser::ParseError;
use crate::source::Span;
use ariadne::{Label, Report, ReportKind, Source};

const SOURCE_ID: &str = "REPL";

/// Renders an evaluation error as an annotated report against the input line,
/// written to stderr.
pub fn print_eval_error(input: &str, error: &EvalError) {
    report(input, error.span(), &error.to_string());
}

/// Renders a parse (or lexer) error the same way. End-of-input errors point
/// at the position just past the last character.
pub fn print_parse_error(input: &str, error: &ParseError) {
    let span = match error {
        ParseError::UnexpectedToken { found, .. } => found.span,
        ParseError::UnexpectedEof(_) => Span::new(input.len(), input.len()),
        ParseError::Lexer(e) => e.span,
    };
    report(input, span, &error.to_string());
}

fn report(input: &str, span: Span, message: &str) {
    Report::build(ReportKind::Error, (SOURCE_ID, span.to_range()))
        .with_message(message)
        .with_label(Label::new((SOURCE_ID, span.to_range())).with_message(message))
        .finish()
        .eprint((SOURCE_ID, Source::from(input)))
        .unwrap();
}
