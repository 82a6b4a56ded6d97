use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use cellisp::evaluator::SpecialForm;
use cellisp::{
    Dialect, Environment, Interpreter, TokenKind, lexer::tokenize, parser::parse_str, pretty_print,
};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

const HISTORY_FILE: &str = "cellisp_history.txt";

struct CellispCompleter {
    env: Rc<RefCell<Environment>>,
    natives: Vec<String>,
}

impl CellispCompleter {
    fn new(env: Rc<RefCell<Environment>>, interp: &Interpreter) -> Self {
        CellispCompleter {
            env,
            natives: interp.native_identifiers().into_iter().collect(),
        }
    }
}

impl rustyline::completion::Completer for CellispCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        Ok((
            pos,
            match tokenize(&line[..pos]) {
                Ok(tokens) => {
                    if let Some(TokenKind::Symbol(prefix)) = tokens.last().map(|t| t.kind.clone()) {
                        self.env
                            .borrow()
                            .identifiers()
                            .iter()
                            .chain(self.natives.iter())
                            .map(String::as_str)
                            .chain(SpecialForm::identifiers())
                            .filter_map(|id| {
                                if id.starts_with(&prefix) {
                                    Some(id[prefix.len()..].to_string())
                                } else {
                                    None
                                }
                            })
                            .collect()
                    } else {
                        vec![]
                    }
                }
                Err(_) => vec![],
            },
        ))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputValidator {
    #[rustyline(Validator)]
    validator: CellispValidator,
    #[rustyline(Highlighter)]
    highlighter: CellispHighlighter,
    #[rustyline(Completer)]
    completer: CellispCompleter,
}

struct CellispValidator;

impl Validator for CellispValidator {
    // Only parentheses matter here: there are no string literals, and square
    // or curly brackets are ordinary symbol characters. A stray ')' is left
    // for the parser to judge (a lone ')' is a valid atom).
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut depth: i32 = 0;
        for c in ctx.input().chars() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
        }
        if depth > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct CellispHighlighter;

impl Highlighter for CellispHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> std::borrow::Cow<'l, str> {
        let mut stack: Vec<usize> = Vec::new();
        let mut highlighted = String::new();
        // The cursor sits just past the character of interest; at position 0
        // there is none.
        let cursor = pos.checked_sub(1);

        for (i, c) in line.chars().enumerate() {
            match c {
                '(' => {
                    stack.push(highlighted.len());
                    highlighted.push(c);
                }
                ')' => {
                    if let Some(matching_pos) = stack.pop() {
                        if cursor == Some(matching_pos) || cursor == Some(i) {
                            highlighted.push_str("\x1b[34m)\x1b[0m"); // Blue for matching parens
                            highlighted
                                .replace_range(matching_pos..=matching_pos, "\x1b[1;34m(\x1b[0m");
                        } else {
                            highlighted.push(c);
                        }
                    } else {
                        highlighted.push_str("\x1b[31m)\x1b[0m"); // Red for unmatched closers
                    }
                }
                _ => {
                    highlighted.push(c);
                }
            }
        }

        std::borrow::Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}


fn main() -> rustyline::Result<()> {
    println!("Cellisp REPL v0.1.0");
    println!("Type 'exit' or press Ctrl-D to quit.");

    let dialect = if std::env::args().any(|arg| arg == "--integer") {
        Dialect::Integer
    } else {
        Dialect::Decimal
    };
    let interp = Interpreter::with_dialect(dialect);
    let env = Rc::new(RefCell::new(Environment::global()));

    let h = InputValidator {
        highlighter: CellispHighlighter,
        validator: CellispValidator,
        completer: CellispCompleter::new(Rc::clone(&env), &interp),
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(rustyline::EditMode::Vi)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(HISTORY_FILE).is_err() {
        println!("No previous history.");
    }

    let mut count = 0usize;
    loop {
        let readline = rl.readline(&format!("[{}]< ", count));
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if trimmed_input.eq_ignore_ascii_case("exit") {
                    break;
                }

                let started = Instant::now();
                match parse_str(trimmed_input) {
                    Ok(expr) => match interp.eval(expr, &mut env.borrow_mut()) {
                        Ok(value) => println!("[{}]> {}", count, value),
                        Err(e) => {
                            pretty_print::print_eval_error(trimmed_input, &e);
                            println!("[{}]> ()", count);
                        }
                    },
                    Err(parse_err) => {
                        pretty_print::print_parse_error(trimmed_input, &parse_err);
                        println!("[{}]> ()", count);
                    }
                }
                eprintln!("({} msec)", started.elapsed().as_millis());
                count += 1;
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}
