use cellisp::{Dialect, Environment, Interpreter, parse_str, pretty_print};
use std::io::{self, BufRead, Write};

/// Line-at-a-time driver: reads one expression per line from stdin, prints
/// the result to stdout, and reports recoverable errors to stderr while
/// answering `()`. Pass `--integer` for truncating integer arithmetic.
fn main() -> io::Result<()> {
    let dialect = if std::env::args().any(|arg| arg == "--integer") {
        Dialect::Integer
    } else {
        Dialect::Decimal
    };
    let interp = Interpreter::with_dialect(dialect);
    let mut env = Environment::global();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut count = 0usize;

    loop {
        write!(stdout, "[{}]< ", count)?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim_end();

        match parse_str(input) {
            Ok(expr) => match interp.eval(expr, &mut env) {
                Ok(value) => writeln!(stdout, "[{}]> {}", count, value)?,
                Err(error) => {
                    pretty_print::print_eval_error(input, &error);
                    writeln!(stdout, "[{}]> ()", count)?;
                }
            },
            Err(error) => {
                pretty_print::print_parse_error(input, &error);
                writeln!(stdout, "[{}]> ()", count)?;
            }
        }
        count += 1;
    }

    Ok(())
}
