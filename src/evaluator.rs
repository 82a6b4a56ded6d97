use crate::environment::Environment;
use crate::numeric::{self, Dialect};
use crate::source::Span;
use crate::types::{Expr, ExprKind};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

/// Errors raised while evaluating an expression. All of them are recoverable:
/// the driving loop reports the error and carries on with the next input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Procedure '{name}' expected {expected} argument(s), got {actual}")]
    ArityMismatch {
        name: String,
        expected: String,
        actual: usize,
        span: Span,
    },
    #[error("Procedure '{name}' cannot interpret '{found}' as a number")]
    NumericConversion {
        name: String,
        found: String,
        span: Span,
    },
    #[error("Cannot apply '{head}' as a procedure")]
    UnknownProcedure { head: String, span: Span },
    #[error("Cannot define '{found}': not a symbol")]
    NotASymbol { found: String, span: Span },
    #[error("Malformed lambda: {detail}")]
    MalformedLambda { detail: String, span: Span },
    #[error("Division by zero in '{name}'")]
    DivisionByZero { name: String, span: Span },
}

impl EvalError {
    /// The source span the error should be reported against.
    pub fn span(&self) -> Span {
        match self {
            EvalError::ArityMismatch { span, .. }
            | EvalError::NumericConversion { span, .. }
            | EvalError::UnknownProcedure { span, .. }
            | EvalError::NotASymbol { span, .. }
            | EvalError::MalformedLambda { span, .. }
            | EvalError::DivisionByZero { span, .. } => *span,
        }
    }
}

pub type EvalResult = Result<Expr, EvalError>;

/// The closed set of operators the evaluator recognizes by name before it
/// considers native procedures or lambda application. These receive their
/// operands unevaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    Quote,
    Lambda,
    Define,
    If,
    Cond,
    Atom,
    Eq,
    Cons,
    Car,
    Cdr,
}

impl SpecialForm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "quote" => Some(SpecialForm::Quote),
            "lambda" => Some(SpecialForm::Lambda),
            "define" => Some(SpecialForm::Define),
            "if" => Some(SpecialForm::If),
            "cond" => Some(SpecialForm::Cond),
            "atom" => Some(SpecialForm::Atom),
            "eq" => Some(SpecialForm::Eq),
            "cons" => Some(SpecialForm::Cons),
            "car" => Some(SpecialForm::Car),
            "cdr" => Some(SpecialForm::Cdr),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::Quote => "quote",
            SpecialForm::Lambda => "lambda",
            SpecialForm::Define => "define",
            SpecialForm::If => "if",
            SpecialForm::Cond => "cond",
            SpecialForm::Atom => "atom",
            SpecialForm::Eq => "eq",
            SpecialForm::Cons => "cons",
            SpecialForm::Car => "car",
            SpecialForm::Cdr => "cdr",
        }
    }

    /// Every special form name (used for REPL completion).
    pub fn identifiers() -> [&'static str; 10] {
        [
            "quote", "lambda", "define", "if", "cond", "atom", "eq", "cons", "car", "cdr",
        ]
    }
}

/// A procedure implemented in Rust rather than as a lambda. Operands arrive
/// unevaluated so the procedure decides how (and whether) to evaluate them.
pub trait NativeProcedure {
    fn call(
        &self,
        interp: &Interpreter,
        operands: &[Expr],
        span: Span,
        env: &mut Environment,
    ) -> EvalResult;
}

fn check_arity(name: &str, expected: usize, operands: &[Expr], span: Span) -> Result<(), EvalError> {
    if operands.len() == expected {
        Ok(())
    } else {
        Err(EvalError::ArityMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: operands.len(),
            span,
        })
    }
}

/// The evaluator. It owns the native procedure table; the mutable global
/// environment lives with the caller so that `define` can thread through
/// `eval` without aliasing the interpreter itself.
pub struct Interpreter {
    natives: HashMap<String, Rc<dyn NativeProcedure>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    /// An interpreter with the numeric table over the default (decimal)
    /// dialect.
    pub fn new() -> Self {
        Interpreter::with_dialect(Dialect::default())
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        let mut interp = Interpreter {
            natives: HashMap::new(),
        };
        numeric::install_dialect(&mut interp, dialect);
        interp
    }

    pub fn register_native(
        &mut self,
        name: impl Into<String>,
        native: impl NativeProcedure + 'static,
    ) {
        self.natives.insert(name.into(), Rc::new(native));
    }

    /// Gets the set of registered native procedure names (used for REPL
    /// completion).
    pub fn native_identifiers(&self) -> HashSet<String> {
        self.natives.keys().cloned().collect()
    }

    /// Evaluates one expression.
    ///
    /// * An atom resolves through the environment; an unbound atom evaluates
    ///   to itself.
    /// * The empty list is its own (false) value.
    /// * A non-empty list dispatches on its head: special form, then native
    ///   procedure, then lambda application.
    pub fn eval(&self, expr: Expr, env: &mut Environment) -> EvalResult {
        match expr.kind {
            ExprKind::Atom(ref name) => {
                if let Some(value) = env.get(name) {
                    Ok(value.as_ref().clone())
                } else {
                    Ok(expr)
                }
            }
            ExprKind::List(ref items) => {
                if items.is_empty() {
                    return Ok(expr);
                }
                let span = expr.span;
                if let Some(head) = items[0].as_atom() {
                    if let Some(form) = SpecialForm::from_name(head) {
                        return self.eval_special(form, &items[1..], span, env);
                    }
                    if let Some(native) = self.natives.get(head) {
                        let native = Rc::clone(native);
                        return native.call(self, &items[1..], span, env);
                    }
                }
                self.apply(items, span, env)
            }
        }
    }

    /// Applies a list whose head is neither a special form nor a native
    /// procedure name. The head is evaluated: a lambda value is applied, and
    /// an atom that resolved to a *different* atom is substituted back and
    /// retried (this is how `(define plus (quote +))` makes `plus` callable).
    /// Anything else cannot be applied.
    fn apply(&self, items: &[Expr], span: Span, env: &mut Environment) -> EvalResult {
        let resolved = self.eval(items[0].clone(), env)?;
        if resolved.lambda_parts().is_some() {
            return self.apply_lambda(&resolved, &items[1..], span, env);
        }
        match &resolved.kind {
            // The inequality check is the progress guard: an unbound atom
            // evaluates to itself, and retrying that would never terminate.
            ExprKind::Atom(_) if resolved != items[0] => {
                let mut substituted = vec![resolved];
                substituted.extend_from_slice(&items[1..]);
                self.eval(Expr::list(substituted, span), env)
            }
            _ => Err(EvalError::UnknownProcedure {
                head: resolved.to_string(),
                span: items[0].span,
            }),
        }
    }

    /// Applies a lambda value. The call frame starts from the closure
    /// snapshot (empty for a quoted lambda), the parameters are bound to the
    /// operands evaluated left to right in the caller's environment, and the
    /// caller's remaining bindings are merged in without overwriting. That
    /// merge is the dynamic half of the scoping model: names missing from the
    /// closure fall through to whatever is visible at the call site.
    fn apply_lambda(
        &self,
        lambda: &Expr,
        operands: &[Expr],
        span: Span,
        env: &mut Environment,
    ) -> EvalResult {
        let Some((params, body)) = lambda.lambda_parts() else {
            return Err(EvalError::UnknownProcedure {
                head: lambda.to_string(),
                span,
            });
        };
        let Some(params) = params.items() else {
            return Err(EvalError::MalformedLambda {
                detail: format!("parameter list '{}' is not a list", params),
                span: params.span,
            });
        };
        check_arity("lambda", params.len(), operands, span)?;

        let mut frame = lambda.closure.as_deref().cloned().unwrap_or_default();
        for (param, operand) in params.iter().zip(operands) {
            let name = param.as_atom().ok_or_else(|| EvalError::MalformedLambda {
                detail: format!("parameter '{}' is not a symbol", param),
                span: param.span,
            })?;
            let value = self.eval(operand.clone(), env)?;
            frame.define(name, value);
        }
        frame.merge_absent(env);

        self.eval(body.clone(), &mut frame)
    }

    fn eval_special(
        &self,
        form: SpecialForm,
        operands: &[Expr],
        span: Span,
        env: &mut Environment,
    ) -> EvalResult {
        match form {
            SpecialForm::Quote => {
                check_arity(form.name(), 1, operands, span)?;
                Ok(operands[0].clone())
            }
            SpecialForm::Lambda => {
                check_arity(form.name(), 2, operands, span)?;
                if operands[0].items().is_none() {
                    return Err(EvalError::MalformedLambda {
                        detail: format!("parameter list '{}' is not a list", operands[0]),
                        span: operands[0].span,
                    });
                }
                // The lambda evaluates to itself, plus a snapshot of the
                // current environment taken right now, at creation time.
                let mut value = Expr::list(
                    vec![
                        Expr::atom("lambda", span),
                        operands[0].clone(),
                        operands[1].clone(),
                    ],
                    span,
                );
                value.closure = Some(Box::new(env.clone()));
                Ok(value)
            }
            SpecialForm::Define => {
                check_arity(form.name(), 2, operands, span)?;
                let name = operands[0].as_atom().ok_or_else(|| EvalError::NotASymbol {
                    found: operands[0].to_string(),
                    span: operands[0].span,
                })?;
                let value = self.eval(operands[1].clone(), env)?;
                env.define(name, value.clone());
                Ok(value)
            }
            SpecialForm::If | SpecialForm::Cond => self.eval_conditional(form, operands, span, env),
            SpecialForm::Atom => {
                check_arity(form.name(), 1, operands, span)?;
                let value = self.eval(operands[0].clone(), env)?;
                Ok(Expr::from_test(value.is_leaf(), span))
            }
            SpecialForm::Eq => {
                check_arity(form.name(), 2, operands, span)?;
                let lhs = self.eval(operands[0].clone(), env)?;
                let rhs = self.eval(operands[1].clone(), env)?;
                Ok(Expr::from_test(lhs == rhs, span))
            }
            SpecialForm::Cons => {
                check_arity(form.name(), 2, operands, span)?;
                let head = self.eval(operands[0].clone(), env)?;
                let tail = self.eval(operands[1].clone(), env)?;
                let mut items = vec![head];
                // An atom in tail position contributes nothing; there are no
                // dotted pairs in this dialect.
                if let Some(rest) = tail.items() {
                    items.extend_from_slice(rest);
                }
                Ok(Expr::list(items, span))
            }
            SpecialForm::Car => {
                check_arity(form.name(), 1, operands, span)?;
                let value = self.eval(operands[0].clone(), env)?;
                Ok(match value.items().and_then(|items| items.first()) {
                    Some(first) => first.clone(),
                    None => Expr::falsity(span),
                })
            }
            SpecialForm::Cdr => {
                check_arity(form.name(), 1, operands, span)?;
                let value = self.eval(operands[0].clone(), env)?;
                Ok(match value.items() {
                    Some(items) if !items.is_empty() => Expr::list(items[1..].to_vec(), span),
                    _ => Expr::falsity(span),
                })
            }
        }
    }

    /// `if` and `cond` share one shape: a flat run of test/consequent pairs,
    /// walked left to right, with an optional single trailing expression as
    /// the else branch. Untaken branches are never evaluated, and a fully
    /// unmatched conditional is the canonical false value.
    fn eval_conditional(
        &self,
        form: SpecialForm,
        operands: &[Expr],
        span: Span,
        env: &mut Environment,
    ) -> EvalResult {
        if operands.len() < 2 {
            return Err(EvalError::ArityMismatch {
                name: form.name().to_string(),
                expected: "at least 2".to_string(),
                actual: operands.len(),
                span,
            });
        }
        let pairs = operands.chunks_exact(2);
        let fallback = pairs.remainder().first();
        for pair in pairs {
            let test = self.eval(pair[0].clone(), env)?;
            if !test.is_false() {
                return self.eval(pair[1].clone(), env);
            }
        }
        match fallback {
            Some(alternative) => self.eval(alternative.clone(), env),
            None => Ok(Expr::falsity(span)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    // Evaluates each input in order against one environment and returns the
    // last result.
    fn run_with(interp: &Interpreter, inputs: &[&str]) -> EvalResult {
        let mut env = Environment::global();
        let mut result = Expr::falsity(Span::default());
        for input in inputs {
            let expr = parse_str(input).expect("test input should parse");
            result = interp.eval(expr, &mut env)?;
        }
        Ok(result)
    }

    fn run(inputs: &[&str]) -> EvalResult {
        run_with(&Interpreter::new(), inputs)
    }

    fn assert_evals(inputs: &[&str], expected: &str) {
        match run(inputs) {
            Ok(result) => assert_eq!(
                result.to_string(),
                expected,
                "Inputs: {:?}",
                inputs
            ),
            Err(e) => panic!("Evaluation failed for {:?}: {}", inputs, e),
        }
    }

    fn assert_eval_error(inputs: &[&str], expected_error_variant: EvalError) {
        match run(inputs) {
            Ok(result) => panic!(
                "Expected evaluation of {:?} to fail, but got: {}",
                inputs, result
            ),
            Err(e) => assert_eq!(
                std::mem::discriminant(&e),
                std::mem::discriminant(&expected_error_variant),
                "Inputs: {:?}, expected error variant like {:?}, got: {:?}",
                inputs,
                expected_error_variant,
                e
            ),
        }
    }

    #[test]
    fn test_quote_returns_operand_unevaluated() {
        assert_evals(&["(quote a)"], "a");
        assert_evals(&["(quote (+ 1 2))"], "(+ 1 2)");
        assert_evals(&["(quote ())"], "()");
    }

    #[test]
    fn test_unbound_atom_evaluates_to_itself() {
        assert_evals(&["x"], "x");
        assert_evals(&["42"], "42");
    }

    #[test]
    fn test_bound_atom_resolves() {
        assert_evals(&["(define x (quote hello))", "x"], "hello");
        assert_evals(&["true"], "true");
        assert_evals(&["nil"], "()");
    }

    #[test]
    fn test_empty_list_is_itself() {
        assert_evals(&["()"], "()");
    }

    #[test]
    fn test_arithmetic() {
        assert_evals(&["(+ 2 3)"], "5");
        assert_evals(&["(* 2 3 4)"], "24");
        assert_evals(&["(- 10 3 2)"], "5");
        assert_evals(&["(/ 100 5 2)"], "10");
        assert_evals(&["(+ 1 (* 2 3))"], "7");
        // A single operand folds to itself, so there is no unary negation
        assert_evals(&["(- 5)"], "5");
        // The default dialect is decimal
        assert_evals(&["(/ 1 2)"], "0.5");
    }

    #[test]
    fn test_comparisons() {
        assert_evals(&["(< 1 2)"], "true");
        assert_evals(&["(< 2 1)"], "()");
        assert_evals(&["(= 2 2)"], "true");
        assert_evals(&["(= 2 3)"], "()");
        assert_evals(&["(>= 3 3)"], "true");
        // Chained comparisons re-enter the fold as 0/1
        assert_evals(&["(< 1 2 3)"], "true");
        assert_evals(&["(< 1 2 0)"], "()");
    }

    #[test]
    fn test_operands_resolve_through_environment() {
        assert_evals(&["(define x 10)", "(define y 4)", "(+ x y)"], "14");
    }

    #[test]
    fn test_define_returns_the_value() {
        assert_evals(&["(define x (+ 1 2))"], "3");
    }

    #[test]
    fn test_lambda_application() {
        assert_evals(&["((lambda (x) (+ x 1)) 41)"], "42");
        assert_evals(
            &["(define inc (lambda (x) (+ x 1)))", "(inc 41)"],
            "42",
        );
        assert_evals(
            &["(define add (lambda (a b) (+ a b)))", "(add 2 (add 3 4))"],
            "9",
        );
    }

    #[test]
    fn test_lambda_captures_at_creation_time() {
        // The closure snapshot keeps n = 10; the later redefinition is not
        // merged in because the name is already present in the frame.
        assert_evals(
            &[
                "(define n 10)",
                "(define f (lambda (x) (+ x n)))",
                "(define n 20)",
                "(f 1)",
            ],
            "11",
        );
    }

    #[test]
    fn test_names_missing_from_closure_fall_through_to_caller() {
        // g did not exist when f was created; the call-site merge supplies it.
        assert_evals(
            &[
                "(define f (lambda (x) (g x)))",
                "(define g (lambda (y) (+ y 1)))",
                "(f 1)",
            ],
            "2",
        );
    }

    #[test]
    fn test_parameters_shadow_caller_bindings() {
        assert_evals(&["(define x 100)", "((lambda (x) x) 5)"], "5");
    }

    #[test]
    fn test_quoted_lambda_applies_with_empty_closure() {
        assert_evals(&["((quote (lambda (x) (+ x 1))) 4)"], "5");
    }

    #[test]
    fn test_alias_retries_with_substituted_head() {
        assert_evals(&["(define plus (quote +))", "(plus 1 2)"], "3");
        assert_evals(
            &["(define first car)", "(first (quote (a b)))"],
            "a",
        );
    }

    #[test]
    fn test_cons_car_cdr() {
        assert_evals(&["(cons 1 (quote (2 3)))"], "(1 2 3)");
        assert_evals(&["(cons 1 ())"], "(1)");
        // An atom tail contributes no elements
        assert_evals(&["(cons 1 2)"], "(1)");
        assert_evals(&["(car (quote (1 2)))"], "1");
        assert_evals(&["(cdr (quote (1 2 3)))"], "(2 3)");
        assert_evals(&["(cdr (quote (1)))"], "()");
        // car/cdr of something without elements is false, not an error
        assert_evals(&["(car ())"], "()");
        assert_evals(&["(cdr (quote x))"], "()");
        assert_evals(
            &["(car (cdr (cons 1 (cons 2 (cons 3 ())))))"],
            "2",
        );
    }

    #[test]
    fn test_cons_of_car_and_cdr_rebuilds_the_list() {
        assert_evals(
            &["(eq (cons (car (quote (a b c))) (cdr (quote (a b c)))) (quote (a b c)))"],
            "true",
        );
    }

    #[test]
    fn test_atom_predicate() {
        assert_evals(&["(atom (quote x))"], "true");
        assert_evals(&["(atom ())"], "true");
        assert_evals(&["(atom (quote (1 2)))"], "()");
    }

    #[test]
    fn test_eq_is_structural() {
        assert_evals(&["(eq (quote (1 (2))) (quote (1 (2))))"], "true");
        assert_evals(&["(eq (quote (1 2)) (quote (2 1)))"], "()");
        assert_evals(&["(eq 1 1)"], "true");
        assert_evals(&["(eq 1 2)"], "()");
    }

    #[test]
    fn test_if_selects_a_branch() {
        assert_evals(&["(if true 1 2)"], "1");
        assert_evals(&["(if () 1 2)"], "2");
        // No matching pair and no else branch is false
        assert_evals(&["(if () 1)"], "()");
    }

    #[test]
    fn test_if_never_evaluates_untaken_branches() {
        assert_evals(&["(if true 1 (/ 1 0))"], "1");
        assert_evals(&["(if () (/ 1 0) 2)"], "2");
    }

    #[test]
    fn test_cond_walks_pairs() {
        assert_evals(
            &["(cond (eq 1 2) first (eq 1 1) second third)"],
            "second",
        );
        assert_evals(&["(cond (eq 1 2) first 99)"], "99");
        assert_evals(&["(cond (eq 1 2) first)"], "()");
    }

    #[test]
    fn test_fib() {
        assert_evals(
            &[
                "(define fib (lambda (n)
                   (if (< n 2)
                       n
                       (+ (fib (- n 1))
                          (fib (- n 2))))))",
                "(fib 10)",
            ],
            "55",
        );
    }

    #[test]
    fn test_integer_dialect_truncates() {
        let interp = Interpreter::with_dialect(Dialect::Integer);
        let result = run_with(&interp, &["(/ 7 2)"]).expect("should evaluate");
        assert_eq!(result.to_string(), "3");
        let result = run_with(&interp, &["(+ 1 2 3)"]).expect("should evaluate");
        assert_eq!(result.to_string(), "6");
    }

    #[test]
    fn test_arity_errors() {
        let dummy = EvalError::ArityMismatch {
            name: String::new(),
            expected: String::new(),
            actual: 0,
            span: Span::default(),
        };
        assert_eval_error(&["(quote)"], dummy.clone());
        assert_eval_error(&["(quote 1 2)"], dummy.clone());
        assert_eval_error(&["(car)"], dummy.clone());
        assert_eval_error(&["(if true)"], dummy.clone());
        assert_eval_error(&["((lambda (x) x) 1 2)"], dummy.clone());
        assert_eval_error(&["((lambda (x y) x) 1)"], dummy.clone());
        assert_eval_error(&["(+)"], dummy);
    }

    #[test]
    fn test_define_requires_a_symbol() {
        let dummy = EvalError::NotASymbol {
            found: String::new(),
            span: Span::default(),
        };
        assert_eval_error(&["(define (a) 1)"], dummy);
    }

    #[test]
    fn test_malformed_lambda_errors() {
        let dummy = EvalError::MalformedLambda {
            detail: String::new(),
            span: Span::default(),
        };
        // Non-list parameter list is rejected at creation
        assert_eval_error(&["(lambda x x)"], dummy.clone());
        // A non-symbol parameter is rejected when binding
        assert_eval_error(&["((quote (lambda ((a)) a)) 1)"], dummy);
    }

    #[test]
    fn test_unknown_procedure_errors() {
        let dummy = EvalError::UnknownProcedure {
            head: String::new(),
            span: Span::default(),
        };
        // A list value that is not lambda-shaped cannot be applied
        assert_eval_error(&["((quote (1 2)) 3)"], dummy.clone());
        // An unbound head evaluates to itself; no retry, no loop
        assert_eval_error(&["(f 1)"], dummy.clone());
        // A head resolving to a non-procedure atom retries once, then stops
        assert_eval_error(&["(define x 5)", "(x 1)"], dummy);
    }

    #[test]
    fn test_division_by_zero() {
        let dummy = EvalError::DivisionByZero {
            name: String::new(),
            span: Span::default(),
        };
        assert_eval_error(&["(/ 1 0)"], dummy);
        let interp = Interpreter::with_dialect(Dialect::Integer);
        let result = run_with(&interp, &["(/ 1 0)"]);
        assert!(matches!(result, Err(EvalError::DivisionByZero { .. })));
    }

    #[test]
    fn test_numeric_conversion_errors() {
        let dummy = EvalError::NumericConversion {
            name: String::new(),
            found: String::new(),
            span: Span::default(),
        };
        assert_eval_error(&["(+ 1 foo)"], dummy.clone());
        assert_eval_error(&["(+ 1 (quote (2)))"], dummy);
    }

    #[test]
    fn test_errors_leave_the_environment_usable() {
        let interp = Interpreter::new();
        let mut env = Environment::global();
        let expr = parse_str("(define x 10)").expect("should parse");
        interp.eval(expr, &mut env).expect("define should succeed");

        let expr = parse_str("(/ x 0)").expect("should parse");
        assert!(interp.eval(expr, &mut env).is_err());

        let expr = parse_str("(+ x 1)").expect("should parse");
        let result = interp.eval(expr, &mut env).expect("should recover");
        assert_eq!(result.to_string(), "11");
    }
}
