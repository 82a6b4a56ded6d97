use crate::environment::Environment;
use crate::evaluator::{EvalError, EvalResult, Interpreter, NativeProcedure};
use crate::source::Span;
use crate::types::Expr;
use std::marker::PhantomData;
use std::ops::{Add, Div, Mul, Sub};

/// The contract a numeric backend must satisfy: parse from and format to the
/// atom text the evaluator traffics in, plus the arithmetic and ordering the
/// operators below are built from. `from_bool` exists because comparison
/// results re-enter the reduction as 0/1 (see [`FoldOutcome`]).
pub trait NumericValue:
    Clone
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
{
    fn parse(text: &str) -> Option<Self>;
    fn format(&self) -> String;
    fn from_bool(test: bool) -> Self;

    fn is_zero(&self) -> bool {
        *self == Self::from_bool(false)
    }
}

impl NumericValue for f64 {
    fn parse(text: &str) -> Option<Self> {
        text.parse().ok()
    }

    fn format(&self) -> String {
        self.to_string()
    }

    fn from_bool(test: bool) -> Self {
        if test { 1.0 } else { 0.0 }
    }
}

impl NumericValue for i64 {
    fn parse(text: &str) -> Option<Self> {
        text.parse().ok()
    }

    fn format(&self) -> String {
        self.to_string()
    }

    fn from_bool(test: bool) -> Self {
        test as i64
    }
}

/// Faults an operator can raise mid-fold; surfaced as recoverable
/// [`EvalError`]s by the procedure driving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericFault {
    DivisionByZero,
}

/// What one operator application folds down to. The operator's `Output` type
/// is the whole dispatch: an arithmetic result formats back into a numeric
/// atom, a comparison result lands on the canonical true/false sentinels.
/// `reenter` feeds an intermediate result back into the left-fold, with
/// comparisons carried through the accumulator as 0/1.
pub trait FoldOutcome<V: NumericValue> {
    fn reenter(self) -> V;
    fn finish(acc: V, span: Span) -> Expr;
}

pub struct Arithmetic<V>(pub V);

pub struct Comparison(pub bool);

impl<V: NumericValue> FoldOutcome<V> for Arithmetic<V> {
    fn reenter(self) -> V {
        self.0
    }

    fn finish(acc: V, span: Span) -> Expr {
        Expr::atom(acc.format(), span)
    }
}

impl<V: NumericValue> FoldOutcome<V> for Comparison {
    fn reenter(self) -> V {
        V::from_bool(self.0)
    }

    fn finish(acc: V, span: Span) -> Expr {
        Expr::from_test(!acc.is_zero(), span)
    }
}

pub trait BinaryOperator<V: NumericValue> {
    type Output: FoldOutcome<V>;

    fn apply(lhs: V, rhs: V) -> Result<Self::Output, NumericFault>;
}

macro_rules! arithmetic_operator {
    ($name:ident, $op:tt) => {
        pub struct $name;

        impl<V: NumericValue> BinaryOperator<V> for $name {
            type Output = Arithmetic<V>;

            fn apply(lhs: V, rhs: V) -> Result<Self::Output, NumericFault> {
                Ok(Arithmetic(lhs $op rhs))
            }
        }
    };
}

macro_rules! comparison_operator {
    ($name:ident, $op:tt) => {
        pub struct $name;

        impl<V: NumericValue> BinaryOperator<V> for $name {
            type Output = Comparison;

            fn apply(lhs: V, rhs: V) -> Result<Self::Output, NumericFault> {
                Ok(Comparison(lhs $op rhs))
            }
        }
    };
}

arithmetic_operator!(Plus, +);
arithmetic_operator!(Minus, -);
arithmetic_operator!(Times, *);

pub struct Divide;

impl<V: NumericValue> BinaryOperator<V> for Divide {
    type Output = Arithmetic<V>;

    fn apply(lhs: V, rhs: V) -> Result<Self::Output, NumericFault> {
        if rhs.is_zero() {
            Err(NumericFault::DivisionByZero)
        } else {
            Ok(Arithmetic(lhs / rhs))
        }
    }
}

comparison_operator!(EqualTo, ==);
comparison_operator!(Less, <);
comparison_operator!(LessEqual, <=);
comparison_operator!(Greater, >);
comparison_operator!(GreaterEqual, >=);

/// The generic reduction engine: one instantiation per operator symbol.
/// Operands are evaluated left to right in the caller's environment, each
/// resulting atom is parsed as `V`, and the values are left-folded with `Op`
/// starting from the first one.
pub struct NumericProcedure<V, Op> {
    name: String,
    _marker: PhantomData<fn() -> (V, Op)>,
}

impl<V, Op> NumericProcedure<V, Op> {
    pub fn new(name: impl Into<String>) -> Self {
        NumericProcedure {
            name: name.into(),
            _marker: PhantomData,
        }
    }
}

impl<V, Op> NativeProcedure for NumericProcedure<V, Op>
where
    V: NumericValue + 'static,
    Op: BinaryOperator<V> + 'static,
{
    fn call(
        &self,
        interp: &Interpreter,
        operands: &[Expr],
        span: Span,
        env: &mut Environment,
    ) -> EvalResult {
        let mut parsed = Vec::with_capacity(operands.len());
        for operand in operands {
            let value = interp.eval(operand.clone(), env)?;
            let number = value.as_atom().and_then(V::parse).ok_or_else(|| {
                EvalError::NumericConversion {
                    name: self.name.clone(),
                    found: value.to_string(),
                    span: operand.span,
                }
            })?;
            parsed.push(number);
        }

        let mut values = parsed.into_iter();
        let Some(mut acc) = values.next() else {
            // Folding zero operands is undefined; refuse it outright
            return Err(EvalError::ArityMismatch {
                name: self.name.clone(),
                expected: "at least 1".to_string(),
                actual: 0,
                span,
            });
        };
        for value in values {
            acc = Op::apply(acc, value)
                .map_err(|fault| match fault {
                    NumericFault::DivisionByZero => EvalError::DivisionByZero {
                        name: self.name.clone(),
                        span,
                    },
                })?
                .reenter();
        }

        Ok(<Op::Output as FoldOutcome<V>>::finish(acc, span))
    }
}

/// Selects which backend the standard operator table is instantiated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Decimal arithmetic over `f64`.
    #[default]
    Decimal,
    /// Truncating integer arithmetic over `i64`.
    Integer,
}

/// Installs `+ - * / = < <= > >=` over the given backend.
pub fn install_numeric_procedures<V: NumericValue + 'static>(interp: &mut Interpreter) {
    interp.register_native("+", NumericProcedure::<V, Plus>::new("+"));
    interp.register_native("-", NumericProcedure::<V, Minus>::new("-"));
    interp.register_native("*", NumericProcedure::<V, Times>::new("*"));
    interp.register_native("/", NumericProcedure::<V, Divide>::new("/"));
    interp.register_native("=", NumericProcedure::<V, EqualTo>::new("="));
    interp.register_native("<", NumericProcedure::<V, Less>::new("<"));
    interp.register_native("<=", NumericProcedure::<V, LessEqual>::new("<="));
    interp.register_native(">", NumericProcedure::<V, Greater>::new(">"));
    interp.register_native(">=", NumericProcedure::<V, GreaterEqual>::new(">="));
}

pub fn install_dialect(interp: &mut Interpreter, dialect: Dialect) {
    match dialect {
        Dialect::Decimal => install_numeric_procedures::<f64>(interp),
        Dialect::Integer => install_numeric_procedures::<i64>(interp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_f64() {
        assert_eq!(f64::parse("5"), Some(5.0));
        assert_eq!(f64::parse("-4.5"), Some(-4.5));
        assert_eq!(f64::parse("five"), None);
        assert_eq!(5.0_f64.format(), "5");
        assert_eq!(2.5_f64.format(), "2.5");
    }

    #[test]
    fn test_parse_and_format_i64() {
        assert_eq!(i64::parse("42"), Some(42));
        assert_eq!(i64::parse("4.5"), None);
        assert_eq!((-7_i64).format(), "-7");
    }

    #[test]
    fn test_from_bool_round_trip() {
        assert!(f64::from_bool(false).is_zero());
        assert!(!f64::from_bool(true).is_zero());
        assert!(i64::from_bool(false).is_zero());
        assert!(!i64::from_bool(true).is_zero());
    }

    #[test]
    fn test_operator_outputs() {
        let Arithmetic(sum) = <Plus as BinaryOperator<f64>>::apply(2.0, 3.0).expect("adds");
        assert_eq!(sum, 5.0);

        let Comparison(test) = <Less as BinaryOperator<i64>>::apply(1, 2).expect("compares");
        assert!(test);
        let Comparison(test) = <Less as BinaryOperator<i64>>::apply(2, 1).expect("compares");
        assert!(!test);
    }

    #[test]
    fn test_divide_guards_zero() {
        assert!(matches!(
            <Divide as BinaryOperator<i64>>::apply(1, 0),
            Err(NumericFault::DivisionByZero)
        ));
        assert!(matches!(
            <Divide as BinaryOperator<f64>>::apply(1.0, 0.0),
            Err(NumericFault::DivisionByZero)
        ));
        let Arithmetic(quotient) =
            <Divide as BinaryOperator<i64>>::apply(7, 2).expect("divides");
        assert_eq!(quotient, 3);
    }

    #[test]
    fn test_finish_dispatch() {
        // Arithmetic results format back to atoms; comparison results land on
        // the sentinels regardless of the accumulator's numeric value.
        let span = Span::default();
        assert_eq!(
            <Arithmetic<f64> as FoldOutcome<f64>>::finish(24.0, span),
            Expr::atom("24", span)
        );
        assert_eq!(
            <Comparison as FoldOutcome<f64>>::finish(1.0, span),
            Expr::truth(span)
        );
        assert_eq!(
            <Comparison as FoldOutcome<f64>>::finish(0.0, span),
            Expr::falsity(span)
        );
    }
}
