use crate::environment::Environment;
use crate::source::Span;
use std::fmt;

/// A symbolic expression: either a leaf atom holding opaque text, or an
/// ordered list of child expressions. This one type serves as both code (AST)
/// and data.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Atom(String),
    List(Vec<Expr>),
}

/// An expression together with its source span and, for lambda values only, a
/// snapshot of the environment that was current when the `lambda` form was
/// evaluated. The snapshot is a value copy: later mutation of the defining
/// scope never alters an already-created closure.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub closure: Option<Box<Environment>>,
}

// Structural equality is deep over `kind` only; spans and closures are
// deliberately ignored so that `eq` and the tests compare shapes, not origins.
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr {
            kind,
            span,
            closure: None,
        }
    }

    pub fn atom(text: impl Into<String>, span: Span) -> Self {
        Expr::new(ExprKind::Atom(text.into()), span)
    }

    pub fn list(items: Vec<Expr>, span: Span) -> Self {
        Expr::new(ExprKind::List(items), span)
    }

    /// The canonical true value.
    pub fn truth(span: Span) -> Self {
        Expr::atom("true", span)
    }

    /// The canonical false value, which doubles as the empty list `()`.
    pub fn falsity(span: Span) -> Self {
        Expr::list(Vec::new(), span)
    }

    /// Maps a test result onto the two boolean sentinels.
    pub fn from_test(test: bool, span: Span) -> Self {
        if test {
            Expr::truth(span)
        } else {
            Expr::falsity(span)
        }
    }

    pub fn as_atom(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Atom(text) => Some(text),
            ExprKind::List(_) => None,
        }
    }

    pub fn items(&self) -> Option<&[Expr]> {
        match &self.kind {
            ExprKind::List(items) => Some(items),
            ExprKind::Atom(_) => None,
        }
    }

    /// True for the canonical false value; everything else is truthy.
    pub fn is_false(&self) -> bool {
        matches!(&self.kind, ExprKind::List(items) if items.is_empty())
    }

    /// True when the expression has no children: any atom, or the empty list.
    pub fn is_leaf(&self) -> bool {
        match &self.kind {
            ExprKind::Atom(_) => true,
            ExprKind::List(items) => items.is_empty(),
        }
    }

    /// Recognizes a lambda value: a 3-element list whose first element is the
    /// `lambda` marker. Returns the parameter list expression and the body.
    /// The closure may still be absent when the list was built with `quote`
    /// instead of the `lambda` form.
    pub fn lambda_parts(&self) -> Option<(&Expr, &Expr)> {
        match &self.kind {
            ExprKind::List(items) => match items.as_slice() {
                [marker, params, body] if marker.as_atom() == Some("lambda") => {
                    Some((params, body))
                }
                _ => None,
            },
            ExprKind::Atom(_) => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Atom(text) => write!(f, "{}", text),
            ExprKind::List(items) => {
                write!(f, "(")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(text: &str) -> Expr {
        Expr::atom(text, Span::default())
    }

    fn list(items: Vec<Expr>) -> Expr {
        Expr::list(items, Span::default())
    }

    #[test]
    fn test_display() {
        assert_eq!(atom("foo").to_string(), "foo");
        assert_eq!(list(vec![]).to_string(), "()");
        assert_eq!(
            list(vec![atom("+"), atom("1"), list(vec![atom("*"), atom("2")])]).to_string(),
            "(+ 1 (* 2))"
        );
    }

    #[test]
    fn test_structural_equality_ignores_spans() {
        let a = Expr::atom("x", Span::new(0, 1));
        let b = Expr::atom("x", Span::new(10, 11));
        assert_eq!(a, b);

        let l1 = Expr::list(vec![a], Span::new(0, 3));
        let l2 = Expr::list(vec![b], Span::new(5, 8));
        assert_eq!(l1, l2);

        assert_ne!(atom("x"), atom("y"));
        assert_ne!(list(vec![atom("x")]), list(vec![atom("x"), atom("x")]));
        assert_ne!(atom("x"), list(vec![atom("x")]));
    }

    #[test]
    fn test_structural_equality_ignores_closure() {
        let plain = list(vec![atom("lambda"), list(vec![atom("x")]), atom("x")]);
        let mut captured = plain.clone();
        let mut env = Environment::new();
        env.define("y", atom("1"));
        captured.closure = Some(Box::new(env));
        assert_eq!(plain, captured);
    }

    #[test]
    fn test_sentinels() {
        assert!(Expr::falsity(Span::default()).is_false());
        assert!(!Expr::truth(Span::default()).is_false());
        assert!(!atom("0").is_false()); // only the empty list is false
        assert_eq!(Expr::from_test(true, Span::default()), atom("true"));
        assert_eq!(Expr::from_test(false, Span::default()), list(vec![]));
    }

    #[test]
    fn test_is_leaf() {
        assert!(atom("a").is_leaf());
        assert!(list(vec![]).is_leaf());
        assert!(!list(vec![atom("a")]).is_leaf());
    }

    #[test]
    fn test_lambda_parts() {
        let lambda = list(vec![
            atom("lambda"),
            list(vec![atom("a"), atom("b")]),
            list(vec![atom("+"), atom("a"), atom("b")]),
        ]);
        let (params, body) = lambda.lambda_parts().expect("should be a lambda");
        assert_eq!(params.items().map(|items| items.len()), Some(2));
        assert!(body.items().is_some());

        // Wrong marker, wrong length, or an atom are not lambdas
        assert!(atom("lambda").lambda_parts().is_none());
        assert!(list(vec![atom("quote"), atom("x"), atom("y")])
            .lambda_parts()
            .is_none());
        assert!(list(vec![atom("lambda"), atom("x")]).lambda_parts().is_none());
    }
}
