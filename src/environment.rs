use crate::source::Span;
use crate::types::Expr;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// A flat mapping from symbol name to a shared expression value.
///
/// There is no frame chain: a lambda captures a snapshot of the whole map
/// (`clone`, cheap because values are `Rc`-shared), and a call frame is built
/// by copying that snapshot, binding the parameters, and merging in whatever
/// the caller's environment has that the frame does not. `define` replaces
/// the map entry wholesale, so an existing snapshot keeps the binding it was
/// created with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    bindings: HashMap<String, Rc<Expr>>,
}

impl Environment {
    /// Creates a new, empty environment.
    pub fn new() -> Self {
        Environment::default()
    }

    /// Creates the root environment, seeded with the boolean constants the
    /// evaluator's sentinels resolve from. `false` and `nil` are both the
    /// canonical empty-list value.
    pub fn global() -> Self {
        let mut env = Environment::new();
        env.define("true", Expr::truth(Span::default()));
        env.define("false", Expr::falsity(Span::default()));
        env.define("nil", Expr::falsity(Span::default()));
        env
    }

    /// Binds a name in this environment, replacing any existing binding.
    pub fn define(&mut self, name: impl Into<String>, value: Expr) {
        self.bindings.insert(name.into(), Rc::new(value));
    }

    /// Looks a name up in this environment alone; there is no outer chain to
    /// walk.
    pub fn get(&self, name: &str) -> Option<Rc<Expr>> {
        self.bindings.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Copies every binding of `other` that this environment does not already
    /// have. Never overwrites: parameter and closure bindings win over the
    /// caller's dynamic scope.
    pub fn merge_absent(&mut self, other: &Environment) {
        for (name, value) in &other.bindings {
            if !self.bindings.contains_key(name) {
                self.bindings.insert(name.clone(), Rc::clone(value));
            }
        }
    }

    /// Gets the set of all bound identifiers (used for REPL completion).
    pub fn identifiers(&self) -> HashSet<String> {
        self.bindings.keys().cloned().collect()
    }
}
