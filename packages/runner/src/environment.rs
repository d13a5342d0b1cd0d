use std::{
    cell::RefCell,
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    rc::Rc,
};

use crate::value::Value;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScopeKind {
    Module,
    Function,
    Class,
}

/// A binding environment.
///
/// Clones share the same bindings, so a closure sees later writes made by
/// the scope that defined it.
#[derive(Clone)]
pub struct Env(Rc<RefCell<Scope>>);

struct Scope {
    kind: ScopeKind,
    bindings: HashMap<String, Value>,
    parent: Option<Env>,
}

impl Env {
    pub fn module() -> Self {
        Self::new(ScopeKind::Module, None)
    }

    pub fn child(&self, kind: ScopeKind) -> Self {
        Self::new(kind, Some(self.clone()))
    }

    fn new(kind: ScopeKind, parent: Option<Env>) -> Self {
        Self(Rc::new(RefCell::new(Scope {
            kind,
            bindings: HashMap::new(),
            parent,
        })))
    }

    pub fn kind(&self) -> ScopeKind {
        self.0.borrow().kind
    }

    /// Look `name` up here, then in each enclosing scope.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut env = self.clone();

        loop {
            let parent = {
                let scope = env.0.borrow();

                if let Some(value) = scope.bindings.get(name) {
                    return Some(value.clone());
                }

                scope.parent.clone()?
            };

            env = parent;
        }
    }

    /// Bind `name` in this scope, shadowing any enclosing binding.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Take every binding out of this scope, in name order.
    pub fn take_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings: Vec<_> = self.0.borrow_mut().bindings.drain().collect();
        bindings.sort_by(|(a, _), (b, _)| a.cmp(b));
        bindings
    }

    /// The environment a function defined here should capture.
    ///
    /// Class bodies are skipped: methods see the scope around the class,
    /// not its attributes.
    pub fn closure_scope(&self) -> Self {
        let mut env = self.clone();

        loop {
            let parent = {
                let scope = env.0.borrow();

                match (scope.kind, &scope.parent) {
                    (ScopeKind::Class, Some(parent)) => parent.clone(),
                    _ => break,
                }
            };

            env = parent;
        }

        env
    }
}

impl Debug for Env {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // Bindings can refer back to this scope through closures.
        let scope = self.0.borrow();
        let mut names: Vec<_> = scope.bindings.keys().collect();
        names.sort();

        f.debug_struct("Env")
            .field("kind", &scope.kind)
            .field("names", &names)
            .finish_non_exhaustive()
    }
}
