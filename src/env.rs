//! Parent-chained lexical environment.
//!
//! Bindings are immutable once introduced in a given scope: rebinding the same
//! name in the same scope is a static error (`E_DUP_BINDING`), caught by the
//! validator ahead of time and enforced again here as a defensive runtime check.
//! Top-level user functions are *not* stored here — see `eval::FunctionTable`.

use crate::diagnostic::Diagnostic;
use crate::span::Span;
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<IndexMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new top-level environment with no parent.
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(IndexMap::new()),
            parent: None,
        })
    }

    /// Creates a new child scope of `parent`.
    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(IndexMap::new()),
            parent: Some(parent),
        })
    }

    /// Binds `name` in this scope. Fails if `name` is already bound in this
    /// scope (not a parent scope — shadowing a parent binding is allowed).
    pub fn define(&self, name: &str, value: Value, span: Span) -> Result<(), Diagnostic> {
        if self.bindings.borrow().contains_key(name) {
            return Err(Diagnostic::dup_binding(name, span));
        }
        self.bindings.borrow_mut().insert(name.to_string(), value);
        Ok(())
    }

    /// Looks up `name` in this scope, then recursively in parent scopes.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    pub fn defined_in_scope(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp() -> Span {
        Span::point("test.a0", 1, 1)
    }

    #[test]
    fn define_and_get() {
        let env = Environment::new();
        env.define("x", Value::Number(42.0), sp()).unwrap();
        assert_eq!(env.get("x"), Some(Value::Number(42.0)));
    }

    #[test]
    fn undefined_symbol() {
        let env = Environment::new();
        assert!(env.get("undefined").is_none());
    }

    #[test]
    fn rebinding_same_scope_is_an_error() {
        let env = Environment::new();
        env.define("x", Value::Number(1.0), sp()).unwrap();
        let err = env.define("x", Value::Number(2.0), sp()).unwrap_err();
        assert_eq!(err.code(), "E_DUP_BINDING");
    }

    #[test]
    fn child_can_shadow_parent_binding() {
        let parent = Environment::new();
        parent.define("x", Value::Number(42.0), sp()).unwrap();

        let child = Environment::with_parent(parent);
        child.define("x", Value::Number(100.0), sp()).unwrap();

        assert_eq!(child.get("x"), Some(Value::Number(100.0)));
    }

    #[test]
    fn child_sees_parent_binding() {
        let parent = Environment::new();
        parent.define("x", Value::Number(42.0), sp()).unwrap();

        let child = Environment::with_parent(parent);
        assert_eq!(child.get("x"), Some(Value::Number(42.0)));
    }

    #[test]
    fn three_level_lookup() {
        let grandparent = Environment::new();
        grandparent.define("a", Value::Number(1.0), sp()).unwrap();

        let parent = Environment::with_parent(grandparent);
        parent.define("b", Value::Number(2.0), sp()).unwrap();

        let child = Environment::with_parent(parent);
        child.define("c", Value::Number(3.0), sp()).unwrap();

        assert_eq!(child.get("a"), Some(Value::Number(1.0)));
        assert_eq!(child.get("b"), Some(Value::Number(2.0)));
        assert_eq!(child.get("c"), Some(Value::Number(3.0)));
    }
}
