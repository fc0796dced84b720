use std::fmt::{self, Debug, Formatter};

use gc::{Finalize, Gc, GcCell, Trace};
use lox_common::error::{ErrorS, NameError, Result};
use lox_common::types::Span;
use rustc_hash::FxHashMap;

use crate::object::Object;

/// A lexical scope, linked to the scope that encloses it.
///
/// `Env` is a handle: cloning it shares the scope rather than copying it. A
/// closure keeps its defining scope alive for as long as the closure itself
/// is reachable. Closures stored back into their own scope form cycles, which
/// the collector reclaims.
#[derive(Clone, Finalize, Trace)]
pub struct Env(Gc<GcCell<EnvImpl>>);

impl Env {
    pub fn new() -> Self {
        Self(Gc::new(GcCell::new(EnvImpl::default())))
    }

    pub fn with_parent(parent: &Env) -> Self {
        let env = EnvImpl { map: FxHashMap::default(), parent: Some(parent.clone()) };
        Self(Gc::new(GcCell::new(env)))
    }

    /// Binds `name` in this scope, replacing any previous binding of the same
    /// name in this scope.
    pub fn define(&self, name: &str, value: Object) {
        self.0.borrow_mut().map.insert(name.to_string(), value);
    }

    /// Looks `name` up in this scope and then in each enclosing scope.
    pub fn get(&self, name: &str, span: &Span) -> Result<Object> {
        let parent = {
            let env = self.0.borrow();
            if let Some(value) = env.map.get(name) {
                return Ok(value.clone());
            }
            env.parent.clone()
        };
        match parent {
            Some(parent) => parent.get(name, span),
            None => Err(not_defined(name, span)),
        }
    }

    /// Overwrites the nearest existing binding of `name`.
    pub fn assign(&self, name: &str, value: Object, span: &Span) -> Result<()> {
        let parent = {
            let mut env = self.0.borrow_mut();
            if let Some(entry) = env.map.get_mut(name) {
                *entry = value;
                return Ok(());
            }
            env.parent.clone()
        };
        match parent {
            Some(parent) => parent.assign(name, value, span),
            None => Err(not_defined(name, span)),
        }
    }

    /// Reads `name` from the scope exactly `depth` links up the chain. The
    /// depth comes from the resolver and is trusted.
    pub fn get_at(&self, depth: usize, name: &str) -> Object {
        self.ancestor(depth).0.borrow().map.get(name).cloned().unwrap_or_else(|| {
            unreachable!("variable was resolved but could not be found: {name:?}")
        })
    }

    pub fn assign_at(&self, depth: usize, name: &str, value: Object) {
        self.ancestor(depth).0.borrow_mut().map.insert(name.to_string(), value);
    }

    fn ancestor(&self, depth: usize) -> Env {
        let mut env = self.clone();
        for _ in 0..depth {
            let parent = env.0.borrow().parent.clone();
            env = parent.unwrap_or_else(|| unreachable!("variable pointed to invalid scope"));
        }
        env
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Env {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let env = self.0.borrow();
        let mut names = env.map.keys().collect::<Vec<_>>();
        names.sort_unstable();
        f.debug_struct("Env").field("names", &names).field("parent", &env.parent).finish()
    }
}

#[derive(Default, Finalize, Trace)]
pub struct EnvImpl {
    map: FxHashMap<String, Object>,
    parent: Option<Env>,
}

fn not_defined(name: &str, span: &Span) -> ErrorS {
    (NameError::NotDefined { name: name.to_string() }.into(), span.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    use lox_common::error::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn get_searches_outward() {
        let globals = Env::new();
        globals.define("a", Object::Number(1.0));
        let inner = Env::with_parent(&Env::with_parent(&globals));
        assert_eq!(inner.get("a", &(0..1)), Ok(Object::Number(1.0)));
    }

    #[test]
    fn inner_definition_shadows_outer() {
        let outer = Env::new();
        outer.define("a", Object::String("outer".to_string()));
        let inner = Env::with_parent(&outer);
        inner.define("a", Object::String("inner".to_string()));

        assert_eq!(inner.get("a", &(0..1)), Ok(Object::String("inner".to_string())));
        assert_eq!(outer.get("a", &(0..1)), Ok(Object::String("outer".to_string())));
    }

    #[test]
    fn assign_updates_nearest_binding() {
        let outer = Env::new();
        outer.define("a", Object::Nil);
        let inner = Env::with_parent(&outer);
        inner.assign("a", Object::Bool(true), &(0..1)).unwrap();
        assert_eq!(outer.get("a", &(0..1)), Ok(Object::Bool(true)));
    }

    #[test]
    fn undefined_name_fails() {
        let env = Env::with_parent(&Env::new());
        let exp = Err((Error::NameError(NameError::NotDefined { name: "b".to_string() }), 3..4));
        assert_eq!(env.get("b", &(3..4)), exp);
        assert_eq!(env.assign("b", Object::Nil, &(3..4)), exp.map(|_| ()));
    }

    #[test]
    fn redefinition_in_same_scope_overwrites() {
        let env = Env::new();
        env.define("a", Object::Number(1.0));
        env.define("a", Object::Number(2.0));
        assert_eq!(env.get("a", &(0..1)), Ok(Object::Number(2.0)));
    }

    #[test]
    fn distance_access_skips_name_search() {
        let outer = Env::new();
        outer.define("a", Object::Number(1.0));
        let middle = Env::with_parent(&outer);
        middle.define("a", Object::Number(2.0));
        let inner = Env::with_parent(&middle);

        assert_eq!(inner.get_at(2, "a"), Object::Number(1.0));
        assert_eq!(inner.get_at(1, "a"), Object::Number(2.0));

        inner.assign_at(2, "a", Object::Number(3.0));
        assert_eq!(outer.get_at(0, "a"), Object::Number(3.0));
        assert_eq!(middle.get_at(0, "a"), Object::Number(2.0));
    }
}
