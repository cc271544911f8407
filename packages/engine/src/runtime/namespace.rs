// packages/engine/src/runtime/namespace.rs
//! Namespaces of named bindings
//!
//! A namespace can be nested in an enclosing namespace and can inherit from
//! another namespace (a type's namespace inherits from its supertype's).
//! Resolution walks the namespace itself, then the inheritance chain, then
//! the enclosing scopes outward. Definedness checks never walk.

use crate::runtime::next_identity;
use crate::runtime::value::Value;
use crate::utils::errors::{EngineError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

struct NamespaceInner {
    id: u64,
    name: String,
    enclosing: Option<Namespace>,
    inherits: Option<Namespace>,
    bindings: RwLock<HashMap<String, Value>>,
}

/// A container of named bindings
#[derive(Clone)]
pub struct Namespace {
    inner: Arc<NamespaceInner>,
}

impl Namespace {
    /// Create a top-level namespace
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_links(name, None, None)
    }

    /// Create a namespace nested inside this one
    pub fn nested(&self, name: &str) -> Namespace {
        Self::with_links(format!("{}::{}", self.name(), name), Some(self.clone()), None)
    }

    pub(crate) fn with_links(
        name: impl Into<String>,
        enclosing: Option<Namespace>,
        inherits: Option<Namespace>,
    ) -> Self {
        Self {
            inner: Arc::new(NamespaceInner {
                id: next_identity(),
                name: name.into(),
                enclosing,
                inherits,
                bindings: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn enclosing(&self) -> Option<&Namespace> {
        self.inner.enclosing.as_ref()
    }

    /// Whether `name` is bound in this exact namespace
    pub fn is_defined_here(&self, name: &str) -> bool {
        self.inner.bindings.read().contains_key(name)
    }

    /// Value bound to `name` in this exact namespace
    pub fn get_here(&self, name: &str) -> Option<Value> {
        self.inner.bindings.read().get(name).cloned()
    }

    /// Resolve `name` through inheritance, then enclosing scopes
    pub fn resolve(&self, name: &str) -> Result<Value> {
        self.lookup(name).ok_or_else(|| EngineError::UnboundName {
            namespace: self.name().to_string(),
            name: name.to_string(),
        })
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        let mut ancestor = Some(self);
        while let Some(ns) = ancestor {
            if let Some(value) = ns.get_here(name) {
                return Some(value);
            }
            ancestor = ns.inner.inherits.as_ref();
        }
        self.inner
            .enclosing
            .as_ref()
            .and_then(|enclosing| enclosing.lookup(name))
    }

    /// Bind a new name, refusing to rebind an existing one
    pub fn define(&self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let name = name.into();
        let mut bindings = self.inner.bindings.write();
        if bindings.contains_key(&name) {
            return Err(EngineError::AlreadyDefined {
                namespace: self.name().to_string(),
                name,
            });
        }
        bindings.insert(name, value.into());
        Ok(())
    }

    /// Bind `name` unconditionally
    pub fn bind(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .bindings
            .write()
            .insert(name.into(), value.into());
    }

    /// Remove a binding from this exact namespace
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.inner.bindings.write().remove(name)
    }

    /// Names bound here, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.bindings.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({})", self.inner.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::object::TypeRef;

    #[test]
    fn test_define_refuses_redefinition() {
        let ns = Namespace::new("Config");
        ns.define("LIMIT", 3).unwrap();
        let err = ns.define("LIMIT", 4).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyDefined { .. }));
        assert_eq!(ns.resolve("LIMIT").unwrap(), Value::from(3));

        ns.remove("LIMIT");
        ns.define("LIMIT", 4).unwrap();
        assert_eq!(ns.resolve("LIMIT").unwrap(), Value::from(4));
    }

    #[test]
    fn test_resolution_walks_enclosing_scopes() {
        let outer = Namespace::new("Foo");
        outer.bind("HELLO", "hello world");
        let inner = outer.nested("Bar");

        assert_eq!(inner.name(), "Foo::Bar");
        assert!(!inner.is_defined_here("HELLO"));
        assert_eq!(inner.resolve("HELLO").unwrap(), Value::from("hello world"));
        assert!(inner.resolve("MISSING").is_err());
    }

    #[test]
    fn test_type_namespaces_inherit() {
        let foo = TypeRef::builder("Foo").binding("HELLO", "hello world").build();
        let child = TypeRef::builder("ChildFoo").superclass(&foo).build();

        assert!(!child.namespace().is_defined_here("HELLO"));
        assert_eq!(
            child.namespace().resolve("HELLO").unwrap(),
            Value::from("hello world")
        );
    }

    #[test]
    fn test_remove_only_touches_exact_namespace() {
        let outer = Namespace::new("Outer");
        outer.bind("X", 1);
        let inner = outer.nested("Inner");

        assert!(inner.remove("X").is_none());
        assert_eq!(outer.get_here("X"), Some(Value::from(1)));
    }
}
