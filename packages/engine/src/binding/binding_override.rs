// packages/engine/src/binding/binding_override.rs
//! Overrides of named bindings in a namespace
//!
//! Hooking stashes the binding defined directly in the namespace (if any)
//! and rebinds the name to nil. The override can then replace the value or
//! hide the name entirely; unhooking puts back exactly what was there,
//! including the absence of a binding.
//!
//! Definedness is always judged on the exact namespace. Lookups made by code
//! under test still go through ordinary resolution, so nested namespaces and
//! subtypes see the override too.

use crate::interception::method_interceptor::SpyId;
use crate::registry::agency::{Agent, Registry};
use crate::runtime::namespace::Namespace;
use crate::runtime::value::Value;
use crate::utils::errors::{EngineError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Namespace a binding target stands for; types stand for their own
pub(crate) fn namespace_of(target: &Value) -> Result<Namespace> {
    match target {
        Value::Namespace(ns) => Ok(ns.clone()),
        Value::Type(ty) => Ok(ty.namespace().clone()),
        other => Err(EngineError::InvalidTarget(format!(
            "{} ({}) is not a namespace",
            other,
            other.kind()
        ))),
    }
}

#[derive(Default)]
struct BindingState {
    hooked: bool,
    previously_defined: bool,
    original: Option<Value>,
    replacement: Option<Value>,
    hidden: bool,
}

struct BindingInner {
    id: SpyId,
    namespace: Namespace,
    name: String,
    registry: Registry,
    state: Mutex<BindingState>,
}

/// Stash, replace and restore one named binding
#[derive(Clone)]
pub struct BindingOverride {
    inner: Arc<BindingInner>,
}

impl BindingOverride {
    /// Create an unhooked override of `name` in `target`
    ///
    /// `target` must be a namespace or a type; a type's own namespace is used.
    pub fn new(registry: &Registry, target: &Value, name: impl Into<String>) -> Result<Self> {
        let namespace = namespace_of(target)?;

        Ok(Self {
            inner: Arc::new(BindingInner {
                id: SpyId::new(),
                namespace,
                name: name.into(),
                registry: registry.clone(),
                state: Mutex::new(BindingState::default()),
            }),
        })
    }

    pub fn id(&self) -> SpyId {
        self.inner.id
    }

    pub fn namespace(&self) -> &Namespace {
        &self.inner.namespace
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn qualified(&self) -> String {
        format!("{}::{}", self.inner.namespace.name(), self.inner.name)
    }

    /// Stash the current binding and rebind the name to nil
    ///
    /// Without `force`, the name must be bound directly in the namespace.
    pub fn hook(&self, force: bool) -> Result<Self> {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if state.hooked {
            return Err(EngineError::AlreadyHooked {
                target: inner.namespace.name().to_string(),
                method: inner.name.clone(),
            });
        }

        let nest = inner.registry.nest(&inner.namespace);
        nest.add(self)?;

        let previously_defined = inner.namespace.is_defined_here(&inner.name);
        if !previously_defined && !force {
            nest.remove(self)?;
            return Err(EngineError::UnboundName {
                namespace: inner.namespace.name().to_string(),
                name: inner.name.clone(),
            });
        }
        let original = inner.namespace.get_here(&inner.name);

        inner.namespace.remove(&inner.name);
        inner.namespace.define(inner.name.clone(), Value::Nil)?;

        if let Err(e) = inner.registry.recruit(Agent::Binding(self.clone())) {
            match &original {
                Some(value) => inner.namespace.bind(inner.name.clone(), value.clone()),
                None => {
                    inner.namespace.remove(&inner.name);
                }
            }
            nest.remove(self)?;
            return Err(e);
        }

        debug!(
            "Hooked binding {} (previously defined: {})",
            self.qualified(),
            previously_defined
        );

        *state = BindingState {
            hooked: true,
            previously_defined,
            original,
            replacement: Some(Value::Nil),
            hidden: false,
        };
        Ok(self.clone())
    }

    /// Bind the name to `value` for as long as the override is hooked
    pub fn and_return(&self, value: impl Into<Value>) -> Result<Self> {
        let value = value.into();
        let mut state = self.inner.state.lock();
        self.ensure_hooked(&state)?;

        self.inner.namespace.remove(&self.inner.name);
        self.inner
            .namespace
            .define(self.inner.name.clone(), value.clone())?;

        debug!("Binding {} now returns {}", self.qualified(), value);
        state.replacement = Some(value);
        state.hidden = false;
        Ok(self.clone())
    }

    /// Leave the name unbound, which differs from binding it to nil
    pub fn and_hide(&self) -> Result<Self> {
        let mut state = self.inner.state.lock();
        self.ensure_hooked(&state)?;

        self.inner.namespace.remove(&self.inner.name);

        debug!("Binding {} hidden", self.qualified());
        state.replacement = None;
        state.hidden = true;
        Ok(self.clone())
    }

    fn ensure_hooked(&self, state: &BindingState) -> Result<()> {
        if state.hooked {
            Ok(())
        } else {
            Err(EngineError::NotHooked(self.qualified()))
        }
    }

    /// Restore the stashed binding and retire from the registry
    pub fn unhook(&self) -> Result<()> {
        self.restore_detached()?;
        self.inner.registry.retire(&Agent::Binding(self.clone()))
    }

    /// Restore the namespace and leave the namespace registry only
    pub(crate) fn restore_detached(&self) -> Result<()> {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if !state.hooked {
            return Err(EngineError::NeverHooked {
                method: inner.name.clone(),
            });
        }

        match (state.previously_defined, state.original.clone()) {
            (true, Some(original)) => inner.namespace.bind(inner.name.clone(), original),
            _ => {
                inner.namespace.remove(&inner.name);
            }
        }
        state.hooked = false;
        state.replacement = None;
        state.hidden = false;
        drop(state);

        debug!("Unhooked binding {}", self.qualified());
        inner.registry.nest(&inner.namespace).remove(self)
    }

    pub fn is_hooked(&self) -> bool {
        self.inner.state.lock().hooked
    }

    pub fn is_hidden(&self) -> bool {
        self.inner.state.lock().hidden
    }

    /// Whether the name was bound directly in the namespace when hooked
    pub fn previously_defined(&self) -> bool {
        self.inner.state.lock().previously_defined
    }

    /// Value stashed at hook time
    pub fn original_value(&self) -> Option<Value> {
        self.inner.state.lock().original.clone()
    }

    /// Value currently bound by the override; `None` while hidden or unhooked
    pub fn replacement(&self) -> Option<Value> {
        self.inner.state.lock().replacement.clone()
    }
}

impl PartialEq for BindingOverride {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl fmt::Debug for BindingOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingOverride")
            .field("id", &self.inner.id)
            .field("binding", &self.qualified())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::object::TypeRef;

    fn foo() -> TypeRef {
        TypeRef::builder("Foo").binding("HELLO", "hello world").build()
    }

    #[test]
    fn test_foo_scenario() {
        let registry = Registry::new();
        let foo = foo();

        let binding = BindingOverride::new(&registry, &Value::from(&foo), "HELLO")
            .unwrap()
            .hook(false)
            .unwrap();
        assert_eq!(foo.namespace().resolve("HELLO").unwrap(), Value::Nil);

        binding.and_return("awesome").unwrap();
        assert_eq!(foo.namespace().resolve("HELLO").unwrap(), Value::from("awesome"));

        binding.unhook().unwrap();
        assert_eq!(
            foo.namespace().resolve("HELLO").unwrap(),
            Value::from("hello world")
        );
        assert!(registry.is_empty());
        assert!(registry.hooked_bindings(foo.namespace()).is_empty());
    }

    #[test]
    fn test_non_namespace_target_rejected() {
        let registry = Registry::new();
        let err = BindingOverride::new(&registry, &Value::from(5), "X").unwrap_err();
        assert!(matches!(err, EngineError::InvalidTarget(_)));
    }

    #[test]
    fn test_unbound_name_needs_force() {
        let registry = Registry::new();
        let ns = Namespace::new("Empty");
        let binding = BindingOverride::new(&registry, &Value::from(&ns), "GONE").unwrap();

        assert!(matches!(
            binding.hook(false).unwrap_err(),
            EngineError::UnboundName { .. }
        ));
        assert!(registry.hooked_bindings(&ns).is_empty());

        binding.hook(true).unwrap().and_return(3).unwrap();
        assert!(!binding.previously_defined());
        assert_eq!(ns.resolve("GONE").unwrap(), Value::from(3));

        binding.unhook().unwrap();
        assert!(!ns.is_defined_here("GONE"));
    }

    #[test]
    fn test_hide_is_distinct_from_nil() {
        let registry = Registry::new();
        let foo = foo();
        let binding = BindingOverride::new(&registry, &Value::from(&foo), "HELLO")
            .unwrap()
            .hook(false)
            .unwrap();

        assert!(foo.namespace().is_defined_here("HELLO"));
        binding.and_hide().unwrap();
        assert!(binding.is_hidden());
        assert!(!foo.namespace().is_defined_here("HELLO"));
        assert!(foo.namespace().resolve("HELLO").is_err());

        binding.unhook().unwrap();
        assert_eq!(binding.original_value(), Some(Value::from("hello world")));
        assert_eq!(
            foo.namespace().resolve("HELLO").unwrap(),
            Value::from("hello world")
        );
    }

    #[test]
    fn test_mutations_require_hook() {
        let registry = Registry::new();
        let foo = foo();
        let binding = BindingOverride::new(&registry, &Value::from(&foo), "HELLO").unwrap();

        assert!(matches!(
            binding.and_return(1).unwrap_err(),
            EngineError::NotHooked(_)
        ));
        assert!(matches!(binding.and_hide().unwrap_err(), EngineError::NotHooked(_)));
        assert!(matches!(
            binding.unhook().unwrap_err(),
            EngineError::NeverHooked { .. }
        ));
    }

    #[test]
    fn test_second_override_of_same_name_fails() {
        let registry = Registry::new();
        let foo = foo();
        BindingOverride::new(&registry, &Value::from(&foo), "HELLO")
            .unwrap()
            .hook(false)
            .unwrap();

        let second = BindingOverride::new(&registry, &Value::from(&foo), "HELLO").unwrap();
        assert!(matches!(
            second.hook(false).unwrap_err(),
            EngineError::AlreadyHooked { .. }
        ));

        registry.dissolve();
        assert_eq!(
            foo.namespace().resolve("HELLO").unwrap(),
            Value::from("hello world")
        );
    }
}
