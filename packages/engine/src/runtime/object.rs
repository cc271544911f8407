// packages/engine/src/runtime/object.rs
//! Types, objects and message dispatch
//!
//! Resolution order for a message sent to an object is its per-instance
//! table first, then the instance tables of its type and every supertype.
//! Messages sent to a type resolve through the type-level tables of the
//! type and its supertypes.
//!
//! ```text
//! pen ──▶ [pen singleton] ──▶ [Pen instance] ──▶ [Base instance]
//! Pen ──▶ [Pen type-level] ──▶ [Base type-level]
//! ```

use crate::runtime::method::{
    Args, Callback, CallSite, Invocation, Method, MethodEntry, MethodTable, Signature, Visibility,
};
use crate::runtime::namespace::Namespace;
use crate::runtime::next_identity;
use crate::runtime::value::Value;
use crate::utils::errors::{EngineError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Handler for messages no method answers
pub type Fallback = Arc<dyn Fn(&Invocation) -> Result<Value> + Send + Sync>;

/// Whether dispatch honours visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    /// Only public methods are reachable
    Public,
    /// Every method is reachable
    Any,
}

struct TypeInner {
    id: u64,
    name: String,
    superclass: Option<TypeRef>,
    instance_methods: MethodTable,
    type_methods: MethodTable,
    namespace: Namespace,
    fallback: RwLock<Option<Fallback>>,
}

/// A named type
#[derive(Clone)]
pub struct TypeRef {
    inner: Arc<TypeInner>,
}

impl TypeRef {
    pub fn builder(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn superclass(&self) -> Option<&TypeRef> {
        self.inner.superclass.as_ref()
    }

    /// This type followed by every supertype
    pub fn ancestors(&self) -> Vec<TypeRef> {
        let mut chain = vec![self.clone()];
        let mut current = self.inner.superclass.clone();
        while let Some(ty) = current {
            current = ty.inner.superclass.clone();
            chain.push(ty);
        }
        chain
    }

    pub fn is_a(&self, other: &TypeRef) -> bool {
        self.ancestors().iter().any(|t| t.id() == other.id())
    }

    /// Methods defined directly for instances of this type
    pub fn instance_table(&self) -> &MethodTable {
        &self.inner.instance_methods
    }

    /// Methods defined directly on the type itself
    pub fn type_table(&self) -> &MethodTable {
        &self.inner.type_methods
    }

    pub(crate) fn instance_chain(&self) -> Vec<MethodTable> {
        self.ancestors()
            .iter()
            .map(|t| t.inner.instance_methods.clone())
            .collect()
    }

    pub(crate) fn type_chain(&self) -> Vec<MethodTable> {
        self.ancestors()
            .iter()
            .map(|t| t.inner.type_methods.clone())
            .collect()
    }

    /// Bindings scoped to this type
    pub fn namespace(&self) -> &Namespace {
        &self.inner.namespace
    }

    /// Closest fallback handler along the ancestor chain
    pub fn fallback(&self) -> Option<Fallback> {
        self.ancestors()
            .iter()
            .find_map(|t| t.inner.fallback.read().clone())
    }

    pub fn set_fallback<F>(&self, f: F)
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        *self.inner.fallback.write() = Some(Arc::new(f));
    }

    /// Define an instance method at runtime
    pub fn define_method<F>(&self, name: &str, signature: Signature, visibility: Visibility, body: F)
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        let method = Method::new(name, signature, body);
        self.inner
            .instance_methods
            .define(name, MethodEntry::new(method, visibility));
    }

    /// Remove an instance method defined directly on this type
    pub fn remove_method(&self, name: &str) -> Option<MethodEntry> {
        self.inner.instance_methods.remove(name)
    }

    /// Visibility an instance of this type would see for `name`
    pub fn instance_visibility_of(&self, name: &str) -> Option<Visibility> {
        resolve(&self.instance_chain(), name).map(|entry| entry.visibility)
    }

    /// Visibility of a type-level method
    pub fn visibility_of(&self, name: &str) -> Option<Visibility> {
        resolve(&self.type_chain(), name).map(|entry| entry.visibility)
    }

    /// Call a public type-level method
    #[track_caller]
    pub fn call(&self, method: &str, args: impl Into<Args>) -> Result<Value> {
        let call_site = CallSite::here();
        self.dispatch(method, args.into(), None, call_site, Access::Public)
    }

    /// Call a type-level method regardless of visibility
    #[track_caller]
    pub fn send(&self, method: &str, args: impl Into<Args>) -> Result<Value> {
        let call_site = CallSite::here();
        self.send_at(method, args.into(), None, call_site)
    }

    pub(crate) fn send_at(
        &self,
        method: &str,
        args: Args,
        callback: Option<Callback>,
        call_site: CallSite,
    ) -> Result<Value> {
        self.dispatch(method, args, callback, call_site, Access::Any)
    }

    fn dispatch(
        &self,
        method: &str,
        args: Args,
        callback: Option<Callback>,
        call_site: CallSite,
        access: Access,
    ) -> Result<Value> {
        let invocation = Invocation {
            receiver: Value::Type(self.clone()),
            method: method.to_string(),
            args,
            callback,
            call_site,
        };
        dispatch(&self.type_chain(), &invocation, access, None, || {
            self.name().to_string()
        })
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.inner.name)
    }
}

/// Builder for [`TypeRef`]
pub struct TypeBuilder {
    name: String,
    superclass: Option<TypeRef>,
    enclosing: Option<Namespace>,
    instance_methods: MethodTable,
    type_methods: MethodTable,
    bindings: Vec<(String, Value)>,
    fallback: Option<Fallback>,
}

impl TypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            enclosing: None,
            instance_methods: MethodTable::new(),
            type_methods: MethodTable::new(),
            bindings: Vec::new(),
            fallback: None,
        }
    }

    pub fn superclass(mut self, superclass: &TypeRef) -> Self {
        self.superclass = Some(superclass.clone());
        self
    }

    /// Namespace the type's own namespace is nested in
    pub fn within(mut self, enclosing: &Namespace) -> Self {
        self.enclosing = Some(enclosing.clone());
        self
    }

    pub fn method<F>(self, name: &str, signature: Signature, body: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        self.method_with_visibility(name, signature, Visibility::Public, body)
    }

    pub fn protected_method<F>(self, name: &str, signature: Signature, body: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        self.method_with_visibility(name, signature, Visibility::Protected, body)
    }

    pub fn private_method<F>(self, name: &str, signature: Signature, body: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        self.method_with_visibility(name, signature, Visibility::Private, body)
    }

    pub fn method_with_visibility<F>(
        self,
        name: &str,
        signature: Signature,
        visibility: Visibility,
        body: F,
    ) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        let method = Method::new(name, signature, body);
        self.instance_methods
            .define(name, MethodEntry::new(method, visibility));
        self
    }

    /// Define a type-level method
    pub fn type_method<F>(self, name: &str, signature: Signature, body: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        self.type_method_with_visibility(name, signature, Visibility::Public, body)
    }

    pub fn type_method_with_visibility<F>(
        self,
        name: &str,
        signature: Signature,
        visibility: Visibility,
        body: F,
    ) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        let method = Method::new(name, signature, body);
        self.type_methods
            .define(name, MethodEntry::new(method, visibility));
        self
    }

    /// Bind a name in the type's namespace
    pub fn binding(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.push((name.into(), value.into()));
        self
    }

    pub fn fallback<F>(mut self, f: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> TypeRef {
        let qualified = match &self.enclosing {
            Some(enclosing) => format!("{}::{}", enclosing.name(), self.name),
            None => self.name.clone(),
        };
        let namespace = Namespace::with_links(
            qualified,
            self.enclosing.clone(),
            self.superclass.as_ref().map(|s| s.namespace().clone()),
        );
        for (name, value) in self.bindings {
            namespace.bind(name, value);
        }

        TypeRef {
            inner: Arc::new(TypeInner {
                id: next_identity(),
                name: self.name,
                superclass: self.superclass,
                instance_methods: self.instance_methods,
                type_methods: self.type_methods,
                namespace,
                fallback: RwLock::new(self.fallback),
            }),
        }
    }
}

struct ObjectInner {
    id: u64,
    class: TypeRef,
    singleton: MethodTable,
    fields: RwLock<HashMap<String, Value>>,
    double: bool,
}

/// An instance of a type
#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

impl Object {
    pub fn new(class: &TypeRef) -> Self {
        Self::create(class, false)
    }

    pub(crate) fn create(class: &TypeRef, double: bool) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                id: next_identity(),
                class: class.clone(),
                singleton: MethodTable::new(),
                fields: RwLock::new(HashMap::new()),
                double,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn class(&self) -> &TypeRef {
        &self.inner.class
    }

    pub fn is_a(&self, ty: &TypeRef) -> bool {
        self.inner.class.is_a(ty)
    }

    /// True for placeholder objects built as doubles
    pub fn is_double(&self) -> bool {
        self.inner.double
    }

    /// Methods defined on this object alone
    pub fn singleton_table(&self) -> &MethodTable {
        &self.inner.singleton
    }

    pub(crate) fn method_chain(&self) -> Vec<MethodTable> {
        let mut chain = vec![self.inner.singleton.clone()];
        chain.extend(self.inner.class.instance_chain());
        chain
    }

    pub fn field(&self, name: &str) -> Value {
        self.inner
            .fields
            .read()
            .get(name)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    pub fn set_field(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner.fields.write().insert(name.into(), value.into());
    }

    /// Append to a list field, creating it when absent
    pub fn push_field(&self, name: &str, value: impl Into<Value>) {
        let mut fields = self.inner.fields.write();
        let slot = fields
            .entry(name.to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        match slot {
            Value::List(items) => items.push(value.into()),
            other => *other = Value::List(vec![value.into()]),
        }
    }

    /// Define a method on this object alone
    pub fn define_singleton_method<F>(
        &self,
        name: &str,
        signature: Signature,
        visibility: Visibility,
        body: F,
    ) where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        let method = Method::new(name, signature, body);
        self.inner
            .singleton
            .define(name, MethodEntry::new(method, visibility));
    }

    /// Visibility of `name` as resolved for this object
    pub fn visibility_of(&self, name: &str) -> Option<Visibility> {
        resolve(&self.method_chain(), name).map(|entry| entry.visibility)
    }

    pub fn responds_to(&self, name: &str) -> bool {
        self.visibility_of(name) == Some(Visibility::Public)
    }

    /// Call a public method
    #[track_caller]
    pub fn call(&self, method: &str, args: impl Into<Args>) -> Result<Value> {
        let call_site = CallSite::here();
        self.dispatch(method, args.into(), None, call_site, Access::Public)
    }

    /// Call a public method with a callback
    #[track_caller]
    pub fn call_with(&self, method: &str, args: impl Into<Args>, callback: Callback) -> Result<Value> {
        let call_site = CallSite::here();
        self.dispatch(method, args.into(), Some(callback), call_site, Access::Public)
    }

    /// Call a method regardless of visibility
    #[track_caller]
    pub fn send(&self, method: &str, args: impl Into<Args>) -> Result<Value> {
        let call_site = CallSite::here();
        self.send_at(method, args.into(), None, call_site)
    }

    /// Call a method regardless of visibility, with a callback
    #[track_caller]
    pub fn send_with(&self, method: &str, args: impl Into<Args>, callback: Callback) -> Result<Value> {
        let call_site = CallSite::here();
        self.send_at(method, args.into(), Some(callback), call_site)
    }

    pub(crate) fn send_at(
        &self,
        method: &str,
        args: Args,
        callback: Option<Callback>,
        call_site: CallSite,
    ) -> Result<Value> {
        self.dispatch(method, args, callback, call_site, Access::Any)
    }

    fn dispatch(
        &self,
        method: &str,
        args: Args,
        callback: Option<Callback>,
        call_site: CallSite,
        access: Access,
    ) -> Result<Value> {
        let invocation = Invocation {
            receiver: Value::Object(self.clone()),
            method: method.to_string(),
            args,
            callback,
            call_site,
        };
        let fallback = self.inner.class.fallback();
        dispatch(&self.method_chain(), &invocation, access, fallback, || {
            self.to_string()
        })
    }

    /// Copy this object's state into a fresh object
    ///
    /// Interception state is never copied: a wrapper in the per-instance
    /// table is replaced by the entry it displaced, or dropped when it
    /// displaced nothing.
    pub fn duplicate(&self) -> Object {
        let copy = Object::create(&self.inner.class, self.inner.double);
        *copy.inner.fields.write() = self.inner.fields.read().clone();

        for (name, entry) in self.inner.singleton.entries() {
            if entry.method.is_wrapper() {
                if let Some(shadowed) = entry.method.shadowed() {
                    copy.inner.singleton.define(name, shadowed.clone());
                }
            } else {
                copy.inner.singleton.define(name, entry);
            }
        }
        copy
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<{}:{}>", self.inner.class.name(), self.inner.id)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// First entry for `name` along `chain`
pub(crate) fn resolve(chain: &[MethodTable], name: &str) -> Option<MethodEntry> {
    chain.iter().find_map(|table| table.get(name))
}

fn dispatch(
    chain: &[MethodTable],
    invocation: &Invocation,
    access: Access,
    fallback: Option<Fallback>,
    describe: impl Fn() -> String,
) -> Result<Value> {
    trace!("Dispatching '{}' at {}", invocation.method, invocation.call_site);

    match resolve(chain, &invocation.method) {
        Some(entry) => {
            if access == Access::Public && entry.visibility != Visibility::Public {
                return Err(EngineError::NotCallable {
                    target: describe(),
                    method: invocation.method.clone(),
                    visibility: entry.visibility,
                });
            }
            // Table locks are released before the body runs, so bodies may
            // re-enter dispatch and redefine methods freely.
            entry.method.call(invocation)
        }
        None => match fallback {
            Some(handler) => handler(invocation),
            None => Err(EngineError::MethodNotFound {
                target: describe(),
                method: invocation.method.clone(),
            }),
        },
    }
}
