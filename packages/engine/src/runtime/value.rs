// packages/engine/src/runtime/value.rs
//! Dynamically typed values flowing through intercepted calls

use crate::runtime::method::{Args, Callback, CallSite};
use crate::runtime::namespace::Namespace;
use crate::runtime::object::{Object, TypeRef};
use crate::utils::errors::{EngineError, Result};
use std::fmt;

/// A runtime value
///
/// Objects, types and namespaces compare by identity; everything else by
/// structure.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Sym(String),
    List(Vec<Value>),
    Object(Object),
    Type(TypeRef),
    Namespace(Namespace),
}

impl Value {
    /// Build a symbol value
    pub fn sym(name: impl Into<String>) -> Self {
        Value::Sym(name.into())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Name of the value's runtime kind, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Sym(_) => "symbol",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Type(_) => "type",
            Value::Namespace(_) => "namespace",
        }
    }

    /// Send a message to this value, ignoring visibility
    ///
    /// Only objects and types respond to messages.
    #[track_caller]
    pub fn send(&self, method: &str, args: impl Into<Args>) -> Result<Value> {
        let call_site = CallSite::here();
        self.send_at(method, args.into(), None, call_site)
    }

    /// Send a message with a callback attached
    #[track_caller]
    pub fn send_with(
        &self,
        method: &str,
        args: impl Into<Args>,
        callback: Callback,
    ) -> Result<Value> {
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
        match self {
            Value::Object(o) => o.send_at(method, args, callback, call_site),
            Value::Type(t) => t.send_at(method, args, callback, call_site),
            other => Err(EngineError::MethodNotFound {
                target: other.to_string(),
                method: method.to_string(),
            }),
        }
    }

    /// JSON rendering used by call-log exports
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        match self {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::Float(f) => json!(f),
            Value::Str(s) => json!(s),
            Value::Sym(s) => json!({ "symbol": s }),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(o) => json!({ "object": o.id(), "type": o.class().name() }),
            Value::Type(t) => json!({ "type": t.name() }),
            Value::Namespace(ns) => json!({ "namespace": ns.name() }),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Sym(a), Value::Sym(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.id() == b.id(),
            (Value::Type(a), Value::Type(b)) => a.id() == b.id(),
            (Value::Namespace(a), Value::Namespace(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Sym(s) => write!(f, ":{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(o) => write!(f, "{}", o),
            Value::Type(t) => write!(f, "{}", t.name()),
            Value::Namespace(ns) => write!(f, "{}", ns.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<&Object> for Value {
    fn from(o: &Object) -> Self {
        Value::Object(o.clone())
    }
}

impl From<TypeRef> for Value {
    fn from(t: TypeRef) -> Self {
        Value::Type(t)
    }
}

impl From<&TypeRef> for Value {
    fn from(t: &TypeRef) -> Self {
        Value::Type(t.clone())
    }
}

impl From<Namespace> for Value {
    fn from(ns: Namespace) -> Self {
        Value::Namespace(ns)
    }
}

impl From<&Namespace> for Value {
    fn from(ns: &Namespace) -> Self {
        Value::Namespace(ns.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Nil)
    }
}
