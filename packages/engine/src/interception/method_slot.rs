// packages/engine/src/interception/method_slot.rs
//! Install points for recording wrappers
//!
//! A [`MethodSlot`] pairs the one table a wrapper is written into with the
//! resolution chain callers go through, so an interception can probe,
//! capture, install and restore without caring which kind of target it has.
//!
//! | target | scope     | table written         | chain resolved           |
//! |--------|-----------|-----------------------|--------------------------|
//! | object | instance  | per-object table      | object, type, supertypes |
//! | type   | instance  | type-level table      | type-level chain         |
//! | type   | type-wide | instance-method table | instance chain           |
//! | object | type-wide | rejected              |                          |

use crate::runtime::method::{MethodEntry, MethodTable};
use crate::runtime::object::{resolve, Object, TypeRef};
use crate::runtime::value::Value;
use crate::utils::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Receiver whose method is intercepted
#[derive(Debug, Clone)]
pub enum Target {
    Object(Object),
    Type(TypeRef),
}

impl Target {
    pub fn id(&self) -> u64 {
        match self {
            Target::Object(obj) => obj.id(),
            Target::Type(ty) => ty.id(),
        }
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Target::Object(obj) if obj.is_double())
    }

    pub fn as_value(&self) -> Value {
        match self {
            Target::Object(obj) => Value::Object(obj.clone()),
            Target::Type(ty) => Value::Type(ty.clone()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Object(obj) => write!(f, "{}", obj),
            Target::Type(ty) => write!(f, "{}", ty.name()),
        }
    }
}

impl From<&Object> for Target {
    fn from(obj: &Object) -> Self {
        Target::Object(obj.clone())
    }
}

impl From<Object> for Target {
    fn from(obj: Object) -> Self {
        Target::Object(obj)
    }
}

impl From<&TypeRef> for Target {
    fn from(ty: &TypeRef) -> Self {
        Target::Type(ty.clone())
    }
}

impl From<TypeRef> for Target {
    fn from(ty: TypeRef) -> Self {
        Target::Type(ty)
    }
}

impl TryFrom<&Value> for Target {
    type Error = EngineError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Object(obj) => Ok(Target::Object(obj.clone())),
            Value::Type(ty) => Ok(Target::Type(ty.clone())),
            other => Err(EngineError::InvalidTarget(format!(
                "{} ({}) cannot carry methods",
                other,
                other.kind()
            ))),
        }
    }
}

/// Which receivers an interception affects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// One object, or a type's own type-level method
    Instance,
    /// Every instance of a type and of subtypes that do not redefine it
    TypeWide,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Instance => write!(f, "instance"),
            Scope::TypeWide => write!(f, "type-wide"),
        }
    }
}

/// The table a wrapper lives in plus the chain it is resolved through
#[derive(Clone)]
pub(crate) struct MethodSlot {
    table: MethodTable,
    chain: Vec<MethodTable>,
}

impl MethodSlot {
    pub(crate) fn new(target: &Target, scope: Scope) -> Result<Self> {
        match (target, scope) {
            (Target::Object(obj), Scope::Instance) => Ok(Self {
                table: obj.singleton_table().clone(),
                chain: obj.method_chain(),
            }),
            (Target::Type(ty), Scope::Instance) => Ok(Self {
                table: ty.type_table().clone(),
                chain: ty.type_chain(),
            }),
            (Target::Type(ty), Scope::TypeWide) => Ok(Self {
                table: ty.instance_table().clone(),
                chain: ty.instance_chain(),
            }),
            (Target::Object(obj), Scope::TypeWide) => Err(EngineError::InvalidTarget(format!(
                "{} is not a type; type-wide interception needs one",
                obj
            ))),
        }
    }

    /// Entry callers currently reach for `name`
    pub(crate) fn resolve(&self, name: &str) -> Option<MethodEntry> {
        resolve(&self.chain, name)
    }

    /// First entry along the chain that is a real implementation
    ///
    /// Synthetic stubs are skipped so call-through reaches the inherited
    /// method they shadow.
    pub(crate) fn genuine(&self, name: &str) -> Option<MethodEntry> {
        self.chain
            .iter()
            .filter_map(|table| table.get(name))
            .find(|entry| !entry.method.is_stub())
    }

    /// Remove the entry defined directly at this slot
    pub(crate) fn take(&self, name: &str) -> Option<MethodEntry> {
        self.table.remove(name)
    }

    pub(crate) fn install(&self, name: &str, entry: MethodEntry) {
        self.table.define(name, entry);
    }

    /// Remove the entry at this slot only if it is still `expected`
    pub(crate) fn uninstall(&self, name: &str, expected: &MethodEntry) -> bool {
        match self.table.get(name) {
            Some(current) if current.method.same_as(&expected.method) => {
                self.table.remove(name);
                true
            }
            _ => false,
        }
    }
}
