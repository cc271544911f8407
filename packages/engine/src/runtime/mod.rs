// packages/engine/src/runtime/mod.rs
//! Dynamic object model targeted by the interception engine
//!
//! This module provides the receivers that test doubles are installed on:
//!
//! - **Value**: dynamically typed values passed to and returned from calls
//! - **Method**: callables with declared signatures and per-level tables
//! - **Object / TypeRef**: receivers with instance, per-object and type-level
//!   method tables
//! - **Namespace**: containers of named bindings
//!
//! # Architecture
//!
//! ```text
//! caller ──call/send──▶ Object ──resolve──▶ MethodTable chain ──▶ Method
//!                                                  ▲
//!                            interception installs │ wrappers here
//! ```

pub mod method;
pub mod namespace;
pub mod object;
pub mod value;

use crate::utils::errors::{EngineError, Result};
use std::sync::atomic::{AtomicU64, Ordering};

// Re-export commonly used types
pub use method::{
    Args, CallSite, Callback, Invocation, Method, MethodEntry, MethodTable, Param, ParamKind,
    Signature, TableId, Visibility,
};
pub use namespace::Namespace;
pub use object::{Fallback, Object, TypeBuilder, TypeRef};
pub use value::Value;

static IDENTITY: AtomicU64 = AtomicU64::new(1);

/// Process-wide identity shared by objects, types, namespaces and tables
pub(crate) fn next_identity() -> u64 {
    IDENTITY.fetch_add(1, Ordering::Relaxed)
}

/// Run `body`, catching a non-local exit tagged `tag`
///
/// The thrown value becomes the result. Exits with other tags and ordinary
/// errors propagate unchanged.
pub fn catch_throw<F>(tag: &str, body: F) -> Result<Value>
where
    F: FnOnce() -> Result<Value>,
{
    match body() {
        Err(EngineError::Thrown { tag: thrown, value }) if thrown == tag => Ok(value),
        other => other,
    }
}
