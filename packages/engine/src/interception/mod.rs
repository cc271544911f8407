// packages/engine/src/interception/mod.rs
//! Method interception layer
//!
//! This module replaces methods on live receivers with recording wrappers:
//!
//! - **Method Interceptor**: hook/unhook lifecycle, arity gate, call logging
//! - **Method Slot**: where a wrapper is installed for each target and scope
//! - **Arity**: argument-count ranges derived from signatures
//! - **Plan**: behavior plans and the response builder
//! - **Synthetic**: mock instances and bare doubles
//!
//! # Architecture
//!
//! ```text
//! Code under test (unmodified)
//!     │
//!     └─ obj.call("write", args) → wrapper → Interception::invoke
//!                                               ├─ arity gate (reject, no log)
//!                                               ├─ BehaviorPlan (no locks held)
//!                                               └─ RecordedCall (completion order)
//! ```

pub mod arity;
pub mod method_interceptor;
pub mod method_slot;
pub mod plan;
pub mod synthetic;

// Re-export commonly used types
pub use arity::ArityRange;
pub use method_interceptor::{HookOptions, HookState, Interception, SpyId};
pub use method_slot::{Scope, Target};
pub use plan::{BehaviorPlan, ComputeFn, ErrorSpec, Response};
pub use synthetic::{Double, Mock};
