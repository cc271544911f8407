// packages/engine/src/lib.rs
//! Spy Engine Library
//!
//! This library provides the core components for replacing methods and named
//! bindings with recording test doubles, and restoring them afterwards.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **runtime**: Dynamic object model (types, objects, namespaces, dispatch)
//! - **interception**: Method interception, arity gating, behavior plans
//! - **recording**: Call logs and their export
//! - **binding**: Named binding overrides
//! - **registry**: Tracking and bulk teardown of everything hooked
//! - **api**: The `Harness` facade and process-wide free functions
//! - **observability**: Tracing setup
//! - **utils**: Errors and configuration
//!
//! # Example
//!
//! ```
//! use spy_engine::{args, Harness, Object, Signature, TypeRef, Value};
//!
//! let pen = TypeRef::builder("Pen")
//!     .method("write", Signature::new().req("s"), |inv| Ok(inv.arg(0)))
//!     .build();
//! let pen = Object::new(&pen);
//!
//! let harness = Harness::new();
//! let spy = harness.on(&pen, "write").unwrap().and_return("hello");
//!
//! assert!(pen.call("write", args!["a", "b"]).is_err());
//! assert_eq!(pen.call("write", args!["x"]).unwrap(), Value::from("hello"));
//! assert_eq!(spy.call_count(), 1);
//!
//! harness.teardown();
//! assert_eq!(pen.call("write", args!["x"]).unwrap(), Value::from("x"));
//! ```

// Public module exports
pub mod api;
pub mod binding;
pub mod interception;
pub mod observability;
pub mod recording;
pub mod registry;
pub mod runtime;
pub mod utils;

// Re-export commonly used types
pub use api::{
    off, off_binding, off_instance_method, on, on_binding, on_instance_method, teardown, Harness,
};
pub use binding::BindingOverride;
pub use interception::{
    ArityRange, BehaviorPlan, Double, ErrorSpec, HookOptions, HookState, Interception, Mock,
    Response, Scope, SpyId, Target,
};
pub use recording::{ExportFormat, RecordedCall};
pub use registry::{Agent, Registry};
pub use runtime::{
    catch_throw, Args, CallSite, Callback, Invocation, Namespace, Object, Signature, TypeRef,
    Value, Visibility,
};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
