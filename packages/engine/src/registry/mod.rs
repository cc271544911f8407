// packages/engine/src/registry/mod.rs
//! Tracking of active test doubles
//!
//! - **Registry**: every hooked interception and binding override, keyed so
//!   that each target has at most one active record
//! - **NamespaceRegistry**: per-namespace view of binding overrides

pub mod agency;
pub mod nest;

// Re-export commonly used types
pub use agency::{Agent, AgentKey, HookKey, Registry};
pub use nest::NamespaceRegistry;
