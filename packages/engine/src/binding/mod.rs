// packages/engine/src/binding/mod.rs
//! Named binding overrides
//!
//! Replaces or hides a value bound in a namespace for the duration of a
//! test and restores it afterwards.

pub mod binding_override;

pub use binding_override::BindingOverride;
