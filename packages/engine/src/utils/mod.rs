// packages/engine/src/utils/mod.rs
//! Common utilities shared by every engine module
//!
//! - **errors**: the engine error taxonomy and `Result` alias
//! - **config**: engine configuration loaded from defaults and environment

pub mod config;
pub mod errors;

pub use config::{EngineConfig, LoggingConfig, RecordingConfig};
pub use errors::{EngineError, Result};
