// packages/engine/src/recording/mod.rs
//! Call recording
//!
//! - **Call Log**: immutable records of intercepted calls, numbered with a
//!   process-wide sequence taken when each call starts
//! - **Exporter**: export call logs to JSON or text
//!
//! # Ordering
//!
//! ```text
//! outer call starts (#1) ──▶ nested call starts (#2) ──▶ nested ends ──▶ outer ends
//! log: [#1, #2]   each call keeps the position it reserved at start
//! ```

pub mod call_log;
pub mod exporter;

// Re-export commonly used types
pub use call_log::RecordedCall;
pub use exporter::{ExportFormat, Exporter};
