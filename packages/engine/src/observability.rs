// packages/engine/src/observability.rs
//! Tracing subscriber setup
//!
//! The engine only emits `tracing` events and `metrics` counters. Installing
//! a subscriber or a metrics recorder is left to the embedding test suite;
//! [`init_tracing`] covers the common case.
//!
//! Counters emitted:
//!
//! - `spy_engine_hooks_total`
//! - `spy_engine_unhooks_total`
//! - `spy_engine_invocations_total`
//! - `spy_engine_dissolves_total`

use crate::utils::config::LoggingConfig;
use crate::utils::errors::{EngineError, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Install a global fmt subscriber
///
/// `RUST_LOG` takes precedence over `config.level`. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            EngineError::ConfigError(format!("invalid log level '{}': {}", config.level, e))
        })?,
    };

    let builder = fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| EngineError::ConfigError(format!("tracing already initialized: {}", e)))
}
