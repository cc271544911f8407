// packages/engine/src/utils/config.rs
//! Engine configuration
//!
//! Defaults can be overridden through `SPY_ENGINE_*` environment variables,
//! using `__` to separate sections, e.g.
//! `SPY_ENGINE_RECORDING__CAPTURE_CALL_SITES=false`.

use crate::utils::errors::Result;
use serde::{Deserialize, Serialize};

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Call recording behavior
    #[serde(default)]
    pub recording: RecordingConfig,

    /// Tracing subscriber setup
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Call recording configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Record the caller's source location with every call
    pub capture_call_sites: bool,

    /// Emit a trace event for every intercepted invocation
    pub trace_invocations: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            capture_call_sites: true,
            trace_invocations: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from defaults and the environment
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let settings = config::Config::builder()
            .set_default(
                "recording.capture_call_sites",
                defaults.recording.capture_call_sites,
            )?
            .set_default(
                "recording.trace_invocations",
                defaults.recording.trace_invocations,
            )?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.json", defaults.logging.json)?
            .add_source(
                config::Environment::with_prefix("SPY_ENGINE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Configuration with call-site capture disabled
    pub fn without_call_sites(mut self) -> Self {
        self.recording.capture_call_sites = false;
        self
    }

    /// Configuration that traces every invocation
    pub fn with_invocation_tracing(mut self) -> Self {
        self.recording.trace_invocations = true;
        self
    }
}
