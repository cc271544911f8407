// packages/engine/src/utils/errors.rs
//! Engine error taxonomy
//!
//! Every fallible operation in the engine returns [`Result`]. Errors raised by
//! behavior plans (`Raised`, `Thrown`) travel through the same type so that a
//! plan's failure propagates with `?` like any other error.

use crate::runtime::method::Visibility;
use crate::runtime::value::Value;
use thiserror::Error;

/// Engine result type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine errors
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("{target} method '{method}' has already been hooked")]
    AlreadyHooked { target: String, method: String },

    #[error("'{method}' method has not been hooked")]
    NeverHooked { method: String },

    #[error("{0} is not hooked")]
    NotHooked(String),

    #[error("{method} was not hooked on {target}")]
    NoSpy { target: String, method: String },

    #[error("undefined method '{method}' for {target}")]
    MethodNotFound { target: String, method: String },

    #[error("wrong number of arguments ({given} for {})", expected_arity(.min, .max))]
    Arity {
        given: usize,
        min: usize,
        max: Option<usize>,
    },

    #[error("computed response requires {required} arguments while the original accepts at most {max}")]
    PlanArity { required: usize, max: usize },

    #[error("conflicting responses: {0}")]
    ConflictingPlan(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("'{name}' is already defined in {namespace}")]
    AlreadyDefined { namespace: String, name: String },

    #[error("uninitialized binding {namespace}::{name}")]
    UnboundName { namespace: String, name: String },

    #[error("{visibility} method '{method}' called for {target}")]
    NotCallable {
        target: String,
        method: String,
        visibility: Visibility,
    },

    #[error("no callback given to yield to")]
    MissingCallback,

    #[error("call-through for '{method}' needs an original implementation or a fallback handler")]
    CallThroughUnavailable { method: String },

    #[error("{kind}: {message}")]
    Raised { kind: String, message: String },

    #[error("uncaught throw {tag:?}")]
    Thrown { tag: String, value: Value },

    #[error("export failed: {0}")]
    ExportFailed(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl EngineError {
    /// Construct a raised error of the given kind
    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Raised {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// True for both call-time and plan arity violations
    pub fn is_arity(&self) -> bool {
        matches!(self, EngineError::Arity { .. } | EngineError::PlanArity { .. })
    }

    /// True when this error is a non-local exit carrying `tag`
    pub fn is_throw_of(&self, tag: &str) -> bool {
        matches!(self, EngineError::Thrown { tag: t, .. } if t == tag)
    }
}

fn expected_arity(min: &usize, max: &Option<usize>) -> String {
    match *max {
        Some(max) if max == *min => min.to_string(),
        Some(max) => format!("{}..{}", min, max),
        None => format!("{}+", min),
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(e: config::ConfigError) -> Self {
        EngineError::ConfigError(e.to_string())
    }
}
