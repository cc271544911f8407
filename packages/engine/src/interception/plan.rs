// packages/engine/src/interception/plan.rs
//! Behavior plans: how an intercepted call produces its result
//!
//! An interception carries at most one plan. Plans never hold locks while
//! running, so a plan may re-enter the intercepted method.

use crate::interception::arity::ArityRange;
use crate::runtime::method::{Invocation, Method, Signature};
use crate::runtime::value::Value;
use crate::utils::errors::{EngineError, Result};
use std::fmt;
use std::sync::Arc;

/// Computation backing a [`BehaviorPlan::Computed`] plan
pub type ComputeFn = Arc<dyn Fn(&Invocation) -> Result<Value> + Send + Sync>;

/// Error raised by a [`BehaviorPlan::RaiseError`] plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSpec {
    pub kind: String,
    pub message: Option<String>,
}

impl ErrorSpec {
    pub const DEFAULT_KIND: &'static str = "RuntimeError";

    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Default error kind carrying `message`
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(Self::DEFAULT_KIND).with_message(message)
    }

    /// Error value raised when the plan runs; the message defaults to the kind
    pub fn to_error(&self) -> EngineError {
        let message = self.message.clone().unwrap_or_else(|| self.kind.clone());
        EngineError::raised(self.kind.clone(), message)
    }
}

impl Default for ErrorSpec {
    fn default() -> Self {
        Self::new(Self::DEFAULT_KIND)
    }
}

impl From<&str> for ErrorSpec {
    fn from(message: &str) -> Self {
        Self::runtime(message)
    }
}

/// Strategy for producing the result of an intercepted call
#[derive(Clone)]
pub enum BehaviorPlan {
    /// Return a fixed value
    FixedValue(Value),
    /// Return the result of a computation over the invocation
    Computed {
        signature: Signature,
        forced: bool,
        f: ComputeFn,
    },
    /// Call the caller's callback once with these arguments
    YieldToCallback(Vec<Value>),
    /// Delegate to the original implementation
    CallThrough,
    /// Raise an error
    RaiseError(ErrorSpec),
    /// Unwind to the matching `catch_throw`
    NonLocalExit { tag: String, value: Value },
}

impl BehaviorPlan {
    /// Computed plan whose parameters must fit the original's arity
    pub fn computed<F>(signature: Signature, f: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        BehaviorPlan::Computed {
            signature,
            forced: false,
            f: Arc::new(f),
        }
    }

    /// Computed plan exempt from arity checks
    pub fn computed_forced<F>(signature: Signature, f: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        BehaviorPlan::Computed {
            signature,
            forced: true,
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BehaviorPlan::FixedValue(_) => "fixed value",
            BehaviorPlan::Computed { .. } => "computed",
            BehaviorPlan::YieldToCallback(_) => "yield",
            BehaviorPlan::CallThrough => "call-through",
            BehaviorPlan::RaiseError(_) => "raise",
            BehaviorPlan::NonLocalExit { .. } => "throw",
        }
    }

    /// Check a computed plan against the captured arity
    ///
    /// Other plans, forced plans and interceptions without a captured
    /// original always pass.
    pub(crate) fn check_arity(&self, captured: Option<ArityRange>) -> Result<()> {
        match (self, captured) {
            (
                BehaviorPlan::Computed {
                    signature,
                    forced: false,
                    ..
                },
                Some(range),
            ) => range.check_plan(signature),
            _ => Ok(()),
        }
    }

    /// Produce the call's result
    ///
    /// `original` is the implementation captured at hook time.
    pub(crate) fn execute(&self, invocation: &Invocation, original: Option<&Method>) -> Result<Value> {
        match self {
            BehaviorPlan::FixedValue(value) => Ok(value.clone()),
            BehaviorPlan::Computed { f, .. } => f(invocation),
            BehaviorPlan::YieldToCallback(args) => invocation.yield_to(args),
            BehaviorPlan::CallThrough => call_through(invocation, original),
            BehaviorPlan::RaiseError(spec) => Err(spec.to_error()),
            BehaviorPlan::NonLocalExit { tag, value } => Err(EngineError::Thrown {
                tag: tag.clone(),
                value: value.clone(),
            }),
        }
    }
}

/// Run the captured original, else the receiver's fallback handler
///
/// Only instances have a fallback: type-level dispatch never consults one,
/// so a forced type-level hook with no original cannot call through.
fn call_through(invocation: &Invocation, original: Option<&Method>) -> Result<Value> {
    if let Some(method) = original {
        return method.call(invocation);
    }

    let fallback = match &invocation.receiver {
        Value::Object(obj) => obj.class().fallback(),
        _ => None,
    };
    match fallback {
        Some(handler) => handler(invocation),
        None => Err(EngineError::CallThroughUnavailable {
            method: invocation.method.clone(),
        }),
    }
}

impl fmt::Debug for BehaviorPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BehaviorPlan::FixedValue(value) => write!(f, "FixedValue({})", value),
            BehaviorPlan::Computed {
                signature, forced, ..
            } => f
                .debug_struct("Computed")
                .field("arity", &signature.arity())
                .field("forced", forced)
                .finish(),
            BehaviorPlan::YieldToCallback(args) => write!(f, "YieldToCallback({:?})", args),
            BehaviorPlan::CallThrough => write!(f, "CallThrough"),
            BehaviorPlan::RaiseError(spec) => write!(f, "RaiseError({:?})", spec),
            BehaviorPlan::NonLocalExit { tag, value } => {
                write!(f, "NonLocalExit({:?}, {})", tag, value)
            }
        }
    }
}

/// Builder naming a response for an interception
///
/// Exactly one mode may be set; [`Response::into_plan`] rejects anything else.
///
/// ```text
/// Response::new().returning("ok")                  -> FixedValue("ok")
/// Response::new().returning(1).computing(sig, f)   -> ConflictingPlan
/// ```
#[derive(Clone, Default)]
pub struct Response {
    value: Option<Value>,
    compute: Option<(Signature, bool, ComputeFn)>,
    yield_args: Option<Vec<Value>>,
    call_through: bool,
    raise: Option<ErrorSpec>,
    throw: Option<(String, Value)>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn computing<F>(mut self, signature: Signature, f: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        self.compute = Some((signature, false, Arc::new(f)));
        self
    }

    pub fn computing_forced<F>(mut self, signature: Signature, f: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        self.compute = Some((signature, true, Arc::new(f)));
        self
    }

    pub fn yielding(mut self, args: Vec<Value>) -> Self {
        self.yield_args = Some(args);
        self
    }

    pub fn calling_through(mut self) -> Self {
        self.call_through = true;
        self
    }

    pub fn raising(mut self, spec: impl Into<ErrorSpec>) -> Self {
        self.raise = Some(spec.into());
        self
    }

    pub fn throwing(mut self, tag: impl Into<String>, value: impl Into<Value>) -> Self {
        self.throw = Some((tag.into(), value.into()));
        self
    }

    /// Resolve the builder into a single plan
    pub fn into_plan(self) -> Result<BehaviorPlan> {
        let mut plans = Vec::new();

        if let Some(value) = self.value {
            plans.push(BehaviorPlan::FixedValue(value));
        }
        if let Some((signature, forced, f)) = self.compute {
            plans.push(BehaviorPlan::Computed {
                signature,
                forced,
                f,
            });
        }
        if let Some(args) = self.yield_args {
            plans.push(BehaviorPlan::YieldToCallback(args));
        }
        if self.call_through {
            plans.push(BehaviorPlan::CallThrough);
        }
        if let Some(spec) = self.raise {
            plans.push(BehaviorPlan::RaiseError(spec));
        }
        if let Some((tag, value)) = self.throw {
            plans.push(BehaviorPlan::NonLocalExit { tag, value });
        }

        match plans.len() {
            0 => Err(EngineError::ConflictingPlan(
                "no response mode was given".to_string(),
            )),
            1 => Ok(plans.remove(0)),
            _ => {
                let names: Vec<&str> = plans.iter().map(BehaviorPlan::name).collect();
                Err(EngineError::ConflictingPlan(format!(
                    "cannot combine {}",
                    names.join(" with ")
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::runtime::method::{Args, CallSite, Callback};
    use crate::runtime::object::{Object, TypeRef};

    fn invocation(receiver: Value, args: Args, callback: Option<Callback>) -> Invocation {
        Invocation {
            receiver,
            method: "write".to_string(),
            args,
            callback,
            call_site: CallSite::unknown(),
        }
    }

    #[test]
    fn test_fixed_and_computed() {
        let inv = invocation(Value::Nil, args!["x"], None);

        let fixed = BehaviorPlan::FixedValue(Value::from("hello"));
        assert_eq!(fixed.execute(&inv, None).unwrap(), Value::from("hello"));

        let computed = BehaviorPlan::computed(Signature::new().req("s"), |inv| {
            Ok(Value::from(format!("got {}", inv.arg(0))))
        });
        assert_eq!(computed.execute(&inv, None).unwrap(), Value::from("got \"x\""));
    }

    #[test]
    fn test_yield_needs_callback() {
        let plan = BehaviorPlan::YieldToCallback(vec![Value::from(1), Value::from(2)]);

        let bare = invocation(Value::Nil, Args::new(), None);
        assert!(matches!(
            plan.execute(&bare, None).unwrap_err(),
            EngineError::MissingCallback
        ));

        let with_cb = invocation(
            Value::Nil,
            Args::new(),
            Some(Callback::new(|args| Ok(Value::from(args.len() as i64)))),
        );
        assert_eq!(plan.execute(&with_cb, None).unwrap(), Value::from(2));
    }

    #[test]
    fn test_raise_and_throw() {
        let inv = invocation(Value::Nil, Args::new(), None);

        let err = BehaviorPlan::RaiseError(ErrorSpec::default())
            .execute(&inv, None)
            .unwrap_err();
        assert_eq!(err.to_string(), "RuntimeError: RuntimeError");

        let err = BehaviorPlan::RaiseError(ErrorSpec::new("IOError").with_message("disk full"))
            .execute(&inv, None)
            .unwrap_err();
        assert_eq!(err.to_string(), "IOError: disk full");

        let err = BehaviorPlan::NonLocalExit {
            tag: "done".to_string(),
            value: Value::from(7),
        }
        .execute(&inv, None)
        .unwrap_err();
        assert!(err.is_throw_of("done"));
    }

    #[test]
    fn test_call_through_prefers_original_then_fallback() {
        let original = Method::new("write", Signature::new().req("s"), |inv| Ok(inv.arg(0)));
        let ghost = TypeRef::builder("Ghost")
            .fallback(|inv| Ok(Value::from(format!("fallback {}", inv.method))))
            .build();
        let plain = TypeRef::builder("Plain").build();

        let inv = invocation(Value::from(Object::new(&ghost)), args!["x"], None);
        assert_eq!(
            BehaviorPlan::CallThrough.execute(&inv, Some(&original)).unwrap(),
            Value::from("x")
        );
        assert_eq!(
            BehaviorPlan::CallThrough.execute(&inv, None).unwrap(),
            Value::from("fallback write")
        );

        let inv = invocation(Value::from(Object::new(&plain)), args!["x"], None);
        assert!(matches!(
            BehaviorPlan::CallThrough.execute(&inv, None).unwrap_err(),
            EngineError::CallThroughUnavailable { .. }
        ));
    }

    #[test]
    fn test_plan_arity_check() {
        let captured = Some(ArityRange::new(1, Some(1)));
        let wide = BehaviorPlan::computed(Signature::new().req("a").req("b"), |_| Ok(Value::Nil));
        assert!(wide.check_arity(captured).is_err());
        assert!(wide.check_arity(None).is_ok());

        let forced =
            BehaviorPlan::computed_forced(Signature::new().req("a").req("b"), |_| Ok(Value::Nil));
        assert!(forced.check_arity(captured).is_ok());

        assert!(BehaviorPlan::CallThrough.check_arity(captured).is_ok());
    }

    #[test]
    fn test_response_builder() {
        let plan = Response::new().returning("ok").into_plan().unwrap();
        assert!(matches!(plan, BehaviorPlan::FixedValue(_)));

        let err = Response::new()
            .returning(1)
            .computing(Signature::new(), |_| Ok(Value::Nil))
            .into_plan()
            .unwrap_err();
        assert!(matches!(err, EngineError::ConflictingPlan(_)));
        assert!(err.to_string().contains("fixed value with computed"));

        assert!(Response::new().into_plan().is_err());
        assert!(matches!(
            Response::new().calling_through().into_plan().unwrap(),
            BehaviorPlan::CallThrough
        ));
    }
}
