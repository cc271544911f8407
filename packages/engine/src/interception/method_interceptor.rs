// packages/engine/src/interception/method_interceptor.rs
//! Method interception records
//!
//! An [`Interception`] replaces one named method on one target with a
//! recording wrapper. Every call that passes the arity gate is appended to
//! the call log, then answered by the attached [`BehaviorPlan`].
//!
//! # Lifecycle
//!
//! ```text
//!             hook()                      unhook() / Registry::dissolve()
//! Unhooked ───────────▶ Hooked ─────────────────────────────▶ Unhooked
//!                         │
//!                         └─ wrapper ──▶ invoke() ──▶ arity gate ──▶ plan ──▶ log
//! ```
//!
//! The wrapper holds only a weak reference to its record, so a record that
//! is dropped while hooked leaves behind a wrapper that reports the method
//! as never hooked instead of keeping the record alive.

use crate::interception::arity::ArityRange;
use crate::interception::method_slot::{MethodSlot, Scope, Target};
use crate::interception::plan::{BehaviorPlan, ErrorSpec, Response};
use crate::recording::call_log::{next_sequence, RecordedCall};
use crate::recording::exporter::{ExportFormat, Exporter};
use crate::registry::agency::{Agent, AgentKey, HookKey, Registry};
use crate::runtime::method::{
    Args, CallSite, Invocation, Method, MethodBody, MethodEntry, MethodOrigin, Signature,
    Visibility,
};
use crate::runtime::value::Value;
use crate::utils::errors::{EngineError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};
use ulid::Ulid;

/// Identity of an interception or binding override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpyId(Ulid);

impl SpyId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SpyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Options accepted by [`Interception::hook`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookOptions {
    /// Hook even when the method does not exist
    pub force: bool,

    /// Visibility for the wrapper instead of the original's
    pub visibility: Option<Visibility>,
}

impl HookOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }
}

/// Whether a record's wrapper is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookState {
    Unhooked,
    Hooked,
}

/// What a hook captured, kept until the matching unhook
struct Captured {
    slot: MethodSlot,
    original: Option<Method>,
    visibility: Option<Visibility>,
    arity: Option<ArityRange>,
    /// Entry defined directly at the slot before hooking
    restore: Option<MethodEntry>,
    wrapper: MethodEntry,
}

struct InterceptionState {
    hook: HookState,
    was_hooked: bool,
    options: HookOptions,
    plan: Option<BehaviorPlan>,
    captured: Option<Captured>,
}

struct InterceptionInner {
    id: SpyId,
    target: Target,
    method: String,
    scope: Scope,
    registry: Registry,
    state: Mutex<InterceptionState>,
    calls: Mutex<Vec<RecordedCall>>,
}

/// Interception of one method on one target
#[derive(Clone)]
pub struct Interception {
    inner: Arc<InterceptionInner>,
}

impl Interception {
    /// Create an unhooked record tracked by `registry` once hooked
    pub fn new(
        registry: &Registry,
        target: impl Into<Target>,
        method: impl Into<String>,
        scope: Scope,
    ) -> Self {
        Self {
            inner: Arc::new(InterceptionInner {
                id: SpyId::new(),
                target: target.into(),
                method: method.into(),
                scope,
                registry: registry.clone(),
                state: Mutex::new(InterceptionState {
                    hook: HookState::Unhooked,
                    was_hooked: false,
                    options: HookOptions::default(),
                    plan: None,
                    captured: None,
                }),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> SpyId {
        self.inner.id
    }

    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    pub fn method(&self) -> &str {
        &self.inner.method
    }

    pub fn scope(&self) -> Scope {
        self.inner.scope
    }

    pub fn key(&self) -> HookKey {
        HookKey::new(&self.inner.target, &self.inner.method, self.inner.scope)
    }

    /// Install the recording wrapper
    pub fn hook(&self, options: HookOptions) -> Result<Self> {
        let inner = &self.inner;
        let mut state = inner.state.lock();

        let claimed = Registry::is_claimed(&AgentKey::Method(self.key()));
        if state.hook == HookState::Hooked || claimed {
            return Err(EngineError::AlreadyHooked {
                target: inner.target.to_string(),
                method: inner.method.clone(),
            });
        }

        let slot = MethodSlot::new(&inner.target, inner.scope)?;
        let force = options.force || inner.target.is_double();
        let resolved = slot.resolve(&inner.method);
        if resolved.is_none() && !force {
            return Err(EngineError::MethodNotFound {
                target: inner.target.to_string(),
                method: inner.method.clone(),
            });
        }

        let visibility = resolved.as_ref().map(|entry| entry.visibility);
        let arity = resolved
            .as_ref()
            .map(|entry| entry.method.signature().arity());
        let original = match &resolved {
            Some(entry) if entry.method.is_stub() => {
                slot.genuine(&inner.method).map(|genuine| genuine.method)
            }
            Some(entry) => Some(entry.method.clone()),
            None => None,
        };
        let signature = resolved
            .as_ref()
            .map(|entry| entry.method.signature().clone())
            .unwrap_or_else(Signature::variadic);

        let restore = slot.take(&inner.method);
        let wrapper = MethodEntry::new(
            Method::with_origin(
                inner.method.clone(),
                signature,
                self.wrapper_body(),
                MethodOrigin::Wrapper {
                    shadowed: restore.clone(),
                },
            ),
            options
                .visibility
                .or(visibility)
                .unwrap_or(Visibility::Public),
        );
        slot.install(&inner.method, wrapper.clone());

        if let Err(e) = inner.registry.recruit(Agent::Interception(self.clone())) {
            slot.uninstall(&inner.method, &wrapper);
            if let Some(entry) = restore {
                slot.install(&inner.method, entry);
            }
            return Err(e);
        }

        debug!(
            "Hooked {} '{}' ({} scope, arity {})",
            inner.target,
            inner.method,
            inner.scope,
            arity.map_or_else(|| "unchecked".to_string(), |a| a.to_string())
        );
        metrics::counter!("spy_engine_hooks_total").increment(1);

        state.captured = Some(Captured {
            slot,
            original,
            visibility,
            arity,
            restore,
            wrapper,
        });
        state.options = options;
        state.hook = HookState::Hooked;
        state.was_hooked = true;

        Ok(self.clone())
    }

    fn wrapper_body(&self) -> MethodBody {
        let record = Arc::downgrade(&self.inner);
        Arc::new(move |invocation: &Invocation| match record.upgrade() {
            Some(inner) => Interception { inner }.invoke(invocation),
            None => Err(EngineError::NeverHooked {
                method: invocation.method.clone(),
            }),
        })
    }

    /// Remove the wrapper and retire from the registry
    pub fn unhook(&self) -> Result<()> {
        self.restore_detached()?;
        self.inner
            .registry
            .retire(&Agent::Interception(self.clone()))
    }

    /// Restore the slot without touching the registry
    pub(crate) fn restore_detached(&self) -> Result<()> {
        let inner = &self.inner;
        let mut state = inner.state.lock();

        let captured = match (state.hook, state.captured.take()) {
            (HookState::Hooked, Some(captured)) => captured,
            _ => {
                return Err(EngineError::NeverHooked {
                    method: inner.method.clone(),
                })
            }
        };

        let slot = &captured.slot;
        let removed = slot.uninstall(&inner.method, &captured.wrapper);
        if let Some(entry) = captured.restore {
            if removed || slot.resolve(&inner.method).is_none() {
                slot.install(&inner.method, entry);
            }
        }

        state.hook = HookState::Unhooked;
        debug!("Unhooked {} '{}'", inner.target, inner.method);
        metrics::counter!("spy_engine_unhooks_total").increment(1);
        Ok(())
    }

    /// Gate, run and record one call arriving through the wrapper
    pub fn invoke(&self, invocation: &Invocation) -> Result<Value> {
        let (arity, plan, original) = {
            let state = self.inner.state.lock();
            match &state.captured {
                Some(captured) => (
                    captured.arity,
                    state.plan.clone(),
                    captured.original.clone(),
                ),
                None => (None, state.plan.clone(), None),
            }
        };

        if let Some(range) = arity {
            range.check(invocation.args.len())?;
        }

        let sequence = next_sequence();
        let recording = self.inner.registry.config().recording.clone();
        if recording.trace_invocations {
            debug!(
                "Invoking '{}' #{} on {} with ({})",
                self.inner.method, sequence, invocation.receiver, invocation.args
            );
        } else {
            trace!("Invoking '{}' #{}", self.inner.method, sequence);
        }

        let outcome = match &plan {
            Some(plan) => plan
                .check_arity(arity)
                .and_then(|_| plan.execute(invocation, original.as_ref())),
            None => Ok(Value::Nil),
        };

        let result = match (&plan, &outcome) {
            (Some(_), Ok(value)) => Some(value.clone()),
            _ => None,
        };
        let call_site = if recording.capture_call_sites {
            invocation.call_site
        } else {
            CallSite::unknown()
        };
        let call = RecordedCall::new(
            sequence,
            invocation.receiver.clone(),
            call_site,
            invocation.args.clone(),
            invocation.callback.clone(),
            result,
        );

        // Appended once the plan has finished, so nested calls precede the
        // call that made them.
        self.inner.calls.lock().push(call);
        metrics::counter!("spy_engine_invocations_total").increment(1);

        outcome
    }

    fn set_plan(&self, plan: BehaviorPlan) -> Result<Self> {
        let mut state = self.inner.state.lock();
        let arity = state.captured.as_ref().and_then(|c| c.arity);
        plan.check_arity(arity)?;
        debug!("'{}' now responds with {:?}", self.inner.method, plan);
        state.plan = Some(plan);
        Ok(self.clone())
    }

    /// Answer every call with `value`
    pub fn and_return(&self, value: impl Into<Value>) -> Self {
        self.replace_plan(BehaviorPlan::FixedValue(value.into()))
    }

    /// Answer with a computation whose parameters fit the original's arity
    pub fn and_compute<F>(&self, signature: Signature, f: F) -> Result<Self>
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        self.set_plan(BehaviorPlan::computed(signature, f))
    }

    /// Answer with a computation, skipping arity checks
    pub fn and_compute_forced<F>(&self, signature: Signature, f: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        self.replace_plan(BehaviorPlan::computed_forced(signature, f))
    }

    /// Call the caller's callback with `args`
    pub fn and_yield(&self, args: Vec<Value>) -> Self {
        self.replace_plan(BehaviorPlan::YieldToCallback(args))
    }

    pub fn and_call_through(&self) -> Self {
        self.replace_plan(BehaviorPlan::CallThrough)
    }

    pub fn and_raise(&self, spec: impl Into<ErrorSpec>) -> Self {
        self.replace_plan(BehaviorPlan::RaiseError(spec.into()))
    }

    pub fn and_throw(&self, tag: impl Into<String>, value: impl Into<Value>) -> Self {
        self.replace_plan(BehaviorPlan::NonLocalExit {
            tag: tag.into(),
            value: value.into(),
        })
    }

    /// Attach the single plan a [`Response`] names
    pub fn respond(&self, response: Response) -> Result<Self> {
        self.set_plan(response.into_plan()?)
    }

    // Plans that never fail their arity check
    fn replace_plan(&self, plan: BehaviorPlan) -> Self {
        let mut state = self.inner.state.lock();
        debug!("'{}' now responds with {:?}", self.inner.method, plan);
        state.plan = Some(plan);
        self.clone()
    }

    pub fn plan(&self) -> Option<BehaviorPlan> {
        self.inner.state.lock().plan.clone()
    }

    /// Snapshot of the call log, in completion order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().len()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.inner.calls.lock().last().cloned()
    }

    /// Whether any call was recorded; fails if never hooked
    pub fn was_called(&self) -> Result<bool> {
        self.ensure_was_hooked()?;
        Ok(self.call_count() > 0)
    }

    /// Whether a call with exactly `args` was recorded; fails if never hooked
    pub fn was_called_with(&self, args: impl Into<Args>) -> Result<bool> {
        self.ensure_was_hooked()?;
        let args = args.into();
        Ok(self.inner.calls.lock().iter().any(|call| call.args() == &args))
    }

    fn ensure_was_hooked(&self) -> Result<()> {
        if self.inner.state.lock().was_hooked {
            Ok(())
        } else {
            Err(EngineError::NeverHooked {
                method: self.inner.method.clone(),
            })
        }
    }

    /// Clear the call log; hook state and plan are unchanged
    pub fn reset(&self) {
        self.inner.calls.lock().clear();
    }

    pub fn is_hooked(&self) -> bool {
        self.state() == HookState::Hooked
    }

    pub fn state(&self) -> HookState {
        self.inner.state.lock().hook
    }

    /// Visibility of the original captured at hook time
    pub fn original_visibility(&self) -> Option<Visibility> {
        self.inner
            .state
            .lock()
            .captured
            .as_ref()
            .and_then(|c| c.visibility)
    }

    /// Arity range captured at hook time
    pub fn arity(&self) -> Option<ArityRange> {
        self.inner
            .state
            .lock()
            .captured
            .as_ref()
            .and_then(|c| c.arity)
    }

    pub fn hook_options(&self) -> HookOptions {
        self.inner.state.lock().options
    }

    /// Render the call log
    pub fn export_calls(&self, format: ExportFormat) -> Result<String> {
        Exporter::new(format).export(&self.inner.method, &self.calls())
    }
}

impl PartialEq for Interception {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl fmt::Debug for Interception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interception")
            .field("id", &self.inner.id)
            .field("target", &self.inner.target.to_string())
            .field("method", &self.inner.method)
            .field("scope", &self.inner.scope)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::runtime::catch_throw;
    use crate::runtime::method::Callback;
    use crate::runtime::object::{Object, TypeRef};

    fn pen_type() -> TypeRef {
        TypeRef::builder("Pen")
            .method("write", Signature::new().req("s"), |inv| Ok(inv.arg(0)))
            .method(
                "greet",
                Signature::new().opt("hello").req("name"),
                |inv| Ok(Value::from(format!("{} {}", inv.arg(0), inv.arg(1)))),
            )
            .protected_method("refill", Signature::new(), |_| Ok(Value::from("full")))
            .private_method("ink", Signature::new(), |_| Ok(Value::from("blue")))
            .build()
    }

    #[test]
    fn test_pen_scenario() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());

        let spy = Interception::new(&registry, &pen, "write", Scope::Instance)
            .hook(HookOptions::default())
            .unwrap();

        let err = pen.call("write", args!["a", "b"]).unwrap_err();
        assert!(matches!(err, EngineError::Arity { given: 2, min: 1, max: Some(1) }));
        assert_eq!(spy.call_count(), 0);

        spy.and_return("hello");
        assert_eq!(pen.call("write", args!["x"]).unwrap(), Value::from("hello"));
        assert_eq!(spy.call_count(), 1);
        assert_eq!(spy.last_call().unwrap().args(), &args!["x"]);

        spy.unhook().unwrap();
        assert_eq!(pen.call("write", args!["x"]).unwrap(), Value::from("x"));
        assert_eq!(spy.call_count(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unplanned_calls_return_nil_and_log_no_result() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());
        let spy = Interception::new(&registry, &pen, "write", Scope::Instance)
            .hook(HookOptions::default())
            .unwrap();

        assert_eq!(pen.call("write", args!["x"]).unwrap(), Value::Nil);
        assert!(spy.last_call().unwrap().result().is_none());
        assert!(spy.was_called_with(args!["x"]).unwrap());
        assert!(!spy.was_called_with(args!["y"]).unwrap());
    }

    #[test]
    fn test_double_hook_and_unhook_fail() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());
        let spy = Interception::new(&registry, &pen, "write", Scope::Instance)
            .hook(HookOptions::default())
            .unwrap();

        assert!(matches!(
            spy.hook(HookOptions::default()).unwrap_err(),
            EngineError::AlreadyHooked { .. }
        ));
        let twin = Interception::new(&registry, &pen, "write", Scope::Instance);
        assert!(matches!(
            twin.hook(HookOptions::default()).unwrap_err(),
            EngineError::AlreadyHooked { .. }
        ));

        spy.unhook().unwrap();
        assert!(matches!(
            spy.unhook().unwrap_err(),
            EngineError::NeverHooked { .. }
        ));
    }

    #[test]
    fn test_missing_method_requires_force() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());

        let spy = Interception::new(&registry, &pen, "erase", Scope::Instance);
        assert!(matches!(
            spy.hook(HookOptions::default()).unwrap_err(),
            EngineError::MethodNotFound { .. }
        ));

        spy.hook(HookOptions::forced()).unwrap();
        spy.and_return(true);
        assert_eq!(pen.call("erase", args![1, 2, 3]).unwrap(), Value::from(true));
        assert!(spy.arity().is_none());

        spy.unhook().unwrap();
        assert!(matches!(
            pen.call("erase", ()).unwrap_err(),
            EngineError::MethodNotFound { .. }
        ));
    }

    #[test]
    fn test_was_called_requires_prior_hook() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());
        let spy = Interception::new(&registry, &pen, "write", Scope::Instance);

        assert!(matches!(
            spy.was_called().unwrap_err(),
            EngineError::NeverHooked { .. }
        ));

        spy.hook(HookOptions::default()).unwrap();
        assert!(!spy.was_called().unwrap());
        spy.unhook().unwrap();
        assert!(!spy.was_called().unwrap());
    }

    #[test]
    fn test_visibility_is_mirrored() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());

        for (method, visibility) in [
            ("write", Visibility::Public),
            ("refill", Visibility::Protected),
            ("ink", Visibility::Private),
        ] {
            let spy = Interception::new(&registry, &pen, method, Scope::Instance)
                .hook(HookOptions::default())
                .unwrap();
            assert_eq!(spy.original_visibility(), Some(visibility));
            assert_eq!(pen.visibility_of(method), Some(visibility));
        }

        assert!(matches!(
            pen.call("ink", ()).unwrap_err(),
            EngineError::NotCallable { .. }
        ));
        assert_eq!(pen.send("ink", ()).unwrap(), Value::Nil);

        registry.dissolve();
        assert_eq!(pen.send("ink", ()).unwrap(), Value::from("blue"));
    }

    #[test]
    fn test_visibility_override() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());
        Interception::new(&registry, &pen, "ink", Scope::Instance)
            .hook(HookOptions::default().with_visibility(Visibility::Public))
            .unwrap()
            .and_return("red");

        assert_eq!(pen.call("ink", ()).unwrap(), Value::from("red"));
    }

    #[test]
    fn test_computed_plan_arity() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());
        let spy = Interception::new(&registry, &pen, "write", Scope::Instance)
            .hook(HookOptions::default())
            .unwrap();

        let err = spy
            .and_compute(Signature::new().req("a").req("b"), |_| Ok(Value::Nil))
            .unwrap_err();
        assert!(matches!(err, EngineError::PlanArity { required: 2, max: 1 }));

        spy.and_compute(Signature::new().req("s"), |inv| {
            Ok(Value::from(format!("<{}>", inv.arg(0).as_str().unwrap_or(""))))
        })
        .unwrap();
        assert_eq!(pen.call("write", args!["x"]).unwrap(), Value::from("<x>"));

        spy.and_compute_forced(Signature::new().req("a").req("b"), |_| Ok(Value::from(2)));
        assert_eq!(pen.call("write", args!["x"]).unwrap(), Value::from(2));
    }

    #[test]
    fn test_call_through_reaches_original() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());
        let spy = Interception::new(&registry, &pen, "greet", Scope::Instance)
            .hook(HookOptions::default())
            .unwrap()
            .and_call_through();

        assert_eq!(
            pen.call("greet", args!["hi", "bob"]).unwrap(),
            Value::from("\"hi\" \"bob\"")
        );
        assert_eq!(spy.last_call().unwrap().result(), Some(&Value::from("\"hi\" \"bob\"")));
        assert_eq!(spy.arity(), Some(ArityRange::new(1, Some(2))));
    }

    #[test]
    fn test_forced_call_through_uses_instance_fallback_only() {
        let registry = Registry::new();
        let ty = TypeRef::builder("Ghost")
            .fallback(|inv| Ok(Value::from(format!("missing {}", inv.method))))
            .build();
        let ghost = Object::new(&ty);

        Interception::new(&registry, &ghost, "boo", Scope::Instance)
            .hook(HookOptions::forced())
            .unwrap()
            .and_call_through();
        assert_eq!(ghost.call("boo", ()).unwrap(), Value::from("missing boo"));

        let spy = Interception::new(&registry, &ty, "boo", Scope::Instance)
            .hook(HookOptions::forced())
            .unwrap()
            .and_call_through();
        assert!(matches!(
            ty.call("boo", ()).unwrap_err(),
            EngineError::CallThroughUnavailable { .. }
        ));
        assert_eq!(spy.call_count(), 1);
    }

    #[test]
    fn test_failed_plan_is_logged_then_raised() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());
        let spy = Interception::new(&registry, &pen, "write", Scope::Instance)
            .hook(HookOptions::default())
            .unwrap()
            .and_raise(ErrorSpec::new("IOError").with_message("jammed"));

        let err = pen.call("write", args!["x"]).unwrap_err();
        assert_eq!(err.to_string(), "IOError: jammed");
        assert_eq!(spy.call_count(), 1);
        assert!(spy.last_call().unwrap().result().is_none());
    }

    #[test]
    fn test_throw_unwinds_to_catch() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());
        Interception::new(&registry, &pen, "write", Scope::Instance)
            .hook(HookOptions::default())
            .unwrap()
            .and_throw("done", 42);

        let caught = catch_throw("done", || pen.call("write", args!["x"])).unwrap();
        assert_eq!(caught, Value::from(42));
    }

    #[test]
    fn test_yield_to_callback() {
        let registry = Registry::new();
        let ty = TypeRef::builder("Iter")
            .method("each", Signature::new().block("blk"), |inv| {
                inv.yield_to(&[Value::from(0)])
            })
            .build();
        let obj = Object::new(&ty);
        let spy = Interception::new(&registry, &obj, "each", Scope::Instance)
            .hook(HookOptions::default())
            .unwrap()
            .and_yield(vec![Value::from(1), Value::from(2)]);

        let cb = Callback::new(|args| Ok(Value::from(args.len() as i64 * 10)));
        assert_eq!(obj.call_with("each", (), cb.clone()).unwrap(), Value::from(20));
        assert_eq!(spy.last_call().unwrap().callback(), Some(&cb));

        assert!(matches!(
            obj.call("each", ()).unwrap_err(),
            EngineError::MissingCallback
        ));
    }

    #[test]
    fn test_reentrant_calls_log_in_completion_order() {
        let registry = Registry::new();
        let ty = TypeRef::builder("Counter")
            .method("count", Signature::new().req("n"), |_| Ok(Value::Nil))
            .build();
        let obj = Object::new(&ty);
        let spy = Interception::new(&registry, &obj, "count", Scope::Instance)
            .hook(HookOptions::default())
            .unwrap();

        spy.and_compute(Signature::new().req("n"), |inv| {
            let n = inv.arg(0).as_int().unwrap_or(0);
            if n > 0 {
                inv.receiver.send("count", args![n - 1])?;
            }
            Ok(Value::from(n))
        })
        .unwrap();

        assert_eq!(obj.call("count", args![3]).unwrap(), Value::from(3));

        let logged: Vec<Value> = spy.calls().iter().map(|c| c.args().get(0)).collect();
        assert_eq!(
            logged,
            vec![Value::from(0), Value::from(1), Value::from(2), Value::from(3)]
        );
        // Sequence numbers still reflect start order.
        let sequences: Vec<u64> = spy.calls().iter().map(|c| c.sequence()).collect();
        assert!(sequences.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_type_wide_scope() {
        let registry = Registry::new();
        let pen = pen_type();
        let marker = TypeRef::builder("Marker").superclass(&pen).build();
        let quill = TypeRef::builder("Quill")
            .superclass(&pen)
            .method("write", Signature::new().req("s"), |_| Ok(Value::from("scratch")))
            .build();

        let spy = Interception::new(&registry, &pen, "write", Scope::TypeWide)
            .hook(HookOptions::default())
            .unwrap()
            .and_return("stubbed");

        assert_eq!(
            Object::new(&pen).call("write", args!["x"]).unwrap(),
            Value::from("stubbed")
        );
        assert_eq!(
            Object::new(&marker).call("write", args!["x"]).unwrap(),
            Value::from("stubbed")
        );
        assert_eq!(
            Object::new(&quill).call("write", args!["x"]).unwrap(),
            Value::from("scratch")
        );
        assert_eq!(spy.call_count(), 2);

        spy.unhook().unwrap();
        assert_eq!(
            Object::new(&marker).call("write", args!["x"]).unwrap(),
            Value::from("x")
        );
    }

    #[test]
    fn test_type_level_instance_scope() {
        let registry = Registry::new();
        let ty = TypeRef::builder("Factory")
            .type_method("build", Signature::new(), |_| Ok(Value::from("real")))
            .build();

        let spy = Interception::new(&registry, &ty, "build", Scope::Instance)
            .hook(HookOptions::default())
            .unwrap()
            .and_return("fake");
        assert_eq!(ty.call("build", ()).unwrap(), Value::from("fake"));

        spy.unhook().unwrap();
        assert_eq!(ty.call("build", ()).unwrap(), Value::from("real"));
    }

    #[test]
    fn test_plan_survives_rehook_and_reset_keeps_hook() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());
        let spy = Interception::new(&registry, &pen, "write", Scope::Instance)
            .hook(HookOptions::default())
            .unwrap()
            .and_return("hello");
        pen.call("write", args!["x"]).unwrap();

        spy.reset();
        assert_eq!(spy.call_count(), 0);
        assert!(spy.is_hooked());

        spy.unhook().unwrap();
        spy.hook(HookOptions::default()).unwrap();
        assert_eq!(pen.call("write", args!["x"]).unwrap(), Value::from("hello"));
    }

    #[test]
    fn test_registry_keeps_unreferenced_record_alive() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());
        Interception::new(&registry, &pen, "write", Scope::Instance)
            .hook(HookOptions::default())
            .unwrap();

        assert_eq!(pen.call("write", args!["x"]).unwrap(), Value::Nil);
        registry.dissolve();
        assert_eq!(pen.call("write", args!["x"]).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_export_calls() {
        let registry = Registry::new();
        let pen = Object::new(&pen_type());
        let spy = Interception::new(&registry, &pen, "write", Scope::Instance)
            .hook(HookOptions::default())
            .unwrap()
            .and_return("ok");
        pen.call("write", args!["x"]).unwrap();

        let text = spy.export_calls(ExportFormat::Text).unwrap();
        assert!(text.contains("write(\"x\") -> \"ok\""));
        assert!(text.contains("method_interceptor.rs"));
    }
}
