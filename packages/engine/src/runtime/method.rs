// packages/engine/src/runtime/method.rs
//! Methods, signatures and per-receiver method tables
//!
//! A [`Method`] is a callable with a declared [`Signature`]. Dispatch checks
//! the caller's argument count against that signature before the body runs,
//! so arity errors surface the same way for real methods, synthetic stubs and
//! interception wrappers.

use crate::interception::arity::ArityRange;
use crate::runtime::next_identity;
use crate::runtime::value::Value;
use crate::utils::errors::{EngineError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Method accessibility level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    /// Probe order used when resolving a method's accessibility
    pub const ALL: [Visibility; 3] = [Visibility::Public, Visibility::Protected, Visibility::Private];
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Protected => write!(f, "protected"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// Kind of a declared parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Required positional
    Required,
    /// Optional positional
    Optional,
    /// Variadic positional
    Rest,
    /// Mandatory keyword
    KeyRequired,
    /// Optional keyword
    KeyOptional,
    /// Unbounded keyword capture
    KeyRest,
    /// Callback parameter
    Block,
}

/// A declared parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub kind: ParamKind,
    pub name: String,
}

/// A method's declared parameter shape
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature accepting any number of positional arguments
    pub fn variadic() -> Self {
        Self::new().rest("args")
    }

    fn with(mut self, kind: ParamKind, name: impl Into<String>) -> Self {
        self.params.push(Param {
            kind,
            name: name.into(),
        });
        self
    }

    pub fn req(self, name: impl Into<String>) -> Self {
        self.with(ParamKind::Required, name)
    }

    pub fn opt(self, name: impl Into<String>) -> Self {
        self.with(ParamKind::Optional, name)
    }

    pub fn rest(self, name: impl Into<String>) -> Self {
        self.with(ParamKind::Rest, name)
    }

    pub fn key(self, name: impl Into<String>) -> Self {
        self.with(ParamKind::KeyRequired, name)
    }

    pub fn key_opt(self, name: impl Into<String>) -> Self {
        self.with(ParamKind::KeyOptional, name)
    }

    pub fn key_rest(self, name: impl Into<String>) -> Self {
        self.with(ParamKind::KeyRest, name)
    }

    pub fn block(self, name: impl Into<String>) -> Self {
        self.with(ParamKind::Block, name)
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Accepted argument-count range
    pub fn arity(&self) -> ArityRange {
        ArityRange::of(self)
    }
}

/// Arguments as supplied by a caller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: BTreeMap<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keyword(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.insert(name.into(), value.into());
        self
    }

    /// Argument count as seen by arity checks
    ///
    /// Keyword arguments occupy a single options slot.
    pub fn len(&self) -> usize {
        self.positional.len() + usize::from(!self.keywords.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Positional argument at `index`, nil when absent
    pub fn get(&self, index: usize) -> Value {
        self.positional.get(index).cloned().unwrap_or(Value::Nil)
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.get(name)
    }
}

impl From<Vec<Value>> for Args {
    fn from(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: BTreeMap::new(),
        }
    }
}

impl<const N: usize> From<[Value; N]> for Args {
    fn from(values: [Value; N]) -> Self {
        Self::from(Vec::from(values))
    }
}

impl From<()> for Args {
    fn from(_: ()) -> Self {
        Self::new()
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for value in &self.positional {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
            first = false;
        }
        for (name, value) in &self.keywords {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
            first = false;
        }
        Ok(())
    }
}

/// Build [`Args`] from a list of expressions convertible into [`Value`]
#[macro_export]
macro_rules! args {
    () => {
        $crate::runtime::Args::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::runtime::Args::from(vec![$($crate::runtime::Value::from($value)),+])
    };
}

type CallbackFn = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;

/// A callback handed to a method by its caller
#[derive(Clone)]
pub struct Callback {
    id: u64,
    f: Arc<CallbackFn>,
}

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            id: next_identity(),
            f: Arc::new(f),
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.f)(args)
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback(#{})", self.id)
    }
}

/// Source location a call was made from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl CallSite {
    /// Location of the caller of the enclosing `#[track_caller]` function
    #[track_caller]
    pub fn here() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }

    pub fn unknown() -> Self {
        Self {
            file: "<unknown>",
            line: 0,
            column: 0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Everything a method body sees about one call
#[derive(Debug, Clone)]
pub struct Invocation {
    pub receiver: Value,
    pub method: String,
    pub args: Args,
    pub callback: Option<Callback>,
    pub call_site: CallSite,
}

impl Invocation {
    /// Positional argument at `index`, nil when absent
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index)
    }

    /// Call the caller's callback with `args`
    pub fn yield_to(&self, args: &[Value]) -> Result<Value> {
        match &self.callback {
            Some(callback) => callback.call(args),
            None => Err(EngineError::MissingCallback),
        }
    }
}

/// Method body
pub type MethodBody = Arc<dyn Fn(&Invocation) -> Result<Value> + Send + Sync>;

/// How a method came to be in a table
#[derive(Clone)]
pub(crate) enum MethodOrigin {
    /// Defined by user code
    Defined,
    /// Placeholder installed by the synthetic instance builder
    Stub,
    /// Recording wrapper, remembering the entry it displaced
    Wrapper { shadowed: Option<MethodEntry> },
}

struct MethodInner {
    id: u64,
    name: String,
    signature: Signature,
    body: MethodBody,
    origin: MethodOrigin,
}

/// A callable method
#[derive(Clone)]
pub struct Method {
    inner: Arc<MethodInner>,
}

impl Method {
    pub fn new<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        Self::with_origin(name, signature, Arc::new(body), MethodOrigin::Defined)
    }

    pub(crate) fn with_origin(
        name: impl Into<String>,
        signature: Signature,
        body: MethodBody,
        origin: MethodOrigin,
    ) -> Self {
        Self {
            inner: Arc::new(MethodInner {
                id: next_identity(),
                name: name.into(),
                signature,
                body,
                origin,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn signature(&self) -> &Signature {
        &self.inner.signature
    }

    /// Run the body after checking the argument count
    pub fn call(&self, invocation: &Invocation) -> Result<Value> {
        self.inner.signature.arity().check(invocation.args.len())?;
        (self.inner.body)(invocation)
    }

    /// Identity comparison
    pub fn same_as(&self, other: &Method) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_stub(&self) -> bool {
        matches!(self.inner.origin, MethodOrigin::Stub)
    }

    pub fn is_wrapper(&self) -> bool {
        matches!(self.inner.origin, MethodOrigin::Wrapper { .. })
    }

    /// Entry a wrapper displaced when it was installed
    pub(crate) fn shadowed(&self) -> Option<&MethodEntry> {
        match &self.inner.origin {
            MethodOrigin::Wrapper { shadowed } => shadowed.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("signature", &self.inner.signature)
            .finish()
    }
}

/// A method together with its visibility in one table
#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub method: Method,
    pub visibility: Visibility,
}

impl MethodEntry {
    pub fn new(method: Method, visibility: Visibility) -> Self {
        Self { method, visibility }
    }

    pub fn public(method: Method) -> Self {
        Self::new(method, Visibility::Public)
    }
}

/// Identity of a method table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(u64);

struct TableInner {
    id: TableId,
    entries: RwLock<HashMap<String, MethodEntry>>,
}

/// Named method entries defined directly at one level
#[derive(Clone)]
pub struct MethodTable {
    inner: Arc<TableInner>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TableInner {
                id: TableId(next_identity()),
                entries: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn id(&self) -> TableId {
        self.inner.id
    }

    pub fn get(&self, name: &str) -> Option<MethodEntry> {
        self.inner.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.entries.read().contains_key(name)
    }

    /// Define or replace `name`
    pub fn define(&self, name: impl Into<String>, entry: MethodEntry) -> Option<MethodEntry> {
        self.inner.entries.write().insert(name.into(), entry)
    }

    pub fn remove(&self, name: &str) -> Option<MethodEntry> {
        self.inner.entries.write().remove(name)
    }

    /// Change the visibility of an existing entry
    pub fn set_visibility(&self, name: &str, visibility: Visibility) -> bool {
        match self.inner.entries.write().get_mut(name) {
            Some(entry) => {
                entry.visibility = visibility;
                true
            }
            None => false,
        }
    }

    /// Names defined here with the given visibility, sorted
    pub fn names(&self, visibility: Visibility) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.visibility == visibility)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub(crate) fn entries(&self) -> Vec<(String, MethodEntry)> {
        self.inner
            .entries
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MethodTable {
    fn default() -> Self {
        Self::new()
    }
}
