// packages/engine/src/registry/agency.rs
//! Registry of active interceptions and binding overrides
//!
//! Every hooked record is recruited here and retired when unhooked. A key
//! has at most one active record across every registry in the process, so
//! two harnesses can never stack wrappers on the same slot or stash each
//! other's overrides. Each registry dissolves only what it tracks.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────── Registry ─────────────┐
//! hook() ──recruit──▶ agents: SpyId ──▶ (seq, Agent)  │
//!                 │   keys:   AgentKey ──▶ SpyId      │
//!                 └──────┬───────┬────────────────────┘
//!                        │       │
//!     CLAIMS (process) ◀─┘       │   AgentKey ──▶ SpyId, one per key
//!     NESTS  (process)           │   namespace ──▶ NamespaceRegistry
//!                                │ dissolve(): newest first
//!                                ▼
//!                    restore every method slot and binding
//! ```

use crate::binding::binding_override::BindingOverride;
use crate::interception::method_interceptor::{Interception, SpyId};
use crate::interception::method_slot::{Scope, Target};
use crate::registry::nest::NamespaceRegistry;
use crate::runtime::namespace::Namespace;
use crate::utils::config::EngineConfig;
use crate::utils::errors::{EngineError, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identity of an interception: (target, method name, scope)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookKey {
    pub target: u64,
    pub method: String,
    pub scope: Scope,
}

impl HookKey {
    pub fn new(target: &Target, method: &str, scope: Scope) -> Self {
        Self {
            target: target.id(),
            method: method.to_string(),
            scope,
        }
    }
}

/// Key under which at most one agent may be active
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AgentKey {
    Method(HookKey),
    Binding { namespace: u64, name: String },
}

/// Anything the registry can track and restore
#[derive(Clone, Debug)]
pub enum Agent {
    Interception(Interception),
    Binding(BindingOverride),
}

impl Agent {
    pub fn id(&self) -> SpyId {
        match self {
            Agent::Interception(spy) => spy.id(),
            Agent::Binding(binding) => binding.id(),
        }
    }

    pub fn key(&self) -> AgentKey {
        match self {
            Agent::Interception(spy) => AgentKey::Method(spy.key()),
            Agent::Binding(binding) => AgentKey::Binding {
                namespace: binding.namespace().id(),
                name: binding.name().to_string(),
            },
        }
    }

    fn restore_detached(&self) -> Result<()> {
        match self {
            Agent::Interception(spy) => spy.restore_detached(),
            Agent::Binding(binding) => binding.restore_detached(),
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Agent::Interception(spy) => write!(f, "{} '{}'", spy.target(), spy.method()),
            Agent::Binding(binding) => {
                write!(f, "{}::{}", binding.namespace().name(), binding.name())
            }
        }
    }
}

struct Enlisted {
    seq: u64,
    agent: Agent,
}

#[derive(Default)]
struct RegistryState {
    agents: HashMap<SpyId, Enlisted>,
    keys: HashMap<AgentKey, SpyId>,
    next_seq: u64,
}

struct RegistryInner {
    config: EngineConfig,
    state: Mutex<RegistryState>,
}

/// Tracker of every active agent
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

/// Keys held by an active agent of any registry
///
/// Always locked after a registry's own state, never before.
static CLAIMS: Lazy<Mutex<HashMap<AgentKey, SpyId>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// One namespace registry per namespace, shared by every registry
static NESTS: Lazy<Mutex<HashMap<u64, NamespaceRegistry>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static GLOBAL: Lazy<Registry> = Lazy::new(|| {
    let config = EngineConfig::load().unwrap_or_else(|e| {
        warn!("Falling back to default engine configuration: {}", e);
        EngineConfig::default()
    });
    Registry::with_config(config)
});

impl Registry {
    /// Create an empty registry with default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                config,
                state: Mutex::new(RegistryState::default()),
            }),
        }
    }

    /// Process-wide registry, configured from the environment on first use
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Whether any registry has an active agent under `key`
    pub fn is_claimed(key: &AgentKey) -> bool {
        CLAIMS.lock().contains_key(key)
    }

    /// Start tracking `agent`
    pub fn recruit(&self, agent: Agent) -> Result<Agent> {
        let mut state = self.inner.state.lock();
        let mut claims = CLAIMS.lock();
        let id = agent.id();
        let key = agent.key();

        if state.agents.contains_key(&id) || claims.contains_key(&key) {
            return Err(match &agent {
                Agent::Interception(spy) => EngineError::AlreadyHooked {
                    target: spy.target().to_string(),
                    method: spy.method().to_string(),
                },
                Agent::Binding(binding) => EngineError::AlreadyHooked {
                    target: binding.namespace().name().to_string(),
                    method: binding.name().to_string(),
                },
            });
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        claims.insert(key.clone(), id);
        drop(claims);
        state.keys.insert(key, id);
        state.agents.insert(
            id,
            Enlisted {
                seq,
                agent: agent.clone(),
            },
        );

        debug!("Recruited {} ({} active)", agent, state.agents.len());
        Ok(agent)
    }

    /// Stop tracking `agent`
    pub fn retire(&self, agent: &Agent) -> Result<()> {
        let mut state = self.inner.state.lock();
        match state.agents.remove(&agent.id()) {
            Some(enlisted) => {
                let key = enlisted.agent.key();
                release_claim(&key, enlisted.agent.id());
                state.keys.remove(&key);
                debug!("Retired {} ({} active)", agent, state.agents.len());
                Ok(())
            }
            None => Err(EngineError::NotHooked(agent.to_string())),
        }
    }

    pub fn find(&self, id: SpyId) -> Option<Agent> {
        self.inner
            .state
            .lock()
            .agents
            .get(&id)
            .map(|enlisted| enlisted.agent.clone())
    }

    pub fn is_active(&self, agent: &Agent) -> bool {
        self.inner.state.lock().agents.contains_key(&agent.id())
    }

    fn find_by_key(&self, key: &AgentKey) -> Option<Agent> {
        let state = self.inner.state.lock();
        state
            .keys
            .get(key)
            .and_then(|id| state.agents.get(id))
            .map(|enlisted| enlisted.agent.clone())
    }

    /// Active interception for (target, method, scope)
    pub fn find_interception(
        &self,
        target: &Target,
        method: &str,
        scope: Scope,
    ) -> Option<Interception> {
        match self.find_by_key(&AgentKey::Method(HookKey::new(target, method, scope))) {
            Some(Agent::Interception(spy)) => Some(spy),
            _ => None,
        }
    }

    /// Active interceptions on `target`, oldest first
    pub fn interceptions_on(&self, target: &Target) -> Vec<Interception> {
        let state = self.inner.state.lock();
        let mut found: Vec<(u64, Interception)> = state
            .agents
            .values()
            .filter_map(|enlisted| match &enlisted.agent {
                Agent::Interception(spy) if spy.target().id() == target.id() => {
                    Some((enlisted.seq, spy.clone()))
                }
                _ => None,
            })
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        found.into_iter().map(|(_, spy)| spy).collect()
    }

    /// Active override of `name` in `namespace`
    pub fn find_binding(&self, namespace: &Namespace, name: &str) -> Option<BindingOverride> {
        let key = AgentKey::Binding {
            namespace: namespace.id(),
            name: name.to_string(),
        };
        match self.find_by_key(&key) {
            Some(Agent::Binding(binding)) => Some(binding),
            _ => None,
        }
    }

    /// Names currently overridden in `namespace`, by any registry
    pub fn hooked_bindings(&self, namespace: &Namespace) -> Vec<String> {
        let nest = NESTS.lock().get(&namespace.id()).cloned();
        nest.map(|nest| nest.hooked_names()).unwrap_or_default()
    }

    /// Override registry for `namespace`, created on first use
    ///
    /// The same instance is returned whichever registry asks.
    pub fn nest(&self, namespace: &Namespace) -> NamespaceRegistry {
        NESTS
            .lock()
            .entry(namespace.id())
            .or_insert_with(|| NamespaceRegistry::new(namespace.name()))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Restore everything tracked, newest first, and clear the registry
    ///
    /// Never fails; individual restore errors are logged and skipped.
    pub fn dissolve(&self) {
        let mut enlisted: Vec<Enlisted> = {
            let mut state = self.inner.state.lock();
            state.keys.clear();
            state.agents.drain().map(|(_, enlisted)| enlisted).collect()
        };
        for Enlisted { agent, .. } in &enlisted {
            release_claim(&agent.key(), agent.id());
        }
        if enlisted.is_empty() {
            return;
        }

        enlisted.sort_by_key(|e| Reverse(e.seq));
        let count = enlisted.len();
        for Enlisted { agent, .. } in enlisted {
            if let Err(e) = agent.restore_detached() {
                warn!("Failed to restore {} during dissolve: {}", agent, e);
            }
        }

        info!("Dissolved {} active interceptions and overrides", count);
        metrics::counter!("spy_engine_dissolves_total").increment(1);
    }
}

fn release_claim(key: &AgentKey, id: SpyId) {
    let mut claims = CLAIMS.lock();
    if claims.get(key) == Some(&id) {
        claims.remove(key);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("active", &self.len())
            .finish()
    }
}
