// packages/engine/src/registry/nest.rs
//! Per-namespace tracking of binding overrides

use crate::binding::binding_override::BindingOverride;
use crate::utils::errors::{EngineError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct NestInner {
    namespace: String,
    overrides: Mutex<HashMap<String, BindingOverride>>,
}

/// Active binding overrides of one namespace, at most one per name
#[derive(Clone)]
pub struct NamespaceRegistry {
    inner: Arc<NestInner>,
}

impl NamespaceRegistry {
    pub(crate) fn new(namespace: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(NestInner {
                namespace: namespace.into(),
                overrides: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn add(&self, binding: &BindingOverride) -> Result<()> {
        let mut overrides = self.inner.overrides.lock();
        if overrides.contains_key(binding.name()) {
            return Err(EngineError::AlreadyHooked {
                target: self.inner.namespace.clone(),
                method: binding.name().to_string(),
            });
        }
        overrides.insert(binding.name().to_string(), binding.clone());
        Ok(())
    }

    /// Remove `binding`; fails unless it is the override registered for its name
    pub fn remove(&self, binding: &BindingOverride) -> Result<()> {
        let mut overrides = self.inner.overrides.lock();
        match overrides.get(binding.name()) {
            Some(current) if current.id() == binding.id() => {
                overrides.remove(binding.name());
                Ok(())
            }
            _ => Err(EngineError::NoSpy {
                target: self.inner.namespace.clone(),
                method: binding.name().to_string(),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<BindingOverride> {
        self.inner.overrides.lock().get(name).cloned()
    }

    pub fn is_hooked(&self, name: &str) -> bool {
        self.inner.overrides.lock().contains_key(name)
    }

    /// Overridden names, sorted
    pub fn hooked_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.overrides.lock().keys().cloned().collect();
        names.sort();
        names
    }
}
