// packages/engine/src/api.rs
//! Test-facing facade
//!
//! A [`Harness`] owns a registry and restores everything it hooked when it
//! is dropped, so a test gets cleanup by letting the harness go out of
//! scope. The free functions act on the process-wide harness and need an
//! explicit [`teardown`].

use crate::binding::binding_override::{namespace_of, BindingOverride};
use crate::interception::method_interceptor::{HookOptions, Interception};
use crate::interception::method_slot::{Scope, Target};
use crate::interception::synthetic::{Double, Mock};
use crate::registry::agency::Registry;
use crate::runtime::object::{Object, TypeRef};
use crate::runtime::value::Value;
use crate::utils::config::EngineConfig;
use crate::utils::errors::{EngineError, Result};
use once_cell::sync::Lazy;

/// Entry point for creating and removing test doubles
pub struct Harness {
    registry: Registry,
}

static GLOBAL: Lazy<Harness> = Lazy::new(|| Harness {
    registry: Registry::global().clone(),
});

impl Harness {
    /// Harness with its own registry and default configuration
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            registry: Registry::with_config(config),
        }
    }

    /// Harness over the process-wide registry
    pub fn global() -> &'static Harness {
        &GLOBAL
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Intercept `method` on one object, or a type-level method on a type
    pub fn on(&self, target: impl Into<Target>, method: &str) -> Result<Interception> {
        self.on_with(target, method, HookOptions::default())
    }

    pub fn on_with(
        &self,
        target: impl Into<Target>,
        method: &str,
        options: HookOptions,
    ) -> Result<Interception> {
        Interception::new(&self.registry, target, method, Scope::Instance).hook(options)
    }

    /// Intercept several methods at once, each answering with its value
    ///
    /// Stops at the first failure; methods hooked before it stay hooked.
    pub fn on_returning(
        &self,
        target: impl Into<Target>,
        stubs: &[(&str, Value)],
    ) -> Result<Vec<Interception>> {
        let target = target.into();
        stubs
            .iter()
            .map(|(method, value)| {
                Ok(self.on(target.clone(), method)?.and_return(value.clone()))
            })
            .collect()
    }

    /// Remove the interception installed by [`Harness::on`]
    pub fn off(&self, target: impl Into<Target>, method: &str) -> Result<()> {
        self.unhook_method(target.into(), method, Scope::Instance)
    }

    /// Intercept `method` for every instance of `ty`
    pub fn on_instance_method(&self, ty: &TypeRef, method: &str) -> Result<Interception> {
        Interception::new(&self.registry, ty, method, Scope::TypeWide).hook(HookOptions::default())
    }

    /// Intercept several instance methods of `ty`, each answering with its value
    pub fn on_instance_methods_returning(
        &self,
        ty: &TypeRef,
        stubs: &[(&str, Value)],
    ) -> Result<Vec<Interception>> {
        stubs
            .iter()
            .map(|(method, value)| {
                Ok(self.on_instance_method(ty, method)?.and_return(value.clone()))
            })
            .collect()
    }

    pub fn off_instance_method(&self, ty: &TypeRef, method: &str) -> Result<()> {
        self.unhook_method(Target::from(ty), method, Scope::TypeWide)
    }

    fn unhook_method(&self, target: Target, method: &str, scope: Scope) -> Result<()> {
        match self.registry.find_interception(&target, method, scope) {
            Some(spy) => spy.unhook(),
            None => Err(EngineError::NoSpy {
                target: target.to_string(),
                method: method.to_string(),
            }),
        }
    }

    /// Override `name` in a namespace or type; the name must be bound there
    pub fn on_binding(&self, target: impl Into<Value>, name: &str) -> Result<BindingOverride> {
        BindingOverride::new(&self.registry, &target.into(), name)?.hook(false)
    }

    /// Override `name` even if it is not bound
    pub fn on_binding_forced(
        &self,
        target: impl Into<Value>,
        name: &str,
    ) -> Result<BindingOverride> {
        BindingOverride::new(&self.registry, &target.into(), name)?.hook(true)
    }

    pub fn off_binding(&self, target: impl Into<Value>, name: &str) -> Result<()> {
        let namespace = namespace_of(&target.into())?;
        match self.registry.find_binding(&namespace, name) {
            Some(binding) => binding.unhook(),
            None => Err(EngineError::NoSpy {
                target: namespace.name().to_string(),
                method: name.to_string(),
            }),
        }
    }

    /// Active instance-scope interception of `method` on `target`
    pub fn get(&self, target: impl Into<Target>, method: &str) -> Option<Interception> {
        self.registry
            .find_interception(&target.into(), method, Scope::Instance)
    }

    pub fn get_binding(&self, target: impl Into<Value>, name: &str) -> Option<BindingOverride> {
        let namespace = namespace_of(&target.into()).ok()?;
        self.registry.find_binding(&namespace, name)
    }

    /// Active interceptions on `target`, oldest first
    pub fn spies_on(&self, target: impl Into<Target>) -> Vec<Interception> {
        self.registry.interceptions_on(&target.into())
    }

    /// Placeholder object answering each listed method with its value
    pub fn double(&self, name: &str, stubs: &[(&str, Value)]) -> Result<Object> {
        let double = Double::new(name);
        self.on_returning(&double, stubs)?;
        Ok(double)
    }

    /// Instance of `ty` whose methods fail until intercepted
    pub fn mock(&self, ty: &TypeRef) -> Object {
        Mock::of(ty)
    }

    /// Restore everything this harness hooked
    pub fn teardown(&self) {
        self.registry.dissolve();
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.registry.dissolve();
    }
}

/// Intercept `method` using the process-wide harness
pub fn on(target: impl Into<Target>, method: &str) -> Result<Interception> {
    Harness::global().on(target, method)
}

pub fn off(target: impl Into<Target>, method: &str) -> Result<()> {
    Harness::global().off(target, method)
}

pub fn on_instance_method(ty: &TypeRef, method: &str) -> Result<Interception> {
    Harness::global().on_instance_method(ty, method)
}

pub fn off_instance_method(ty: &TypeRef, method: &str) -> Result<()> {
    Harness::global().off_instance_method(ty, method)
}

pub fn on_binding(target: impl Into<Value>, name: &str) -> Result<BindingOverride> {
    Harness::global().on_binding(target, name)
}

pub fn off_binding(target: impl Into<Value>, name: &str) -> Result<()> {
    Harness::global().off_binding(target, name)
}

/// Restore everything hooked through the process-wide harness
pub fn teardown() {
    Harness::global().teardown();
}
