// packages/engine/src/interception/synthetic.rs
//! Synthetic receivers
//!
//! - **Mock**: an instance of a real type whose every method fails until it
//!   is intercepted
//! - **Double**: a bare placeholder object; hooks on it are always forced

use crate::runtime::method::{Invocation, Method, MethodBody, MethodEntry, MethodOrigin};
use crate::runtime::object::{Object, TypeRef};
use crate::utils::errors::EngineError;
use std::sync::Arc;
use tracing::debug;

/// Builder for instances whose methods must be intercepted before use
pub struct Mock;

impl Mock {
    /// Instance of `ty` with every instance method shadowed by a stub
    ///
    /// Stubs keep the shadowed method's signature and visibility, so calls
    /// with the wrong arity or visibility fail the same way they would on a
    /// real instance.
    pub fn of(ty: &TypeRef) -> Object {
        let mock = Object::new(ty);
        let singleton = mock.singleton_table();

        for table in ty.instance_chain() {
            for (name, entry) in table.entries() {
                if singleton.contains(&name) {
                    continue;
                }
                let stub = Method::with_origin(
                    name.clone(),
                    entry.method.signature().clone(),
                    stub_body(),
                    MethodOrigin::Stub,
                );
                singleton.define(name, MethodEntry::new(stub, entry.visibility));
            }
        }

        debug!("Built mock {} with {} stubs", mock, singleton.len());
        mock
    }
}

fn stub_body() -> MethodBody {
    Arc::new(|invocation: &Invocation| {
        Err(EngineError::NeverHooked {
            method: invocation.method.clone(),
        })
    })
}

/// Builder for placeholder objects
pub struct Double;

impl Double {
    /// Fresh object of a fresh, empty type named `name`
    pub fn new(name: &str) -> Object {
        let ty = TypeRef::builder(name).build();
        Object::create(&ty, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::runtime::method::{Signature, Visibility};
    use crate::runtime::value::Value;

    fn pen_type() -> TypeRef {
        let base = TypeRef::builder("Tool")
            .method("name", Signature::new(), |_| Ok(Value::from("tool")))
            .build();
        TypeRef::builder("Pen")
            .superclass(&base)
            .method("write", Signature::new().req("s"), |inv| Ok(inv.arg(0)))
            .private_method("ink", Signature::new(), |_| Ok(Value::from("blue")))
            .build()
    }

    #[test]
    fn test_mock_methods_fail_until_hooked() {
        let mock = Mock::of(&pen_type());

        assert!(matches!(
            mock.call("write", args!["x"]).unwrap_err(),
            EngineError::NeverHooked { .. }
        ));
        assert!(matches!(
            mock.call("name", ()).unwrap_err(),
            EngineError::NeverHooked { .. }
        ));
    }

    #[test]
    fn test_mock_stubs_keep_shape() {
        let mock = Mock::of(&pen_type());

        assert!(matches!(
            mock.call("write", args!["x", "y"]).unwrap_err(),
            EngineError::Arity { given: 2, .. }
        ));
        assert_eq!(mock.visibility_of("ink"), Some(Visibility::Private));
        assert!(matches!(
            mock.call("ink", ()).unwrap_err(),
            EngineError::NotCallable { .. }
        ));
        assert!(mock.singleton_table().get("write").unwrap().method.is_stub());
    }

    #[test]
    fn test_double_is_bare() {
        let double = Double::new("Logger");
        assert!(double.is_double());
        assert_eq!(double.class().name(), "Logger");
        assert!(double.call("info", ()).is_err());
    }
}
