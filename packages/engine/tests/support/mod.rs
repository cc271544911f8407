// packages/engine/tests/support/mod.rs
//! Fixtures shared by the integration tests
#![allow(dead_code)]

use spy_engine::{Args, EngineError, Namespace, Object, Signature, TypeRef, Value};

/// A pen that remembers everything written with it
///
/// `write` appends to the `written` field and returns its argument; the
/// other writers go through `write` by sending to the receiver, so an
/// interception on `write` sees them.
pub fn pen_type() -> TypeRef {
    TypeRef::builder("Pen")
        .method("write", Signature::new().req("string"), |inv| {
            let string = inv.arg(0);
            if let Some(pen) = inv.receiver.as_object() {
                pen.push_field("written", string.clone());
            }
            Ok(string)
        })
        .method("write_block", Signature::new().block("block"), |inv| {
            let string = inv.yield_to(&[])?;
            inv.receiver.send("write", Args::from(vec![string]))
        })
        .method("write_hello", Signature::new(), |inv| {
            inv.receiver.send("write", Args::from(vec![Value::from("hello")]))
        })
        .method("write_array", Signature::new().rest("args"), |inv| {
            for arg in &inv.args.positional {
                inv.receiver.send("write", Args::from(vec![arg.clone()]))?;
            }
            Ok(Value::Nil)
        })
        .method(
            "greet",
            Signature::new().opt("hello").req("name"),
            |inv| {
                let (hello, name) = match inv.args.positional.len() {
                    1 => (Value::from("hello"), inv.arg(0)),
                    _ => (inv.arg(0), inv.arg(1)),
                };
                let line = format!(
                    "{} {}",
                    hello.as_str().unwrap_or_default(),
                    name.as_str().unwrap_or_default()
                );
                inv.receiver.send("write", Args::from(vec![Value::from(line)]))
            },
        )
        .method("another", Signature::new(), |_| Ok(Value::from("another")))
        .method("public_method", Signature::new(), |_| Ok(Value::Nil))
        .protected_method("protected_method", Signature::new(), |_| Ok(Value::Nil))
        .private_method("private_method", Signature::new(), |_| Ok(Value::Nil))
        .type_method("another", Signature::new(), |_| Ok(Value::from("another")))
        .type_method("public_method", Signature::new(), |_| Ok(Value::Nil))
        .type_method_with_visibility(
            "private_method",
            Signature::new(),
            spy_engine::Visibility::Private,
            |_| Ok(Value::Nil),
        )
        .build()
}

/// Values written so far
pub fn written(pen: &Object) -> Vec<Value> {
    match pen.field("written") {
        Value::List(items) => items,
        _ => Vec::new(),
    }
}

/// `Foo` with a binding, a nested `Foo::Bar` namespace and a `ChildFoo` subtype
pub struct FooFamily {
    pub foo: TypeRef,
    pub bar: Namespace,
    pub child: TypeRef,
}

pub fn foo_family() -> FooFamily {
    let foo = TypeRef::builder("Foo")
        .binding("HELLO", "hello world")
        .method("hello", Signature::new(), |inv| read_binding(&inv.receiver, "HELLO"))
        .build();
    let bar = foo.namespace().nested("Bar");
    let child = TypeRef::builder("ChildFoo").superclass(&foo).build();

    FooFamily { foo, bar, child }
}

/// Resolve `name` the way code running inside `receiver`'s type would
pub fn read_binding(receiver: &Value, name: &str) -> spy_engine::Result<Value> {
    match receiver {
        Value::Object(obj) => obj.class().namespace().resolve(name),
        Value::Type(ty) => ty.namespace().resolve(name),
        other => Err(EngineError::InvalidTarget(other.to_string())),
    }
}
