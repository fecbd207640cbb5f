//! The reference-counted runtime term representation (spec.md §4.1).
//!
//! `Object` cells are used both as fully-reduced values and as unevaluated
//! thunks (`Apply`). `ObjectPtr` is `triomphe::Arc<Object>` — the teacher
//! crate (`graphix-compiler`) already leans on `triomphe::Arc` everywhere it
//! needs an atomically-refcounted, no-weak-count cell, which is exactly the
//! "intrusive reference count" spec.md §4.1/§9 ask for, for free and without
//! `unsafe`.

mod closure;
mod value;

pub use closure::{Closure, NativeFn};
pub use value::{FrameDemand, FrameTime, UserValue, Value};

use parking_lot::Mutex;
use std::sync::LazyLock;
use triomphe::Arc;

use crate::types::Type;

pub type ObjectPtr = Arc<Object>;

/// A runtime term id for `Lambda`/`Variable` pairs. Reuses [`crate::uid::Uid`]
/// so a bound variable's id can double as a type-variable id during
/// `type_of` (spec.md §4.6 "Lambda" case).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct VarId(pub(crate) crate::uid::Uid);

impl VarId {
    pub fn new() -> Self {
        VarId(crate::uid::Uid::new())
    }
}

impl Default for VarId {
    fn default() -> Self {
        Self::new()
    }
}

/// An unevaluated application, `app arg`. Memoizes its first successful
/// reduction behind a mutex-guarded slot — a safe stand-in for the spec's
/// "atomic store/load with explicit memory order" on a shared `object_ptr`
/// slot (see DESIGN.md).
pub struct Apply {
    pub app: ObjectPtr,
    pub arg: ObjectPtr,
    result: Mutex<Option<ObjectPtr>>,
}

impl Apply {
    pub fn new(app: ObjectPtr, arg: ObjectPtr) -> Self {
        Apply { app, arg, result: Mutex::new(None) }
    }

    pub fn is_result(&self) -> bool {
        self.result.lock().is_some()
    }

    pub fn get_result(&self) -> Option<ObjectPtr> {
        self.result.lock().clone()
    }

    /// Record the reduced result. Idempotent: later callers racing to
    /// memoize the same apply cell all observe the first winner's value.
    pub fn set_result(&self, result: ObjectPtr) -> ObjectPtr {
        let mut slot = self.result.lock();
        if slot.is_none() {
            *slot = Some(result);
        }
        slot.clone().unwrap()
    }
}

impl std::fmt::Debug for Apply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Apply").field("memoized", &self.is_result()).finish()
    }
}

/// A lambda abstraction compiled from a group node (spec.md §4.10, groups
/// compiled to λ-abstractions).
#[derive(Debug, Clone)]
pub struct Lambda {
    pub var: VarId,
    pub body: ObjectPtr,
}

/// An in-flight exception. `message` is never null by construction (it is
/// an `ObjectPtr`, which cannot be null).
#[derive(Debug, Clone)]
pub struct Exception {
    pub message: ObjectPtr,
    pub payload: Option<ObjectPtr>,
}

/// The tagged payload of a heap cell (spec.md §3 "Object").
#[derive(Debug)]
pub enum Payload {
    Value(Value),
    Apply(Apply),
    Lambda(Lambda),
    Variable(VarId),
    Exception(Exception),
    Closure(Closure),
    /// The polymorphic fixed-point combinator, `(a -> a) -> a`.
    Fix,
    /// The polymorphic identity function, `a -> a`.
    Identity,
}

/// A runtime term cell. See module docs and spec.md §3/§4.1.
#[derive(Debug)]
pub struct Object {
    payload: Payload,
}

impl Object {
    pub fn new(payload: Payload) -> ObjectPtr {
        Arc::new(Object { payload })
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn is_exception(&self) -> bool {
        matches!(self.payload, Payload::Exception(_))
    }

    pub fn as_exception(&self) -> Option<&Exception> {
        match &self.payload {
            Payload::Exception(e) => Some(e),
            _ => None,
        }
    }
}

pub fn make_value(v: Value) -> ObjectPtr {
    Object::new(Payload::Value(v))
}

pub fn make_apply(app: ObjectPtr, arg: ObjectPtr) -> ObjectPtr {
    Object::new(Payload::Apply(Apply::new(app, arg)))
}

pub fn make_lambda(var: VarId, body: ObjectPtr) -> ObjectPtr {
    Object::new(Payload::Lambda(Lambda { var, body }))
}

pub fn make_variable(var: VarId) -> ObjectPtr {
    Object::new(Payload::Variable(var))
}

pub fn make_exception(message: Value, payload: Option<ObjectPtr>) -> ObjectPtr {
    Object::new(Payload::Exception(Exception { message: make_value(message), payload }))
}

/// The shared identity-combinator singleton. Cloning an `Arc` is just an
/// atomic increment, so there is no need for the spec's "sentinel refcount
/// that elides the destructor" trick for statics in safe Rust — the normal
/// refcounting path is already correct and cheap for a process-lifetime cell.
pub fn identity() -> ObjectPtr {
    static IDENTITY: LazyLock<ObjectPtr> = LazyLock::new(|| Object::new(Payload::Identity));
    IDENTITY.clone()
}

pub fn fix() -> ObjectPtr {
    static FIX: LazyLock<ObjectPtr> = LazyLock::new(|| Object::new(Payload::Fix));
    FIX.clone()
}

/// Attached (non-inferred) type for atoms that carry one directly, used by
/// `type_of`'s base cases (spec.md §4.6 item 5).
pub fn attached_type(payload: &Payload) -> Option<Type> {
    match payload {
        Payload::Value(v) => Some(v.type_of()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_saturate_and_invoke() {
        let add: NativeFn = Arc::new(|args: &[ObjectPtr]| {
            let a = match args[0].payload() {
                Payload::Value(Value::Int(n)) => *n,
                _ => unreachable!(),
            };
            let b = match args[1].payload() {
                Payload::Value(Value::Int(n)) => *n,
                _ => unreachable!(),
            };
            Ok(make_value(Value::Int(a + b)))
        });
        let closure = Closure::new("add", 2, Type::builtin_int(), add);
        let partial = Object::new(Payload::Closure(closure));
        let partial = match partial.payload() {
            Payload::Closure(c) => c.push_arg(make_value(Value::Int(2))),
            _ => unreachable!(),
        };
        let result = match partial.payload() {
            Payload::Closure(c) => c.push_arg(make_value(Value::Int(3))),
            _ => unreachable!(),
        };
        match result.payload() {
            Payload::Value(Value::Int(n)) => assert_eq!(*n, 5),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn panicking_native_fn_becomes_exception() {
        let boom: NativeFn = Arc::new(|_: &[ObjectPtr]| panic!("boom"));
        let closure = Closure::new("boom", 1, Type::builtin_int(), boom);
        let result = closure.push_arg(make_value(Value::Int(0)));
        assert!(result.is_exception());
    }

    #[test]
    fn apply_memoizes_first_result() {
        let apply = Apply::new(identity(), make_value(Value::Int(1)));
        let first = apply.set_result(make_value(Value::Int(42)));
        let second = apply.set_result(make_value(Value::Int(999)));
        assert!(matches!(first.payload(), Payload::Value(Value::Int(42))));
        assert!(matches!(second.payload(), Payload::Value(Value::Int(42))));
        assert!(apply.is_result());
    }
}
