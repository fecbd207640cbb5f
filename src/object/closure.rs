//! Primitive closures: native functions wrapped as graph-runtime terms
//! (spec.md §3 "Object" variant `Closure<N>`, §4.1, §7 `vtbl_code_func`).

use smallvec::SmallVec;
use std::panic::{catch_unwind, AssertUnwindSafe};
use triomphe::Arc;

use super::{Exception, Object, ObjectPtr, Payload};
use crate::types::Type;

/// Signature of a primitive's `code()`. Receives the fully-applied argument
/// list (left to right) and produces a result object or an exception object.
pub type NativeFn = Arc<dyn Fn(&[ObjectPtr]) -> Result<ObjectPtr, ObjectPtr> + Send + Sync>;

/// A native function partially (or fully) applied to some prefix of its
/// arguments. `arity` is the count still outstanding; when it reaches zero
/// the closure is ready to invoke.
#[derive(Clone)]
pub struct Closure {
    total_arity: u8,
    args: SmallVec<[ObjectPtr; 4]>,
    code: NativeFn,
    declared_type: Type,
    name: arcstr::ArcStr,
}

impl Closure {
    pub fn new(name: impl Into<arcstr::ArcStr>, total_arity: u8, declared_type: Type, code: NativeFn) -> Self {
        Closure { total_arity, args: SmallVec::new(), code, declared_type, name: name.into() }
    }

    pub fn name(&self) -> &arcstr::ArcStr {
        &self.name
    }

    pub fn declared_type(&self) -> &Type {
        &self.declared_type
    }

    pub fn applied_args(&self) -> &[ObjectPtr] {
        &self.args
    }

    /// Remaining arity: how many more arguments this closure needs.
    pub fn arity(&self) -> u8 {
        self.total_arity - self.args.len() as u8
    }

    pub fn is_saturated(&self) -> bool {
        self.arity() == 0
    }

    /// Apply one more argument, returning either a new partial closure
    /// (wrapped as an `Object`) or, once saturated, the result of running
    /// `code()` (guarded so a Rust panic becomes an `Exception` object
    /// rather than unwinding past this boundary — the idiomatic-Rust
    /// equivalent of `vtbl_code_func`'s catch-and-tag-as-exception wrapper).
    pub fn push_arg(&self, arg: ObjectPtr) -> ObjectPtr {
        let mut next = self.clone();
        next.args.push(arg);
        if next.is_saturated() {
            invoke(&next.code, &next.args)
        } else {
            Object::new(Payload::Closure(next))
        }
    }
}

impl std::fmt::Debug for Closure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name)
            .field("arity", &self.arity())
            .field("total_arity", &self.total_arity)
            .finish()
    }
}

fn invoke(code: &NativeFn, args: &[ObjectPtr]) -> ObjectPtr {
    match catch_unwind(AssertUnwindSafe(|| code(args))) {
        Ok(Ok(result)) => result,
        Ok(Err(exception_obj)) => exception_obj,
        Err(panic) => {
            let msg = panic_message(panic);
            log::error!("native closure panicked: {msg}");
            super::make_exception(super::Value::String(msg.into()), None)
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "native closure panicked with a non-string payload".to_string()
    }
}

impl Exception {
    pub fn new(message: ObjectPtr, payload: Option<ObjectPtr>) -> Self {
        Exception { message, payload }
    }
}
