//! The Hindley–Milner style type representation (spec.md §3 "Type", §4.2).
//!
//! This is the *run-time* type system (spec.md §1 item 3): the source's
//! template-metaprogrammed compile-time mirror is explicitly out of scope.
//! Grounded on `graphix-compiler::typ::Type` (`smf-steve-graphix`) for the
//! general shape (a tagged enum over `Arc`-boxed recursive fields, a
//! mutable-variable case, structural equality) but cut down to exactly the
//! constructor set spec.md §3 names — `graphix-compiler`'s much larger
//! surface (`Struct`, `Variant`, `Map`, `Set`, structural subtyping via
//! `contains`) supports a full scripting language and has no counterpart
//! here.

mod generalize;
mod subst;
mod type_of;
mod unify;

pub use generalize::genpoly;
pub use subst::{apply_subst, compose_subst, Subst};
pub use type_of::{type_of, TypeEnv, TypeOfError};
pub use unify::{occurs, unify, TypeError};

use arcstr::ArcStr;
use std::sync::atomic::{AtomicU64, Ordering};
use triomphe::Arc;
use uuid::{uuid, Uuid};

/// The kind of a type constructor: nullary (`*`) or unary (`* -> *`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Kind {
    Star,
    StarToStar,
}

/// A fresh meta-variable's identity. Reuses [`crate::object::VarId`]'s
/// underlying [`crate::uid::Uid`] scheme when keyed to a bound term
/// variable (spec.md §4.6, "Lambda" case); otherwise minted from a
/// process-wide counter, which is cheaper than a random 128-bit id for the
/// enormous number of meta-variables a single compile can generate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TypeVarId(u64);

static NEXT_VAR: AtomicU64 = AtomicU64::new(1);

impl TypeVarId {
    pub fn fresh() -> Self {
        TypeVarId(NEXT_VAR.fetch_add(1, Ordering::Relaxed))
    }
}

impl From<crate::object::VarId> for TypeVarId {
    fn from(v: crate::object::VarId) -> Self {
        // Fold the 128-bit term-variable id down to 64 bits. Collisions
        // would only matter if they aliased *during the same compile*,
        // which would require astronomically bad luck from the 128-bit
        // source id; acceptable for a meta-variable key.
        let bytes = format!("{v:?}");
        TypeVarId(fxhash::hash64(bytes.as_bytes()))
    }
}

/// A type (spec.md §3 "Type").
#[derive(Clone, Debug)]
pub enum Type {
    /// A nominal, by-uuid-compared primitive or user value type.
    ValueType { uuid: Uuid, name: ArcStr },
    /// A rigid meta-variable.
    Var(TypeVarId),
    /// `captured -> returns`, right-associative.
    Arrow(Arc<Type>, Arc<Type>),
    /// The unary list constructor applied to `t`.
    List(Arc<Type>),
    /// A named type constructor of a given kind (e.g. `Maybe :: * -> *`).
    TCon { uuid: Uuid, name: ArcStr, kind: Kind },
    /// Application of a type constructor to one argument.
    TApp(Arc<Type>, Arc<Type>),
}

/// Built-in uuid for the list type constructor (spec.md §3).
pub const LIST_TYPE_UUID: Uuid = uuid!("d14b9346-0000-0000-0000-000000000000");

impl Type {
    pub fn genvar() -> Self {
        Type::Var(TypeVarId::fresh())
    }

    pub fn arrow(captured: Type, returns: Type) -> Self {
        Type::Arrow(Arc::new(captured), Arc::new(returns))
    }

    pub fn list_of(t: Type) -> Self {
        Type::List(Arc::new(t))
    }

    pub fn tap(constructor: Type, arg: Type) -> Self {
        Type::TApp(Arc::new(constructor), Arc::new(arg))
    }

    pub fn value(uuid: Uuid, name: impl Into<ArcStr>) -> Self {
        Type::ValueType { uuid, name: name.into() }
    }

    pub fn tcon(uuid: Uuid, name: impl Into<ArcStr>, kind: Kind) -> Self {
        Type::TCon { uuid, name: name.into(), kind }
    }

    /// `object_type<T>()`: the nominal singleton type for `T`.
    pub fn object_type<T: Nominal>() -> Self {
        Type::value(T::UUID, T::NAME)
    }

    pub fn builtin_int() -> Self {
        Type::value(uuid!("7a3f0000-0000-0000-0000-000000000001"), "Int")
    }
    pub fn builtin_float() -> Self {
        Type::value(uuid!("7a3f0000-0000-0000-0000-000000000002"), "Float")
    }
    pub fn builtin_bool() -> Self {
        Type::value(uuid!("7a3f0000-0000-0000-0000-000000000003"), "Bool")
    }
    pub fn builtin_string() -> Self {
        Type::value(uuid!("7a3f0000-0000-0000-0000-000000000004"), "String")
    }
    pub fn builtin_frame_time() -> Self {
        Type::value(uuid!("7a3f0000-0000-0000-0000-000000000005"), "FrameTime")
    }

    /// The `Maybe` unary type constructor, `* -> *` (spec.md §1 item 3).
    pub fn maybe_con() -> Self {
        Type::tcon(uuid!("7a3f0000-0000-0000-0000-000000000006"), "Maybe", Kind::StarToStar)
    }

    pub fn maybe_of(t: Type) -> Self {
        Type::tap(Self::maybe_con(), t)
    }

    /// Structural equality (spec.md §4.2 "same_type"): pointer-equal is
    /// short-circuited by the `Arc` comparisons baked into `PartialEq`
    /// below; `value_type` compares by uuid only (name is cosmetic).
    pub fn same_type(&self, other: &Type) -> bool {
        self == other
    }

    /// Deep copy that preserves variable ids rather than freshening them
    /// (spec.md §4.2 "Deep copy").
    pub fn copy_type(&self) -> Type {
        match self {
            Type::ValueType { uuid, name } => Type::ValueType { uuid: *uuid, name: name.clone() },
            Type::Var(id) => Type::Var(*id),
            Type::Arrow(a, b) => Type::Arrow(Arc::new(a.copy_type()), Arc::new(b.copy_type())),
            Type::List(t) => Type::List(Arc::new(t.copy_type())),
            Type::TCon { uuid, name, kind } => Type::TCon { uuid: *uuid, name: name.clone(), kind: *kind },
            Type::TApp(c, a) => Type::TApp(Arc::new(c.copy_type()), Arc::new(a.copy_type())),
        }
    }

    /// All free type variables appearing in this type (used by
    /// [`genpoly`] and by the occurs check).
    pub fn free_vars(&self, out: &mut std::collections::HashSet<TypeVarId>) {
        match self {
            Type::Var(id) => {
                out.insert(*id);
            }
            Type::Arrow(a, b) => {
                a.free_vars(out);
                b.free_vars(out);
            }
            Type::List(t) => t.free_vars(out),
            Type::TApp(c, a) => {
                c.free_vars(out);
                a.free_vars(out);
            }
            Type::ValueType { .. } | Type::TCon { .. } => {}
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::ValueType { uuid: u0, .. }, Type::ValueType { uuid: u1, .. }) => u0 == u1,
            (Type::Var(a), Type::Var(b)) => a == b,
            (Type::Arrow(a0, b0), Type::Arrow(a1, b1)) => a0 == a1 && b0 == b1,
            (Type::List(a), Type::List(b)) => a == b,
            (Type::TCon { uuid: u0, .. }, Type::TCon { uuid: u1, .. }) => u0 == u1,
            (Type::TApp(c0, a0), Type::TApp(c1, a1)) => c0 == c1 && a0 == a1,
            _ => false,
        }
    }
}
impl Eq for Type {}

/// Implemented by boxed user value types so [`Type::object_type`] can
/// recover a nominal singleton type for `T`.
pub trait Nominal {
    const UUID: Uuid;
    const NAME: &'static str;
}
