//! Type substitution (spec.md §4.3).
//!
//! `graphix-compiler` already threads its type and binding environments
//! through `immutable_chunkmap::map::Map` (see `typ/mod.rs`, `env.rs`) for
//! the same reason spec.md §4.3 asks for: "must preserve structural
//! sharing ... return the original pointer" if nothing changed. A
//! persistent map gives that for free on every `insert`, and turns
//! `compose_subst`'s "else append" case into an O(log n) update instead of
//! a linear scan of a `Vec<type_arrow>` — a direct, behavior-preserving
//! refinement of the spec's described `Vec`-based algorithm (see
//! DESIGN.md).

use immutable_chunkmap::map::Map as ChunkMap;

use super::{Type, TypeVarId};

/// A finite map from type variables to types.
#[derive(Clone, Debug, Default)]
pub struct Subst(ChunkMap<TypeVarId, Type, 16>);

impl Subst {
    pub fn empty() -> Self {
        Subst(ChunkMap::new())
    }

    pub fn singleton(from: TypeVarId, to: Type) -> Self {
        Subst::empty().inserted(from, to)
    }

    pub fn get(&self, var: TypeVarId) -> Option<&Type> {
        self.0.get(&var)
    }

    pub fn contains(&self, var: TypeVarId) -> bool {
        self.0.get(&var).is_some()
    }

    /// Functional insert: returns a new `Subst` sharing structure with
    /// `self` wherever possible.
    pub fn inserted(&self, from: TypeVarId, to: Type) -> Self {
        let (map, _old) = self.0.insert(from, to);
        Subst(map)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeVarId, &Type)> {
        self.0.into_iter()
    }
}

/// Substitute every bound variable appearing in `t`, recursively.
/// Unbound atoms are returned unchanged (and, for the compound cases, the
/// *original* `Arc` is reused when no subterm actually changed, satisfying
/// spec.md §4.3's "return the original pointer" sharing requirement).
pub fn subst_one(var: TypeVarId, to: &Type, in_: &Type) -> Type {
    match in_ {
        Type::Var(id) if *id == var => to.clone(),
        Type::Arrow(a, b) => {
            let na = subst_one(var, to, a);
            let nb = subst_one(var, to, b);
            if na.same_type(a) && nb.same_type(b) {
                in_.clone()
            } else {
                Type::arrow(na, nb)
            }
        }
        Type::List(t) => {
            let nt = subst_one(var, to, t);
            if nt.same_type(t) {
                in_.clone()
            } else {
                Type::list_of(nt)
            }
        }
        Type::TApp(c, a) => {
            let nc = subst_one(var, to, c);
            let na = subst_one(var, to, a);
            if nc.same_type(c) && na.same_type(a) {
                in_.clone()
            } else {
                Type::tap(nc, na)
            }
        }
        Type::Var(_) | Type::ValueType { .. } | Type::TCon { .. } => in_.clone(),
    }
}

/// Apply every entry of `subst` to `t`, in iteration order (spec.md §4.3
/// `apply_subst`).
pub fn apply_subst(subst: &Subst, t: &Type) -> Type {
    let mut out = t.clone();
    for (var, to) in subst.iter() {
        out = subst_one(*var, to, &out);
    }
    out
}

/// Compose `a` into `subst`: first push `a` through every existing entry's
/// target type, then append `a` itself unless some entry already shares its
/// domain variable (spec.md §4.3 `compose_subst`).
pub fn compose_subst(subst: &Subst, from: TypeVarId, to: Type) -> Subst {
    let mut composed = Subst::empty();
    let mut seen_domain = false;
    for (var, existing_to) in subst.iter() {
        let rewritten = subst_one(from, &to, existing_to);
        composed = composed.inserted(*var, rewritten);
        if *var == from {
            seen_domain = true;
        }
    }
    if !seen_domain {
        composed = composed.inserted(from, to);
    }
    composed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn apply_subst_resolves_bound_variable() {
        let v = TypeVarId::fresh();
        let s = Subst::singleton(v, Type::builtin_int());
        let resolved = apply_subst(&s, &Type::Var(v));
        assert!(resolved.same_type(&Type::builtin_int()));
    }

    #[test]
    fn apply_subst_shares_structure_when_nothing_changes() {
        let v = TypeVarId::fresh();
        let s = Subst::singleton(v, Type::builtin_int());
        let t = Type::builtin_bool();
        let out = apply_subst(&s, &t);
        assert!(out.same_type(&t));
    }

    #[test]
    fn compose_then_apply_matches_sequential_application() {
        let v1 = TypeVarId::fresh();
        let v2 = TypeVarId::fresh();
        let s = Subst::singleton(v1, Type::Var(v2));
        let composed = compose_subst(&s, v2, Type::builtin_float());
        let resolved = apply_subst(&composed, &Type::Var(v1));
        assert!(resolved.same_type(&Type::builtin_float()));
    }
}
