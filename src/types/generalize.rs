//! Generalization / `genpoly` (spec.md §4.5).
//!
//! Ported from `original_source/include/yave/rts/dynamic_typing.hpp`'s
//! `genpoly`, the run-time variant used by the compiler (spec.md §1 item 3
//! scopes this spec to exactly that variant).

use std::collections::HashSet;

use super::{subst::apply_subst, Subst, Type};

/// Freshen every free type variable of `t` that is *not* already bound in
/// `env`, implementing let-polymorphism at each application site. Monomorphic
/// (non-arrow) types are returned unchanged, matching the source exactly:
/// `genpoly` only ever freshens closure/arrow types.
pub fn genpoly(t: &Type, env: &Subst) -> Type {
    if !matches!(t, Type::Arrow(..)) {
        return t.clone();
    }

    let mut free = HashSet::new();
    t.free_vars(&mut free);

    let mut freshen = Subst::empty();
    for var in free {
        if !env.contains(var) {
            freshen = freshen.inserted(var, Type::genvar());
        }
    }

    apply_subst(&freshen, t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeVarId;

    #[test]
    fn monomorphic_types_pass_through_unchanged() {
        let t = Type::builtin_int();
        assert!(genpoly(&t, &Subst::empty()).same_type(&t));
    }

    #[test]
    fn arrow_types_get_fresh_free_variables() {
        let v = TypeVarId::fresh();
        let t = Type::arrow(Type::Var(v), Type::Var(v));
        let generalized = genpoly(&t, &Subst::empty());
        match generalized {
            Type::Arrow(a, b) => assert!(a.same_type(&b)),
            other => panic!("expected an arrow, got {other:?}"),
        }
        assert!(!generalized.same_type(&t));
    }

    #[test]
    fn variables_bound_in_env_are_not_freshened() {
        let v = TypeVarId::fresh();
        let env = Subst::singleton(v, Type::builtin_int());
        let t = Type::arrow(Type::Var(v), Type::builtin_bool());
        let generalized = genpoly(&t, &env);
        match generalized {
            Type::Arrow(a, _) => assert!(matches!(*a, Type::Var(id) if id == v)),
            other => panic!("expected an arrow, got {other:?}"),
        }
    }
}
