//! Unification (spec.md §4.4).
//!
//! Ported from `original_source/include/yave/rts/dynamic_typing.hpp`'s
//! `unify`, which is the run-time (non-template) variant: a worklist that
//! pops equations back-to-front and prefers binding `t2` when either side
//! is a variable (confirmed against the source: it checks `is_var_type(c.t2)`
//! strictly before `is_var_type(c.t1)`).

use super::{apply_subst, compose_subst, Subst, Type, TypeVarId};

/// The two ways unification can fail (spec.md §4.4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeError {
    TypeMismatch(Type, Type),
    CircularConstraint(Type),
}

impl std::fmt::Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeError::TypeMismatch(t1, t2) => write!(f, "type mismatch: {t1:?} is not {t2:?}"),
            TypeError::CircularConstraint(t) => write!(f, "circular constraint: type variable occurs in {t:?}"),
        }
    }
}

impl std::error::Error for TypeError {}

/// `occurs(x, t)`: does type variable `x` appear syntactically in `t`?
pub fn occurs(x: TypeVarId, t: &Type) -> bool {
    match t {
        Type::Var(id) => *id == x,
        Type::Arrow(a, b) => occurs(x, a) || occurs(x, b),
        Type::List(inner) => occurs(x, inner),
        Type::TApp(c, a) => occurs(x, c) || occurs(x, a),
        Type::ValueType { .. } | Type::TCon { .. } => false,
    }
}

/// Solve a conjunction of type equations, returning the most general
/// substitution or the first unsolvable equation encountered.
pub fn unify(equations: Vec<(Type, Type)>) -> Result<Subst, TypeError> {
    let mut worklist = equations;
    let mut result = Subst::empty();

    while let Some((t1, t2)) = worklist.pop() {
        if t1.same_type(&t2) {
            continue;
        }

        if let Type::Var(v2) = &t2 {
            if !occurs(*v2, &t1) {
                worklist = subst_worklist(*v2, &t1, worklist);
                result = compose_subst(&result, *v2, t1);
                continue;
            }
            return Err(TypeError::CircularConstraint(t1));
        }

        if let Type::Var(v1) = &t1 {
            if !occurs(*v1, &t2) {
                worklist = subst_worklist(*v1, &t2, worklist);
                result = compose_subst(&result, *v1, t2);
                continue;
            }
            return Err(TypeError::CircularConstraint(t2));
        }

        match (&t1, &t2) {
            (Type::Arrow(a1, b1), Type::Arrow(a2, b2)) => {
                worklist.push(((**a1).clone(), (**a2).clone()));
                worklist.push(((**b1).clone(), (**b2).clone()));
            }
            (Type::List(i1), Type::List(i2)) => {
                worklist.push(((**i1).clone(), (**i2).clone()));
            }
            (Type::TApp(c1, a1), Type::TApp(c2, a2)) => {
                worklist.push(((**c1).clone(), (**c2).clone()));
                worklist.push(((**a1).clone(), (**a2).clone()));
            }
            _ => return Err(TypeError::TypeMismatch(t1, t2)),
        }
    }

    Ok(result)
}

fn subst_worklist(var: TypeVarId, to: &Type, worklist: Vec<(Type, Type)>) -> Vec<(Type, Type)> {
    worklist
        .into_iter()
        .map(|(a, b)| (super::subst::subst_one(var, to, &a), super::subst::subst_one(var, to, &b)))
        .collect()
}

/// Convenience: unify and immediately apply the result to `t`.
pub fn unify_and_resolve(equations: Vec<(Type, Type)>, t: &Type) -> Result<(Subst, Type), TypeError> {
    let subst = unify(equations)?;
    let resolved = apply_subst(&subst, t);
    Ok((subst, resolved))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unifying_a_fresh_var_with_a_concrete_type_binds_it() {
        let v = TypeVarId::fresh();
        let subst = unify(vec![(Type::Var(v), Type::builtin_int())]).unwrap();
        assert!(apply_subst(&subst, &Type::Var(v)).same_type(&Type::builtin_int()));
    }

    #[test]
    fn unifying_arrows_recurses_componentwise() {
        let v1 = TypeVarId::fresh();
        let v2 = TypeVarId::fresh();
        let lhs = Type::arrow(Type::Var(v1), Type::Var(v2));
        let rhs = Type::arrow(Type::builtin_int(), Type::builtin_bool());
        let subst = unify(vec![(lhs, rhs)]).unwrap();
        assert!(apply_subst(&subst, &Type::Var(v1)).same_type(&Type::builtin_int()));
        assert!(apply_subst(&subst, &Type::Var(v2)).same_type(&Type::builtin_bool()));
    }

    #[test]
    fn mismatched_constructors_fail() {
        let err = unify(vec![(Type::builtin_int(), Type::builtin_bool())]).unwrap_err();
        assert!(matches!(err, TypeError::TypeMismatch(..)));
    }

    #[test]
    fn self_referential_equation_is_circular() {
        let v = TypeVarId::fresh();
        let t = Type::list_of(Type::Var(v));
        let err = unify(vec![(Type::Var(v), t)]).unwrap_err();
        assert!(matches!(err, TypeError::CircularConstraint(_)));
    }

    #[test]
    fn unify_result_makes_both_sides_equal() {
        let v = TypeVarId::fresh();
        let a = Type::Var(v);
        let b = Type::list_of(Type::builtin_int());
        let subst = unify(vec![(a.clone(), b.clone())]).unwrap();
        assert!(apply_subst(&subst, &a).same_type(&apply_subst(&subst, &b)));
    }
}
