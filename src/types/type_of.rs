//! `type_of`: reconstruct a [`Type`] for an [`crate::object::Object`]
//! (spec.md §4.6).

use super::{apply_subst, genpoly, unify, Subst, Type, TypeError, TypeVarId};
use crate::object::{Object, ObjectPtr, Payload};

/// The threaded type environment: a substitution that doubles as the
/// binding context for `Lambda`-bound variables, exactly as spec.md §4.6
/// describes ("env is a vector of substitutions threaded through the
/// recursion"). A bound term variable's id is reused as its type-variable
/// key (see [`crate::object::VarId`] / [`TypeVarId::from`]), so "lookup in
/// env" and "apply the accumulated substitution" are the same operation.
pub type TypeEnv = Subst;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeOfError {
    UnboundedVariable,
    Unification(TypeError),
    NotAFunction(Type),
}

impl std::fmt::Display for TypeOfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeOfError::UnboundedVariable => write!(f, "unbounded_variable"),
            TypeOfError::Unification(e) => write!(f, "{e}"),
            TypeOfError::NotAFunction(t) => write!(f, "attempted to apply a non-function type {t:?}"),
        }
    }
}
impl std::error::Error for TypeOfError {}

impl From<TypeError> for TypeOfError {
    fn from(e: TypeError) -> Self {
        TypeOfError::Unification(e)
    }
}

/// Compute the type of `obj` under `env`, returning the (possibly further
/// constrained) environment alongside it so the caller can keep threading
/// it through sibling subtrees (spec.md §4.6).
pub fn type_of(obj: &ObjectPtr, env: &TypeEnv) -> Result<(Type, TypeEnv), TypeOfError> {
    match obj.payload() {
        Payload::Apply(apply) => {
            // 1.a: a memoized apply cell types as its cached result.
            if let Some(cached) = apply.get_result() {
                return type_of(&cached, env);
            }

            // 1.b: type the applied function, generalizing free variables
            // not already pinned down (let-polymorphism at the call site).
            let (t1_raw, env1) = type_of(&apply.app, env)?;
            let t1 = genpoly(&t1_raw, &env1);

            // 1.c
            let (t2, env2) = type_of(&apply.arg, &env1)?;

            // 1.d
            let v = Type::genvar();
            let applied_t1 = apply_subst(&env2, &t1);
            let expected = Type::arrow(t2, v.clone());
            let solved = unify(vec![(applied_t1, expected)])?;
            let env3 = merge(&env2, &solved);
            let result = apply_subst(&env3, &v);
            Ok((result, env3))
        }

        Payload::Lambda(lambda) => {
            let var_type = Type::Var(TypeVarId::from(lambda.var));
            let env_body = env.inserted(TypeVarId::from(lambda.var), var_type.clone());
            let (body_type, _env_after_body) = type_of(&lambda.body, &env_body)?;
            // The binding is dropped on the way back out: callers outside
            // this lambda never see `lambda.var` in scope.
            Ok((Type::arrow(apply_subst(&env_body, &var_type), body_type), env.clone()))
        }

        Payload::Variable(var) => match env.get(TypeVarId::from(*var)) {
            Some(t) => Ok((apply_subst(env, t), env.clone())),
            None => Err(TypeOfError::UnboundedVariable),
        },

        Payload::Closure(closure) => {
            // 4: a partial application's type is what's left of the
            // declared type after peeling off one arrow per already-applied
            // argument; a fresh (unapplied) closure just returns its
            // declared type.
            let mut t = closure.declared_type().clone();
            for _ in 0..closure.applied_args().len() {
                match apply_subst(env, &t) {
                    Type::Arrow(_, ret) => t = (*ret).clone(),
                    other => return Err(TypeOfError::NotAFunction(other)),
                }
            }
            Ok((t, env.clone()))
        }

        Payload::Fix => {
            let a = Type::genvar();
            Ok((Type::arrow(Type::arrow(a.clone(), a.clone()), a), env.clone()))
        }
        Payload::Identity => {
            let a = Type::genvar();
            Ok((Type::arrow(a.clone(), a), env.clone()))
        }

        Payload::Value(_) => {
            let t = crate::object::attached_type(obj.payload())
                .unwrap_or_else(|| panic!("{}", anyhow::anyhow!("BUG: Value payload has no attached type")));
            Ok((t, env.clone()))
        }

        Payload::Exception(exception) => type_of(&exception.message, env),
    }
}

fn merge(env: &TypeEnv, solved: &Subst) -> TypeEnv {
    let mut out = env.clone();
    for (var, to) in solved.iter() {
        out = out.inserted(*var, to.clone());
    }
    out
}
