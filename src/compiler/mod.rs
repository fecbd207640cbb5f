//! The compiler: turns a parsed graph into a runtime term (spec.md §4.10).
//!
//! Grounded on `graphix-compiler::node::compiler::compile`'s "dispatch on
//! node shape, recurse into already-compiled children, memoize by
//! identity" skeleton. Overload resolution (spec.md §4.10 steps 2-6) has no
//! direct teacher analogue — the teacher's language isn't overloaded at the
//! call site — so it's built fresh in the teacher's idiom, reusing
//! `crate::types::type_of` to check each overload candidate rather than
//! hand-rolling a second unification pass: `type_of` already performs
//! exactly the incremental `unify(applied ≡ arrow(arg, fresh))` step the
//! spec's algorithm describes per input, so driving candidate selection
//! through it avoids a second, divergent implementation of the same check
//! (see DESIGN.md).

pub mod bind;

pub use bind::{Bind, BindRegistry};

use crate::diagnostics::{Message, MessageMap, TypeMissmatch};
use crate::graph::SocketKind;
use crate::object::{make_apply, make_lambda, make_variable, ObjectPtr, VarId};
use crate::parser::{self, resolve_group_output};
use crate::sgraph::{DefinitionKind, PropertyNode, StructuredNodeGraph};
use crate::types::{type_of, Type, TypeEnv, TypeVarId};
use crate::uid::{NodeHandle, SocketHandle, Uid};
use std::collections::HashMap;

/// The compiled result of an entire graph (spec.md §4.10, "executable").
#[derive(Clone)]
pub struct Executable {
    pub term: ObjectPtr,
    pub ty: Type,
}

#[derive(Clone)]
struct SocketInstance {
    term: ObjectPtr,
    ty: Type,
}

struct Ctx<'a> {
    sg: &'a StructuredNodeGraph,
    registry: &'a BindRegistry,
    properties: &'a dyn Fn(Uid) -> Option<PropertyNode>,
    /// Output-socket uid → already-compiled instance (spec.md §4.10, "per
    /// socket memoized recursion").
    memo: HashMap<Uid, SocketInstance>,
    /// Input-socket uid → instance bound by an enclosing λ-wrap, consulted
    /// before falling back to a connection or a default value. Populated
    /// and un-populated in a stack discipline by `compile_as_lambda`.
    bound_inputs: HashMap<Uid, SocketInstance>,
    messages: MessageMap,
}

/// Parse, then compile, the output named `output_name` on `group` (spec.md
/// §4.10's entry point: root output socket).
pub fn compile(sg: &StructuredNodeGraph, registry: &BindRegistry, group: Uid, output_name: &str) -> Result<Executable, MessageMap> {
    compile_with_properties(sg, registry, group, output_name, &|_| None)
}

pub fn compile_with_properties(
    sg: &StructuredNodeGraph,
    registry: &BindRegistry,
    group: Uid,
    output_name: &str,
    properties: &dyn Fn(Uid) -> Option<PropertyNode>,
) -> Result<Executable, MessageMap> {
    let mut ctx = Ctx { sg, registry, properties, memo: HashMap::new(), bound_inputs: HashMap::new(), messages: MessageMap::new() };

    let Some(output_socket) = resolve_group_output(sg, group, output_name) else {
        match (sg.group_output_node(group), sg.group_output_socket_named(group, output_name)) {
            (Some(node), Some(socket)) => ctx.messages.push(Message::MissingOutput { node, socket }),
            _ => ctx.messages.push(Message::UnexpectedParseError(format!("group has no output named {output_name}"))),
        }
        return Err(ctx.messages);
    };

    let parse_messages = parser::parse(sg, group, output_socket);
    let had_parse_errors = parse_messages.has_errors();
    ctx.messages.extend(parse_messages);
    if had_parse_errors {
        return Err(ctx.messages);
    }

    let Some(owner) = sg.with_interior(group, |g| g.get_socket_info(output_socket).map(|i| i.owner)).flatten() else {
        ctx.messages.push(Message::InternalCompileError("root output socket vanished mid-compile".into()));
        return Err(ctx.messages);
    };

    match compile_socket(&mut ctx, group, owner, output_socket) {
        Some(instance) => match type_of(&instance.term, &TypeEnv::empty()) {
            Ok((ty, _)) => Ok(Executable { term: instance.term, ty }),
            Err(_) => {
                ctx.messages.push(Message::InternalCompileError("final type_of sanity check failed".into()));
                Err(ctx.messages)
            }
        },
        None => Err(ctx.messages),
    }
}

fn compile_socket(ctx: &mut Ctx<'_>, group: Uid, node: NodeHandle, output_socket: SocketHandle) -> Option<SocketInstance> {
    if let Some(cached) = ctx.memo.get(&output_socket.id()) {
        return Some(cached.clone());
    }

    let is_lambda = ctx.sg.with_interior(group, |g| parser::is_lambda_node(g, node)).unwrap_or(false);
    let instance = if is_lambda {
        compile_as_lambda(ctx, group, node, output_socket)?
    } else if let Some(defn) = ctx.sg.get_definition(node.id()) {
        match ctx.sg.definition_kind(defn) {
            Some(DefinitionKind::Group) | Some(DefinitionKind::Macro) => compile_group_call(ctx, group, node, defn, output_socket)?,
            Some(DefinitionKind::Function) => compile_function_call(ctx, group, node, defn, output_socket)?,
            None => compile_primitive(ctx, group, node, output_socket)?,
        }
    } else {
        compile_primitive(ctx, group, node, output_socket)?
    };

    ctx.memo.insert(output_socket.id(), instance.clone());
    Some(instance)
}

/// Compile `node` as a λ-abstraction over its own (all-missing) input
/// sockets: fresh `Variable`s stand in for them while the node's usual body
/// is compiled, then the result is wrapped in one nested `Lambda` per input,
/// innermost first (spec.md §4.9's "IsLambdaNode" case, generalized beyond
/// group/macro calls to any node shape — the parser's classification makes
/// no such distinction either).
fn compile_as_lambda(ctx: &mut Ctx<'_>, group: Uid, node: NodeHandle, output_socket: SocketHandle) -> Option<SocketInstance> {
    let inputs = ctx.sg.with_interior(group, |g| g.sockets(node, Some(SocketKind::Input)))?;

    let mut vars = Vec::with_capacity(inputs.len());
    let mut restore = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let var = VarId::new();
        vars.push(var);
        let instance = SocketInstance { term: make_variable(var), ty: Type::genvar() };
        restore.push((input.id(), ctx.bound_inputs.insert(input.id(), instance)));
    }

    let body = if let Some(defn) = ctx.sg.get_definition(node.id()) {
        match ctx.sg.definition_kind(defn) {
            Some(DefinitionKind::Group) | Some(DefinitionKind::Macro) => compile_group_call(ctx, group, node, defn, output_socket),
            Some(DefinitionKind::Function) => compile_function_call(ctx, group, node, defn, output_socket),
            None => compile_primitive(ctx, group, node, output_socket),
        }
    } else {
        compile_primitive(ctx, group, node, output_socket)
    };

    for (id, previous) in restore {
        match previous {
            Some(old) => {
                ctx.bound_inputs.insert(id, old);
            }
            None => {
                ctx.bound_inputs.remove(&id);
            }
        }
    }

    let body = body?;
    let mut term = body.term;
    for var in vars.into_iter().rev() {
        term = make_lambda(var, term);
    }
    let ty = type_of(&term, &TypeEnv::empty()).ok()?.0;
    Some(SocketInstance { term, ty })
}

/// Resolve one input socket's feeding instance, in priority order: a λ-bound
/// variable, then a live connection (recursing into its producer), then a
/// default value attached directly to the socket. `node` is only used to
/// attribute a `MissingInput` diagnostic if none of the above apply.
fn resolve_input(ctx: &mut Ctx<'_>, group: Uid, node: NodeHandle, socket: SocketHandle) -> Option<SocketInstance> {
    resolve_input_with_fallback(ctx, group, node, socket, None)
}

/// As [`resolve_input`], but consulted one priority step further down: if
/// the socket carries no connection and no default data of its own,
/// `fallback` — a function definition's declared default argument — is
/// tried before giving up and reporting `MissingInput`.
fn resolve_input_with_fallback(
    ctx: &mut Ctx<'_>,
    group: Uid,
    node: NodeHandle,
    socket: SocketHandle,
    fallback: Option<&ObjectPtr>,
) -> Option<SocketInstance> {
    if let Some(bound) = ctx.bound_inputs.get(&socket.id()) {
        return Some(bound.clone());
    }

    let connected_producer = ctx
        .sg
        .with_interior(group, |g| g.input_connection(socket).and_then(|c| g.get_connection_info(c)).map(|c| c.output))
        .flatten();
    if let Some(producer) = connected_producer {
        let producer_owner = ctx.sg.with_interior(group, |g| g.get_socket_info(producer).map(|i| i.owner)).flatten()?;
        return compile_socket(ctx, group, producer_owner, producer);
    }

    let default_data = ctx.sg.with_interior(group, |g| g.get_socket_data(socket)).flatten().flatten();
    if let Some(data) = default_data {
        let (ty, _) = type_of(&data, &TypeEnv::empty()).ok()?;
        return Some(SocketInstance { term: data, ty });
    }

    if let Some(data) = fallback {
        let (ty, _) = type_of(data, &TypeEnv::empty()).ok()?;
        return Some(SocketInstance { term: data.clone(), ty });
    }

    ctx.messages.push(Message::MissingInput { node, socket });
    None
}

/// Compile a call to a group or macro by recursing through its interior,
/// with the call's own inputs pre-resolved and fed to `group_input`'s
/// mirrored output sockets positionally.
fn compile_group_call(ctx: &mut Ctx<'_>, group: Uid, node: NodeHandle, defn: Uid, output_socket: SocketHandle) -> Option<SocketInstance> {
    let output_name = ctx.sg.with_interior(group, |g| g.get_socket_info(output_socket).map(|i| i.name)).flatten()?;
    let body_socket = resolve_group_output(ctx.sg, defn, output_name.as_str())?;
    let body_owner = ctx.sg.with_interior(defn, |g| g.get_socket_info(body_socket).map(|i| i.owner)).flatten()?;

    let group_input = ctx.sg.group_input_node(defn)?;
    let interior_input_sockets = ctx.sg.with_interior(defn, |g| g.sockets(group_input, Some(SocketKind::Output)))?;
    let external_inputs = ctx.sg.with_interior(group, |g| g.sockets(node, Some(SocketKind::Input)))?;

    for (external, interior) in external_inputs.iter().zip(interior_input_sockets.iter()) {
        let instance = resolve_input(ctx, group, node, *external)?;
        ctx.memo.insert(interior.id(), instance);
    }

    compile_socket(ctx, defn, body_owner, body_socket)
}

/// Compile a plain primitive node: resolve a `Bind` by name from the
/// registry, with no declared default arguments of its own.
fn compile_primitive(ctx: &mut Ctx<'_>, group: Uid, node: NodeHandle, output_socket: SocketHandle) -> Option<SocketInstance> {
    compile_callable(ctx, group, node, output_socket, &[])
}

/// Compile a call to a `Function` definition exactly like a primitive node
/// (it is resolved from the registry by name, same as any other bind), but
/// with the function's declared per-argument defaults available as the
/// last-resort fallback for an unconnected input (spec.md §6
/// `node_declaration`'s defaults).
fn compile_function_call(ctx: &mut Ctx<'_>, group: Uid, node: NodeHandle, defn: Uid, output_socket: SocketHandle) -> Option<SocketInstance> {
    let defaults = ctx.sg.defaults_of(defn);
    compile_callable(ctx, group, node, output_socket, &defaults)
}

fn compile_callable(
    ctx: &mut Ctx<'_>,
    group: Uid,
    node: NodeHandle,
    output_socket: SocketHandle,
    defaults: &[Option<ObjectPtr>],
) -> Option<SocketInstance> {
    let (node_name, output_name, inputs) = ctx
        .sg
        .with_interior(group, |g| {
            let info = g.get_node_info(node)?;
            let output_name = g.get_socket_info(output_socket)?.name;
            Some((info.name, output_name, info.inputs))
        })
        .flatten()?;

    let mut connected_names = Vec::new();
    for input in &inputs {
        let is_connected = ctx.sg.with_interior(group, |g| g.has_connection(*input)).unwrap_or(false);
        if is_connected {
            let name = ctx.sg.with_interior(group, |g| g.get_socket_info(*input).map(|i| i.name)).flatten()?;
            connected_names.push(name);
        }
    }

    let candidates = ctx.registry.candidates(node_name.as_str(), output_name.as_str(), &connected_names);
    if candidates.is_empty() {
        ctx.messages.push(Message::NoValidOverloading { socket: output_socket });
        return None;
    }

    let mut compiled_children = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        let fallback = defaults.get(i).and_then(|d| d.as_ref());
        let instance = resolve_input_with_fallback(ctx, group, node, *input, fallback)?;
        compiled_children.push((*input, instance));
    }

    let props = (ctx.properties)(node.id());
    let mut survivors = Vec::new();
    let mut single_failure = None;
    for candidate in &candidates {
        match try_candidate(candidate, &compiled_children, props.as_ref()) {
            Ok((term, ty)) => survivors.push((candidate, term, ty)),
            Err(failing_input) if candidates.len() == 1 => single_failure = Some(failing_input),
            Err(_) => {}
        }
    }

    if survivors.is_empty() {
        if candidates.len() == 1 && !compiled_children.is_empty() {
            let i = single_failure.unwrap_or(0).min(compiled_children.len() - 1);
            let (own_input, instance) = &compiled_children[i];
            let expected = nth_param_type(&candidates[0].declared_type, i).unwrap_or_else(Type::genvar);
            ctx.messages.push(Message::TypeMissmatch(TypeMissmatch::new(*own_input, *own_input, expected, instance.ty.clone())));
        } else {
            ctx.messages.push(Message::NoValidOverloading { socket: output_socket });
        }
        return None;
    }

    if survivors.len() > 1 {
        let best = survivors.iter().map(|(c, _, _)| count_free_vars(&c.declared_type)).min().unwrap();
        let tied = survivors.iter().filter(|(c, _, _)| count_free_vars(&c.declared_type) == best).count();
        if tied > 1 {
            ctx.messages.push(Message::AmbiguousOverloading { socket: output_socket });
            return None;
        }
    }

    let (_, term, ty) = survivors.into_iter().min_by_key(|(c, _, _)| count_free_vars(&c.declared_type)).unwrap();
    Some(SocketInstance { term, ty })
}

/// Build `candidate`'s speculative application term one input at a time,
/// stopping at the first input `type_of` rejects. This stands in for
/// spec.md §4.10's separate "generalize the candidate's type, then refilter"
/// steps: `type_of` already performs the same incremental
/// `unify(applied ≡ arrow(arg, fresh))` the spec's algorithm describes per
/// input, so running it eagerly gets both the pass/fail verdict and, via
/// [`nth_param_type`], the failing input's expected type for free.
fn try_candidate(candidate: &Bind, children: &[(SocketHandle, SocketInstance)], props: Option<&PropertyNode>) -> Result<(ObjectPtr, Type), usize> {
    let mut term = candidate.instantiate(props);
    for (i, (_, child)) in children.iter().enumerate() {
        let applied = make_apply(term, child.term.clone());
        if type_of(&applied, &TypeEnv::empty()).is_err() {
            return Err(i);
        }
        term = applied;
    }
    match type_of(&term, &TypeEnv::empty()) {
        Ok((ty, _)) => Ok((term, ty)),
        Err(_) => Err(children.len().saturating_sub(1)),
    }
}

fn nth_param_type(declared: &Type, index: usize) -> Option<Type> {
    let mut t = declared.clone();
    for _ in 0..index {
        match t {
            Type::Arrow(_, ret) => t = (*ret).clone(),
            _ => return None,
        }
    }
    match t {
        Type::Arrow(dom, _) => Some((*dom).clone()),
        _ => None,
    }
}

fn count_free_vars(ty: &Type) -> usize {
    let mut out = std::collections::HashSet::<TypeVarId>::new();
    ty.free_vars(&mut out);
    out.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use crate::object::{make_value, Closure, Object, Payload, Value};
    use std::sync::Arc;

    fn int_binop(name: &str) -> Bind {
        Bind {
            node_name: name.into(),
            input_pattern: vec!["a".into(), "b".into()],
            output_name: "out".into(),
            declared_type: Type::arrow(Type::builtin_int(), Type::arrow(Type::builtin_int(), Type::builtin_int())),
            get_instance: Arc::new(|_| {
                Object::new(Payload::Closure(Closure::new(
                    "add",
                    2,
                    Type::arrow(Type::builtin_int(), Type::arrow(Type::builtin_int(), Type::builtin_int())),
                    Arc::new(|args: &[ObjectPtr]| {
                        let a = match args[0].payload() {
                            Payload::Value(Value::Int(n)) => *n,
                            _ => unreachable!(),
                        };
                        let b = match args[1].payload() {
                            Payload::Value(Value::Int(n)) => *n,
                            _ => unreachable!(),
                        };
                        Ok(make_value(Value::Int(a + b)))
                    }),
                )))
            }),
        }
    }

    fn float_binop(name: &str) -> Bind {
        Bind {
            node_name: name.into(),
            input_pattern: vec!["a".into(), "b".into()],
            output_name: "out".into(),
            declared_type: Type::arrow(Type::builtin_float(), Type::arrow(Type::builtin_float(), Type::builtin_float())),
            get_instance: Arc::new(|_| {
                Object::new(Payload::Closure(Closure::new(
                    "add",
                    2,
                    Type::arrow(Type::builtin_float(), Type::arrow(Type::builtin_float(), Type::builtin_float())),
                    Arc::new(|args: &[ObjectPtr]| {
                        let a = match args[0].payload() {
                            Payload::Value(Value::Float(n)) => *n,
                            _ => unreachable!(),
                        };
                        let b = match args[1].payload() {
                            Payload::Value(Value::Float(n)) => *n,
                            _ => unreachable!(),
                        };
                        Ok(make_value(Value::Float(a + b)))
                    }),
                )))
            }),
        }
    }

    fn add_node(sg: &StructuredNodeGraph, root: Uid, a: crate::object::ObjectPtr, b: crate::object::ObjectPtr) -> SocketHandle {
        let n = sg.with_interior(root, |g| g.add("add", &["a", "b"], &["out"], NodeKind::Normal, None)).flatten().unwrap();
        let inputs = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Input))).unwrap();
        sg.with_interior(root, |g| g.set_data(inputs[0], Some(a)));
        sg.with_interior(root, |g| g.set_data(inputs[1], Some(b)));
        let out = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Output))[0]).unwrap();
        let mirrored = sg.group_output_socket_named(root, "out").unwrap();
        sg.with_interior(root, |g| g.connect(out, mirrored, None));
        out
    }

    #[test]
    fn an_unbound_node_name_reports_no_valid_overloading() {
        let sg = StructuredNodeGraph::default();
        let root = sg.root_group();
        sg.add_output_socket(root, "out", None);
        let n = sg.with_interior(root, |g| g.add("mystery", &[], &["out"], NodeKind::Normal, None)).flatten().unwrap();
        let out = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Output))[0]).unwrap();
        let mirrored = sg.group_output_socket_named(root, "out").unwrap();
        sg.with_interior(root, |g| g.connect(out, mirrored, None));

        let registry = BindRegistry::new();
        let err = compile(&sg, &registry, root, "out").unwrap_err();
        assert!(err.all().iter().any(|m| matches!(m, Message::NoValidOverloading { .. })));
    }

    #[test]
    fn a_type_mismatched_input_reports_type_missmatch() {
        let sg = StructuredNodeGraph::default();
        let root = sg.root_group();
        sg.add_output_socket(root, "out", None);
        add_node(&sg, root, make_value(Value::Float(1.0)), make_value(Value::Int(2)));

        let mut registry = BindRegistry::new();
        registry.register(int_binop("add"));
        let err = compile(&sg, &registry, root, "out").unwrap_err();
        assert!(err.all().iter().any(|m| matches!(m, Message::TypeMissmatch(_))));
    }

    #[test]
    fn conflicting_overloads_report_no_valid_overloading() {
        let sg = StructuredNodeGraph::default();
        let root = sg.root_group();
        sg.add_output_socket(root, "out", None);
        add_node(&sg, root, make_value(Value::Int(1)), make_value(Value::Float(2.0)));

        let mut registry = BindRegistry::new();
        registry.register(int_binop("add"));
        registry.register(float_binop("add"));
        let err = compile(&sg, &registry, root, "out").unwrap_err();
        assert!(err.all().iter().any(|m| matches!(m, Message::NoValidOverloading { .. })));
    }

    #[test]
    fn a_single_matching_bind_compiles_and_types_as_int() {
        let sg = StructuredNodeGraph::default();
        let root = sg.root_group();
        sg.add_output_socket(root, "out", None);
        add_node(&sg, root, make_value(Value::Int(1)), make_value(Value::Int(2)));

        let mut registry = BindRegistry::new();
        registry.register(int_binop("add"));
        let executable = compile(&sg, &registry, root, "out").unwrap();
        assert!(executable.ty.same_type(&Type::builtin_int()));
    }

    #[test]
    fn an_all_missing_input_node_compiles_to_a_lambda() {
        let sg = StructuredNodeGraph::default();
        let root = sg.root_group();
        sg.add_output_socket(root, "out", None);
        let n = sg.with_interior(root, |g| g.add("identity", &["x"], &["out"], NodeKind::Normal, None)).flatten().unwrap();
        let out = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Output))[0]).unwrap();
        let mirrored = sg.group_output_socket_named(root, "out").unwrap();
        sg.with_interior(root, |g| g.connect(out, mirrored, None));

        let mut registry = BindRegistry::new();
        registry.register(Bind {
            node_name: "identity".into(),
            input_pattern: vec!["x".into()],
            output_name: "out".into(),
            declared_type: Type::arrow(Type::builtin_int(), Type::builtin_int()),
            get_instance: Arc::new(|_| crate::object::identity()),
        });

        let executable = compile(&sg, &registry, root, "out").unwrap();
        match executable.ty {
            Type::Arrow(_, _) => {}
            other => panic!("expected an arrow type for a lambda-wrapped node, got {other:?}"),
        }
    }

    #[test]
    fn a_function_calls_unconnected_input_falls_back_to_its_declared_default() {
        let sg = StructuredNodeGraph::default();
        let root = sg.root_group();
        sg.add_output_socket(root, "out", None);

        let decl = crate::sgraph::FunctionDecl {
            full_path: "math/inc".into(),
            doc: "".into(),
            is_public: true,
            input_names: vec!["a".into(), "b".into()],
            output_names: vec!["out".into()],
            defaults: vec![None, Some(make_value(Value::Int(41)))],
        };
        let f = sg.create_function(decl, None).unwrap();
        let call = sg.create_copy(root, f, None).unwrap();

        let a = sg.with_interior(root, |g| g.sockets(call, Some(SocketKind::Input))[0]).unwrap();
        sg.with_interior(root, |g| g.set_data(a, Some(make_value(Value::Int(1)))));
        // `b` is left unconnected with no socket-level default; only the
        // function's own declared default (41) should feed it.

        let out = sg.with_interior(root, |g| g.sockets(call, Some(SocketKind::Output))[0]).unwrap();
        let mirrored = sg.group_output_socket_named(root, "out").unwrap();
        sg.with_interior(root, |g| g.connect(out, mirrored, None));

        let mut registry = BindRegistry::new();
        registry.register(int_binop("math/inc"));
        let executable = compile(&sg, &registry, root, "out").unwrap();
        assert!(executable.ty.same_type(&Type::builtin_int()));
    }
}
