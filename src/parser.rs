//! The node-graph parser (spec.md §4.9).
//!
//! A read-only DFS from a designated output socket that classifies every
//! input socket it passes through and recurses into group/macro interiors.
//! Shaped after the teacher's `expr::resolver` (`graphix-compiler/src/expr/resolver.rs`):
//! a pass that only classifies and collects diagnostics, never mutates the
//! tree it walks, even though the teacher resolves names in an AST rather
//! than sockets in a graph.

use crate::diagnostics::{Message, MessageMap};
use crate::graph::{BasicNodeGraph, SocketKind};
use crate::sgraph::{DefinitionKind, StructuredNodeGraph};
use crate::uid::{NodeHandle, SocketHandle};
use std::collections::HashSet;

/// Parse the term rooted at `output_socket`, an output socket owned by some
/// node inside `group`'s interior. Never mutates `sg`.
///
/// Step 1 (spec.md §4.9): `group` — the callable unit being parsed — must
/// itself be a function or group; `with_interior` otherwise quietly
/// produces nothing to iterate, which would report zero errors for a
/// nonsensical request (e.g. a `Function` uid, which has no interior at
/// all) instead of the `unexpected_error` the source's `check()` raises.
pub fn parse(sg: &StructuredNodeGraph, group: crate::uid::Uid, output_socket: SocketHandle) -> MessageMap {
    let mut messages = MessageMap::new();
    if !matches!(sg.definition_kind(group), Some(DefinitionKind::Group) | Some(DefinitionKind::Macro)) {
        messages.push(Message::UnexpectedParseError("requested group is not a function or group".into()));
        return messages;
    }

    let mut visited = HashSet::new();
    sg.with_interior(group, |graph| {
        match graph.get_socket_info(output_socket) {
            Some(info) if info.kind == SocketKind::Output => {
                visit(sg, graph, info.owner, output_socket, &mut messages, &mut visited);
            }
            _ => messages.push(Message::UnexpectedParseError("requested socket is not an output socket of this group".into())),
        }
    });
    messages
}

/// Resolve a root group's declared output name to the socket currently
/// feeding it, by peeking through its `group_output` interface — the usual
/// entry point a compile driver uses (spec.md §4.10, "root output socket").
pub fn resolve_group_output(sg: &StructuredNodeGraph, group: crate::uid::Uid, output_name: &str) -> Option<SocketHandle> {
    let mirrored_input = sg.group_output_socket_named(group, output_name)?;
    sg.with_interior(group, |graph| {
        let conn = graph.input_connection(mirrored_input)?;
        Some(graph.get_connection_info(conn)?.output)
    })?
}

/// Whether `node` (viewed from `graph`) has at least one input socket and
/// every one is unconnected with no default — the λ-abstraction case of
/// spec.md §4.9 step 2, reused as-is by the compiler when it decides
/// whether a group/macro call compiles to a `Lambda`.
pub(crate) fn is_lambda_node(graph: &BasicNodeGraph, node: NodeHandle) -> bool {
    let inputs = graph.sockets(node, Some(SocketKind::Input));
    !inputs.is_empty() && inputs.iter().all(|s| !graph.has_connection(*s) && graph.get_socket_data(*s).flatten().is_none())
}

fn visit(
    sg: &StructuredNodeGraph,
    graph: &BasicNodeGraph,
    node: NodeHandle,
    output_socket: SocketHandle,
    messages: &mut MessageMap,
    visited: &mut HashSet<crate::uid::Uid>,
) {
    if !visited.insert(output_socket.id()) {
        return;
    }
    messages.push(Message::HasOutputConnection { node, socket: output_socket });

    let inputs = graph.sockets(node, Some(SocketKind::Input));
    // A function call's own declared per-argument defaults (spec.md §6
    // `node_declaration`) count as a default just as much as socket-attached
    // data does — empty for anything that isn't a function call, so this
    // changes nothing for primitives, groups, or macros.
    let call_defaults = sg.get_definition(node.id()).map(|defn| sg.defaults_of(defn)).unwrap_or_default();
    let has_default = |i: usize, s: SocketHandle| {
        graph.get_socket_data(s).flatten().is_some() || call_defaults.get(i).is_some_and(Option::is_some)
    };
    let all_missing = inputs.iter().enumerate().all(|(i, s)| !graph.has_connection(*s) && !has_default(i, *s));

    if all_missing && !inputs.is_empty() {
        messages.push(Message::IsLambdaNode { node });
    } else {
        for (i, input) in inputs.iter().enumerate() {
            if graph.has_connection(*input) {
                messages.push(Message::HasInputConnection { node, socket: *input });
                if let Some(conn) = graph.input_connection(*input) {
                    if let Some(cinfo) = graph.get_connection_info(conn) {
                        let producer_owner = graph.get_socket_info(cinfo.output).unwrap().owner;
                        visit(sg, graph, producer_owner, cinfo.output, messages, visited);
                    }
                }
            } else if has_default(i, *input) {
                messages.push(Message::HasDefaultArgument { node, socket: *input });
            } else {
                messages.push(Message::MissingInput { node, socket: *input });
            }
        }
    }

    // Step 3: a group/macro call delegates its output to its interior's
    // `group_output`; dive in and recurse from there too.
    if let Some(defn) = sg.get_definition(node.id()) {
        if matches!(sg.definition_kind(defn), Some(DefinitionKind::Group) | Some(DefinitionKind::Macro)) {
            let out_name = graph.get_socket_info(output_socket).unwrap().name;
            if let Some(interior_input) = sg.group_output_socket_named(defn, out_name.as_str()) {
                let group_output_node = sg.group_output_node(defn).unwrap();
                let is_lambda = all_missing && !inputs.is_empty();
                sg.with_interior(defn, |interior_graph| {
                    if interior_graph.has_connection(interior_input) {
                        if let Some(conn) = interior_graph.input_connection(interior_input) {
                            if let Some(cinfo) = interior_graph.get_connection_info(conn) {
                                let producer_owner = interior_graph.get_socket_info(cinfo.output).unwrap().owner;
                                visit(sg, interior_graph, producer_owner, cinfo.output, messages, visited);
                            }
                        }
                    } else if !is_lambda {
                        messages.push(Message::MissingOutput { node: group_output_node, socket: interior_input });
                    }
                });
            } else {
                messages.push(Message::UnexpectedParseError(format!("group has no output named {out_name}")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;

    #[test]
    fn single_primitive_parses_cleanly() {
        let sg = StructuredNodeGraph::default();
        let root = sg.root_group();
        sg.add_output_socket(root, "out", None);
        let n = sg
            .with_interior(root, |g| g.add("Int", &[], &["value"], NodeKind::Normal, None))
            .flatten()
            .unwrap();
        let out_socket = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Output))[0]).unwrap();
        let mirrored = sg.group_output_socket_named(root, "out").unwrap();
        sg.with_interior(root, |g| g.connect(out_socket, mirrored, None));

        let messages = parse(&sg, root, out_socket);
        assert!(!messages.has_errors());
    }

    #[test]
    fn an_unconnected_required_input_is_a_parse_error() {
        let sg = StructuredNodeGraph::default();
        let root = sg.root_group();
        let n = sg
            .with_interior(root, |g| g.add("add", &["a", "b"], &["out"], NodeKind::Normal, None))
            .flatten()
            .unwrap();
        let a = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Input))[0]).unwrap();
        let data = crate::object::make_value(crate::object::Value::Int(1));
        sg.with_interior(root, |g| g.set_data(a, Some(data)));
        let out = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Output))[0]).unwrap();

        let messages = parse(&sg, root, out);
        assert!(messages.has_errors());
        assert!(messages.all().iter().any(|m| matches!(m, Message::MissingInput { .. })));
    }

    #[test]
    fn all_inputs_unconnected_is_a_lambda_node() {
        let sg = StructuredNodeGraph::default();
        let root = sg.root_group();
        let n = sg
            .with_interior(root, |g| g.add("identity", &["x"], &["out"], NodeKind::Normal, None))
            .flatten()
            .unwrap();
        let out = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Output))[0]).unwrap();

        let messages = parse(&sg, root, out);
        assert!(!messages.has_errors());
        assert!(messages.all().iter().any(|m| matches!(m, Message::IsLambdaNode { .. })));
    }

    #[test]
    fn parsing_a_function_uid_as_the_owning_group_is_rejected() {
        let sg = StructuredNodeGraph::default();
        let root = sg.root_group();
        let n = sg
            .with_interior(root, |g| g.add("Int", &[], &["value"], NodeKind::Normal, None))
            .flatten()
            .unwrap();
        let out_socket = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Output))[0]).unwrap();

        let decl = crate::sgraph::FunctionDecl {
            full_path: "math/inc".into(),
            doc: "".into(),
            is_public: true,
            input_names: vec!["x".into()],
            output_names: vec!["out".into()],
            defaults: vec![None],
        };
        let f = sg.create_function(decl, None).unwrap();

        let messages = parse(&sg, f, out_socket);
        assert!(messages.has_errors());
        assert!(messages.all().iter().any(|m| matches!(m, Message::UnexpectedParseError(_))));
    }

    #[test]
    fn a_functions_declared_default_counts_as_a_default_not_a_missing_input() {
        let sg = StructuredNodeGraph::default();
        let root = sg.root_group();
        sg.add_output_socket(root, "out", None);

        let default_value = crate::object::make_value(crate::object::Value::Int(9));
        let decl = crate::sgraph::FunctionDecl {
            full_path: "math/inc".into(),
            doc: "".into(),
            is_public: true,
            input_names: vec!["x".into()],
            output_names: vec!["out".into()],
            defaults: vec![Some(default_value)],
        };
        let f = sg.create_function(decl, None).unwrap();
        let call = sg.create_copy(root, f, None).unwrap();

        let out_socket = sg.with_interior(root, |g| g.sockets(call, Some(SocketKind::Output))[0]).unwrap();
        let mirrored = sg.group_output_socket_named(root, "out").unwrap();
        sg.with_interior(root, |g| g.connect(out_socket, mirrored, None));

        let messages = parse(&sg, root, out_socket);
        assert!(!messages.has_errors());
        assert!(messages.all().iter().any(|m| matches!(m, Message::HasDefaultArgument { .. })));
        assert!(!messages.all().iter().any(|m| matches!(m, Message::MissingInput { .. })));
    }
}
