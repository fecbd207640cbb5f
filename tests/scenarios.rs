//! End-to-end scenarios spanning the structured graph, parser, and compiler
//! together (spec.md §8's seed scenarios), as opposed to the unit tests
//! colocated with each module that exercise a single layer in isolation.

use std::sync::Arc;

use yave::compiler::{compile, Bind, BindRegistry};
use yave::diagnostics::Message;
use yave::graph::{NodeKind, SocketKind};
use yave::object::{identity, make_value, Closure, Object, ObjectPtr, Payload, Value};
use yave::sgraph::StructuredNodeGraph;
use yave::types::Type;

fn int_add_bind() -> Bind {
    Bind {
        node_name: "add".into(),
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

fn identity_bind() -> Bind {
    Bind {
        node_name: "identity".into(),
        input_pattern: vec!["x".into()],
        output_name: "out".into(),
        declared_type: Type::arrow(Type::builtin_int(), Type::builtin_int()),
        get_instance: Arc::new(|_| identity()),
    }
}

/// Scenario 1: a single bound primitive node compiles to its declared
/// output type.
#[test]
fn single_primitive_compiles_to_its_output_type() {
    let sg = StructuredNodeGraph::default();
    let root = sg.root_group();
    sg.add_output_socket(root, "out", None);

    let n = sg.with_interior(root, |g| g.add("add", &["a", "b"], &["out"], NodeKind::Normal, None)).flatten().unwrap();
    let inputs = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Input))).unwrap();
    sg.with_interior(root, |g| g.set_data(inputs[0], Some(make_value(Value::Int(1)))));
    sg.with_interior(root, |g| g.set_data(inputs[1], Some(make_value(Value::Int(2)))));
    let out = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Output))[0]).unwrap();
    let mirrored = sg.group_output_socket_named(root, "out").unwrap();
    sg.with_interior(root, |g| g.connect(out, mirrored, None));

    let mut registry = BindRegistry::new();
    registry.register(int_add_bind());
    let executable = compile(&sg, &registry, root, "out").expect("should compile");
    assert!(executable.ty.same_type(&Type::builtin_int()));
}

/// Scenario 2: a node with every input unconnected and default-free
/// compiles to a `Lambda` whose type is an arrow over its own inputs.
#[test]
fn an_all_missing_input_node_compiles_to_an_arrow_type() {
    let sg = StructuredNodeGraph::default();
    let root = sg.root_group();
    sg.add_output_socket(root, "out", None);

    let n = sg.with_interior(root, |g| g.add("identity", &["x"], &["out"], NodeKind::Normal, None)).flatten().unwrap();
    let out = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Output))[0]).unwrap();
    let mirrored = sg.group_output_socket_named(root, "out").unwrap();
    sg.with_interior(root, |g| g.connect(out, mirrored, None));

    let mut registry = BindRegistry::new();
    registry.register(identity_bind());
    let executable = compile(&sg, &registry, root, "out").expect("should compile");
    match executable.ty {
        Type::Arrow(ref dom, ref ran) => {
            assert!(dom.same_type(&Type::builtin_int()));
            assert!(ran.same_type(&Type::builtin_int()));
        }
        other => panic!("expected an arrow type, got {other:?}"),
    }
}

/// Scenario 3: a node name with no registered bind at all reports
/// `no_valid_overloading` rather than panicking or silently no-oping.
#[test]
fn an_unregistered_node_name_reports_no_valid_overloading() {
    let sg = StructuredNodeGraph::default();
    let root = sg.root_group();
    sg.add_output_socket(root, "out", None);

    let n = sg.with_interior(root, |g| g.add("unknown_node", &[], &["out"], NodeKind::Normal, None)).flatten().unwrap();
    let out = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Output))[0]).unwrap();
    let mirrored = sg.group_output_socket_named(root, "out").unwrap();
    sg.with_interior(root, |g| g.connect(out, mirrored, None));

    let registry = BindRegistry::new();
    let err = compile(&sg, &registry, root, "out").unwrap_err();
    assert!(err.all().iter().any(|m| matches!(m, Message::NoValidOverloading { .. })));
}

/// Scenario 4: feeding a `Float` into an `add` bound only for `Int`
/// reports a `type_missmatch` naming the expected and provided types.
#[test]
fn a_mismatched_input_type_reports_type_missmatch() {
    let sg = StructuredNodeGraph::default();
    let root = sg.root_group();
    sg.add_output_socket(root, "out", None);

    let n = sg.with_interior(root, |g| g.add("add", &["a", "b"], &["out"], NodeKind::Normal, None)).flatten().unwrap();
    let inputs = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Input))).unwrap();
    sg.with_interior(root, |g| g.set_data(inputs[0], Some(make_value(Value::Float(1.0)))));
    sg.with_interior(root, |g| g.set_data(inputs[1], Some(make_value(Value::Int(2)))));
    let out = sg.with_interior(root, |g| g.sockets(n, Some(SocketKind::Output))[0]).unwrap();
    let mirrored = sg.group_output_socket_named(root, "out").unwrap();
    sg.with_interior(root, |g| g.connect(out, mirrored, None));

    let mut registry = BindRegistry::new();
    registry.register(int_add_bind());
    let err = compile(&sg, &registry, root, "out").unwrap_err();
    let mismatch = err.all().iter().find_map(|m| match m {
        Message::TypeMissmatch(t) => Some(t),
        _ => None,
    });
    let mismatch = mismatch.expect("expected a type_missmatch diagnostic");
    assert!(mismatch.expected_type.same_type(&Type::builtin_int()));
    assert!(mismatch.provided_type.same_type(&Type::builtin_float()));
}

/// Scenario 5: grouping a node preserves the connections crossing the new
/// group's boundary, rewired through fresh interface sockets.
#[test]
fn grouping_a_node_preserves_its_connections() {
    let sg = StructuredNodeGraph::default();
    let root = sg.root_group();
    let producer = sg.with_interior(root, |g| g.add("producer", &[], &["o"], NodeKind::Normal, None)).flatten().unwrap();
    let middle = sg.with_interior(root, |g| g.add("middle", &["i"], &["o"], NodeKind::Normal, None)).flatten().unwrap();
    let consumer = sg.with_interior(root, |g| g.add("consumer", &["i"], &[], NodeKind::Normal, None)).flatten().unwrap();
    sg.with_interior(root, |g| {
        let producer_out = g.sockets(producer, Some(SocketKind::Output))[0];
        let middle_in = g.sockets(middle, Some(SocketKind::Input))[0];
        g.connect(producer_out, middle_in, None);
        let middle_out = g.sockets(middle, Some(SocketKind::Output))[0];
        let consumer_in = g.sockets(consumer, Some(SocketKind::Input))[0];
        g.connect(middle_out, consumer_in, None);
    });

    let group = sg.create_group(root, &[middle], None).expect("grouping should succeed");

    let call_node = sg.with_interior(root, |g| g.all_nodes().into_iter().find(|n| sg.is_call(n.id()))).flatten().unwrap();
    assert_eq!(sg.get_definition(call_node.id()), Some(group));

    sg.with_interior(root, |g| {
        assert!(!g.exists_node(middle));
        let producer_out = g.sockets(producer, Some(SocketKind::Output))[0];
        let consumer_in = g.sockets(consumer, Some(SocketKind::Input))[0];
        assert_eq!(g.connections(producer_out).len(), 1);
        assert!(g.has_connection(consumer_in));

        let call_in = g.sockets(call_node, Some(SocketKind::Input));
        let call_out = g.sockets(call_node, Some(SocketKind::Output));
        assert_eq!(call_in.len(), 1);
        assert_eq!(call_out.len(), 1);
        assert!(g.has_connection(call_in[0]));
        assert!(g.has_connection(call_out[0]));
    });
}

/// Scenario 6: an edge that would close a cycle is rejected, leaving every
/// existing connection exactly as it was.
#[test]
fn a_cyclic_connection_is_rejected_and_the_graph_is_unchanged() {
    let sg = StructuredNodeGraph::default();
    let root = sg.root_group();
    let a = sg.with_interior(root, |g| g.add("a", &["i"], &["o"], NodeKind::Normal, None)).flatten().unwrap();
    let b = sg.with_interior(root, |g| g.add("b", &["i"], &["o"], NodeKind::Normal, None)).flatten().unwrap();

    sg.with_interior(root, |g| {
        let a_out = g.sockets(a, Some(SocketKind::Output))[0];
        let b_in = g.sockets(b, Some(SocketKind::Input))[0];
        g.connect(a_out, b_in, None);
    });

    let before = sg
        .with_interior(root, |g| {
            let a_in = g.sockets(a, Some(SocketKind::Input))[0];
            let b_out = g.sockets(b, Some(SocketKind::Output))[0];
            (g.connections(a_in).len(), g.connections(b_out).len())
        })
        .unwrap();

    let rejected = sg
        .with_interior(root, |g| {
            let b_out = g.sockets(b, Some(SocketKind::Output))[0];
            let a_in = g.sockets(a, Some(SocketKind::Input))[0];
            g.connect(b_out, a_in, None)
        })
        .flatten();
    assert!(rejected.is_none());

    let after = sg
        .with_interior(root, |g| {
            let a_in = g.sockets(a, Some(SocketKind::Input))[0];
            let b_out = g.sockets(b, Some(SocketKind::Output))[0];
            (g.connections(a_in).len(), g.connections(b_out).len())
        })
        .unwrap();
    assert_eq!(before, after);
}
