//! The structured node graph: functions, groups, and macros layered atop
//! [`crate::graph::BasicNodeGraph`] (spec.md §4.8).
//!
//! Grounded on the "classify, don't mutate, collect diagnostics, recurse"
//! shape the teacher's own `expr::resolver` uses for its AST (see
//! `src/parser.rs`), and on `graphix-compiler/src/env.rs`'s `ModPath` for
//! path naming (see `path.rs`). The group/function/macro distinction itself
//! has no teacher analogue — the teacher's language has no visual
//! sub-graphing — so it is built fresh in the teacher's idiom (small enums,
//! `RwLock`-guarded registries, `Option`-returning fallible mutators) per
//! the "enrich from the rest of the pack" rule, cross-checked against
//! `original_source/include/yave/node/core/structured_node_graph.hpp`.

mod path;
mod property;

pub use path::NodePath;
pub use property::{PropertyNode, PropertyValue};

use crate::graph::{BasicNodeGraph, NodeKind, SocketKind};
use crate::uid::{NodeHandle, SocketHandle, Uid};
use arcstr::ArcStr;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DefinitionKind {
    Group,
    Function,
    Macro,
}

/// A declarative function prototype (spec.md §6 `node_declaration`).
#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub full_path: ArcStr,
    pub doc: ArcStr,
    pub is_public: bool,
    pub input_names: Vec<ArcStr>,
    pub output_names: Vec<ArcStr>,
    pub defaults: Vec<Option<crate::object::ObjectPtr>>,
}

struct Definition {
    kind: DefinitionKind,
    name: ArcStr,
    parent: Option<Uid>,
    /// Interior sub-graph. Empty and unused for `Function` (functions have
    /// no visual interior — they are opaque prototypes, per spec.md §4.8).
    graph: BasicNodeGraph,
    group_input: Option<NodeHandle>,
    group_output: Option<NodeHandle>,
    input_names: Vec<ArcStr>,
    output_names: Vec<ArcStr>,
    /// Declared default argument per input, positionally aligned with
    /// `input_names`. Only ever non-empty for `Function` definitions
    /// (spec.md §6 `node_declaration`'s per-argument defaults); consulted by
    /// the compiler when a function call's input is left unconnected.
    defaults: Vec<Option<crate::object::ObjectPtr>>,
    /// `(parent_group, call node handle)` for every call currently
    /// referencing this definition, kept in sync by the mirroring
    /// operations below.
    call_sites: Vec<(Uid, NodeHandle)>,
}

/// Functions, groups, and macros: definitions plus their call sites,
/// layered atop any number of [`BasicNodeGraph`] interiors (one per
/// group/macro definition).
pub struct StructuredNodeGraph {
    definitions: RwLock<HashMap<Uid, Definition>>,
    /// call node uid ↦ (definition, parent group).
    calls: RwLock<HashMap<Uid, (Uid, Uid)>>,
    properties: RwLock<HashMap<Uid, PropertyNode>>,
    positions: RwLock<HashMap<Uid, (f32, f32)>>,
    z_order: RwLock<HashMap<Uid, u64>>,
    z_counter: AtomicU64,
    root: Uid,
}

impl Default for StructuredNodeGraph {
    fn default() -> Self {
        let root = Uid::new();
        let mut graph = BasicNodeGraph::default();
        let group_input = graph.add("group_input", &[], &[], NodeKind::Interface, None);
        let group_output = graph.add("group_output", &[], &[], NodeKind::Interface, None);
        let mut definitions = HashMap::new();
        definitions.insert(
            root,
            Definition {
                kind: DefinitionKind::Group,
                name: ArcStr::from("root"),
                parent: None,
                graph,
                group_input,
                group_output,
                input_names: Vec::new(),
                output_names: Vec::new(),
                defaults: Vec::new(),
                call_sites: Vec::new(),
            },
        );
        StructuredNodeGraph {
            definitions: RwLock::new(definitions),
            calls: RwLock::new(HashMap::new()),
            properties: RwLock::new(HashMap::new()),
            positions: RwLock::new(HashMap::new()),
            z_order: RwLock::new(HashMap::new()),
            z_counter: AtomicU64::new(0),
            root,
        }
    }
}

impl StructuredNodeGraph {
    pub fn root_group(&self) -> Uid {
        self.root
    }

    pub fn is_definition(&self, id: Uid) -> bool {
        self.definitions.read().contains_key(&id)
    }

    pub fn is_call(&self, node_uid: Uid) -> bool {
        self.calls.read().contains_key(&node_uid)
    }

    pub fn get_definition(&self, call_node_uid: Uid) -> Option<Uid> {
        self.calls.read().get(&call_node_uid).map(|(defn, _)| *defn)
    }

    pub fn get_parent_group(&self, id: Uid) -> Option<Uid> {
        if let Some(defn) = self.definitions.read().get(&id) {
            return defn.parent;
        }
        self.calls.read().get(&id).map(|(_, parent)| *parent)
    }

    /// The group's own nodes, excluding the synthetic `group_input`/
    /// `group_output` interface pair.
    pub fn get_group_members(&self, group: Uid) -> Vec<NodeHandle> {
        let defs = self.definitions.read();
        let Some(defn) = defs.get(&group) else { return Vec::new() };
        defn.graph
            .all_nodes()
            .into_iter()
            .filter(|n| Some(*n) != defn.group_input && Some(*n) != defn.group_output)
            .collect()
    }

    /// Members plus the two synthetic interface nodes.
    pub fn get_group_nodes(&self, group: Uid) -> Vec<NodeHandle> {
        let defs = self.definitions.read();
        defs.get(&group).map(|d| d.graph.all_nodes()).unwrap_or_default()
    }

    pub fn get_path(&self, id: Uid) -> NodePath {
        let mut segments = Vec::new();
        let mut current = self.get_parent_group(id);
        let mut name = self.name_of(id);
        while let Some(group) = current {
            if let Some(n) = name.take() {
                segments.push(n);
            }
            name = self.name_of(group);
            current = self.get_parent_group(group);
        }
        if let Some(n) = name {
            segments.push(n);
        }
        segments.reverse();
        segments.into_iter().fold(NodePath::root(), |p, s| p.push(s))
    }

    fn name_of(&self, id: Uid) -> Option<ArcStr> {
        if id == self.root {
            return None;
        }
        let defs = self.definitions.read();
        if let Some(defn) = defs.get(&id) {
            return Some(defn.name.clone());
        }
        let calls = self.calls.read();
        let (_, parent) = calls.get(&id)?;
        let parent_graph = &defs.get(parent)?.graph;
        parent_graph.all_nodes().iter().find(|n| n.id() == id).and_then(|n| parent_graph.get_name(*n))
    }

    /// Resolve a slash-separated path to the definition or node it names,
    /// starting from the root group.
    pub fn search_path(&self, path: &str) -> Option<Uid> {
        let parsed = NodePath::parse(path);
        let mut current_group = self.root;
        let segments = parsed.segments();
        if segments.is_empty() {
            return Some(self.root);
        }
        for segment in &segments[..segments.len() - 1] {
            let next = self.get_group_members(current_group).into_iter().find_map(|n| {
                let defs = self.definitions.read();
                let graph = &defs.get(&current_group)?.graph;
                if graph.get_name(n).as_deref() != Some(segment.as_str()) {
                    return None;
                }
                self.get_definition(n.id())
            })?;
            current_group = next;
        }
        let last = &segments[segments.len() - 1];
        let defs = self.definitions.read();
        let graph = &defs.get(&current_group)?.graph;
        graph.all_nodes().into_iter().find(|n| graph.get_name(*n).as_deref() == Some(last.as_str())).map(|n| n.id())
    }

    pub fn create_function(&self, decl: FunctionDecl, id: Option<Uid>) -> Option<Uid> {
        let uid = id.unwrap_or_else(Uid::new);
        if uid.is_nil() {
            return None;
        }
        let mut defs = self.definitions.write();
        if defs.contains_key(&uid) {
            return None;
        }
        defs.insert(
            uid,
            Definition {
                kind: DefinitionKind::Function,
                name: decl.full_path,
                parent: None,
                graph: BasicNodeGraph::default(),
                group_input: None,
                group_output: None,
                input_names: decl.input_names,
                output_names: decl.output_names,
                defaults: decl.defaults,
                call_sites: Vec::new(),
            },
        );
        Some(uid)
    }

    /// Declared default argument per input of a function definition,
    /// positionally aligned with [`Self::input_names_of`]. Empty for
    /// groups and macros.
    pub fn defaults_of(&self, defn: Uid) -> Vec<Option<crate::object::ObjectPtr>> {
        self.definitions.read().get(&defn).map(|d| d.defaults.clone()).unwrap_or_default()
    }

    /// Allocate a new group under `parent`. If `members` is non-empty,
    /// splice them into the new group's interior and rewire any connection
    /// crossing the boundary through a freshly minted interface socket
    /// (spec.md §4.8, scenario 5: "grouping preserves connections").
    pub fn create_group(&self, parent: Uid, members: &[NodeHandle], id: Option<Uid>) -> Option<Uid> {
        let group_id = id.unwrap_or_else(Uid::new);
        if group_id.is_nil() {
            return None;
        }
        let mut defs = self.definitions.write();
        if defs.contains_key(&group_id) || !defs.contains_key(&parent) {
            return None;
        }
        if !members.iter().all(|m| defs[&parent].graph.exists_node(*m)) {
            return None;
        }

        let mut interior = BasicNodeGraph::default();
        let group_input = interior.add("group_input", &[], &[], NodeKind::Interface, None)?;
        let group_output = interior.add("group_output", &[], &[], NodeKind::Interface, None)?;

        // Recreate each member inside the interior, preserving name/socket
        // shape and any attached data payload; track old → new socket handles
        // so crossing connections can be rewired below.
        let mut socket_map: HashMap<Uid, SocketHandle> = HashMap::new();
        for &old in members {
            let parent_graph = &defs.get(&parent).unwrap().graph;
            let info = parent_graph.get_node_info(old)?;
            let input_names: Vec<String> =
                info.inputs.iter().map(|s| parent_graph.get_socket_info(*s).unwrap().name.to_string()).collect();
            let output_names: Vec<String> =
                info.outputs.iter().map(|s| parent_graph.get_socket_info(*s).unwrap().name.to_string()).collect();
            let input_refs: Vec<&str> = input_names.iter().map(|s| s.as_str()).collect();
            let output_refs: Vec<&str> = output_names.iter().map(|s| s.as_str()).collect();
            let new_node = interior.add(info.name.clone(), &input_refs, &output_refs, info.kind, None)?;

            if let Some(Some(data)) = parent_graph.get_node_data(old) {
                interior.set_node_data(new_node, Some(data));
            }
            for (old_s, new_s) in info.inputs.iter().zip(interior.sockets(new_node, Some(SocketKind::Input))) {
                if let Some(Some(d)) = parent_graph.get_socket_data(*old_s) {
                    interior.set_data(new_s, Some(d));
                }
                socket_map.insert(old_s.id(), new_s);
            }
            for (old_s, new_s) in info.outputs.iter().zip(interior.sockets(new_node, Some(SocketKind::Output))) {
                if let Some(Some(d)) = parent_graph.get_socket_data(*old_s) {
                    interior.set_data(new_s, Some(d));
                }
                socket_map.insert(old_s.id(), new_s);
            }
        }

        // Wire internal connections directly; record crossing connections
        // to reroute through a new interface socket.
        struct Crossing {
            member_socket: SocketHandle, // interior socket (new)
            is_input: bool,              // direction from the member's point of view
            external: SocketHandle,      // socket on the parent side, outside the group
        }
        let mut crossings = Vec::new();
        {
            let parent_graph = &defs.get(&parent).unwrap().graph;
            for &old in members {
                let info = parent_graph.get_node_info(old)?;
                for old_in in &info.inputs {
                    let Some(conn) = parent_graph.input_connection(*old_in) else { continue };
                    let cinfo = parent_graph.get_connection_info(conn)?;
                    let producer_owner = parent_graph.get_socket_info(cinfo.output)?.owner;
                    if members.contains(&producer_owner) {
                        interior.connect(socket_map[&cinfo.output.id()], socket_map[&old_in.id()], None);
                    } else {
                        crossings.push(Crossing { member_socket: socket_map[&old_in.id()], is_input: true, external: cinfo.output });
                    }
                }
                for old_out in &info.outputs {
                    for conn in parent_graph.connections(*old_out) {
                        let cinfo = parent_graph.get_connection_info(conn)?;
                        let consumer_owner = parent_graph.get_socket_info(cinfo.input)?.owner;
                        if members.contains(&consumer_owner) {
                            continue; // handled from the consumer's input side above
                        }
                        crossings.push(Crossing { member_socket: socket_map[&old_out.id()], is_input: false, external: cinfo.input });
                    }
                }
            }
        }

        let mut call_input_names = Vec::new();
        let mut call_output_names = Vec::new();
        let mut deferred_interior_wiring = Vec::new(); // (interior socket, is_input, call-side index)
        for crossing in &crossings {
            if crossing.is_input {
                let name = format!("in{}", call_input_names.len());
                call_input_names.push(name.clone());
                deferred_interior_wiring.push((crossing.member_socket, true, name));
            } else {
                let name = format!("out{}", call_output_names.len());
                call_output_names.push(name.clone());
                deferred_interior_wiring.push((crossing.member_socket, false, name));
            }
        }
        for (member_socket, is_input, name) in &deferred_interior_wiring {
            if *is_input {
                let out = interior.add_socket(group_input, name, SocketKind::Output, None, None)?;
                interior.connect(out, *member_socket, None);
            } else {
                let inp = interior.add_socket(group_output, name, SocketKind::Input, None, None)?;
                interior.connect(*member_socket, inp, None);
            }
        }

        let call_input_refs: Vec<&str> = call_input_names.iter().map(|s| s.as_str()).collect();
        let call_output_refs: Vec<&str> = call_output_names.iter().map(|s| s.as_str()).collect();
        let group_def = Definition {
            kind: DefinitionKind::Group,
            name: ArcStr::from(format!("group_{}", group_id)),
            parent: Some(parent),
            graph: interior,
            group_input: Some(group_input),
            group_output: Some(group_output),
            input_names: call_input_names.clone(),
            output_names: call_output_names.clone(),
            defaults: Vec::new(),
            call_sites: Vec::new(),
        };
        defs.insert(group_id, group_def);

        // Create the call site node in `parent`, rewire crossings through it,
        // then remove the original members from `parent`.
        let parent_graph = &defs.get(&parent).unwrap().graph;
        let call_node = parent_graph.add(
            defs.get(&group_id).unwrap().name.clone(),
            &call_input_refs,
            &call_output_refs,
            NodeKind::Normal,
            None,
        )?;
        let call_inputs = parent_graph.sockets(call_node, Some(SocketKind::Input));
        let call_outputs = parent_graph.sockets(call_node, Some(SocketKind::Output));
        // Inputs and outputs are numbered independently, so each needs its
        // own running index into `call_inputs`/`call_outputs`.
        let mut out_idx = 0;
        let mut in_idx = 0;
        for crossing in &crossings {
            if crossing.is_input {
                parent_graph.connect(crossing.external, call_inputs[in_idx], None);
                in_idx += 1;
            } else {
                parent_graph.connect(call_outputs[out_idx], crossing.external, None);
                out_idx += 1;
            }
        }
        for &old in members {
            parent_graph.remove(old);
        }

        defs.get_mut(&group_id).unwrap().call_sites.push((parent, call_node));
        drop(defs);
        self.calls.write().insert(call_node.id(), (group_id, parent));
        Some(group_id)
    }

    /// A lightweight call to `source` (a function, group, or macro
    /// definition) inside `parent`.
    pub fn create_copy(&self, parent: Uid, source: Uid, id: Option<Uid>) -> Option<NodeHandle> {
        if source == self.root {
            return None;
        }
        let mut defs = self.definitions.write();
        if !defs.contains_key(&parent) {
            return None;
        }
        // Reject self-parenting: `source` must not be an ancestor of `parent`.
        let mut walk = Some(parent);
        while let Some(g) = walk {
            if g == source {
                return None;
            }
            walk = defs.get(&g).and_then(|d| d.parent);
        }

        let (name, input_names, output_names) = {
            let src = defs.get(&source)?;
            (src.name.clone(), src.input_names.clone(), src.output_names.clone())
        };
        let input_refs: Vec<&str> = input_names.iter().map(|s| s.as_str()).collect();
        let output_refs: Vec<&str> = output_names.iter().map(|s| s.as_str()).collect();

        let uid = id.unwrap_or_else(Uid::new);
        if uid.is_nil() {
            return None;
        }
        let call_node = defs.get(&parent)?.graph.add(name, &input_refs, &output_refs, NodeKind::Normal, Some(uid))?;
        defs.get_mut(&source)?.call_sites.push((parent, call_node));
        drop(defs);
        self.calls.write().insert(call_node.id(), (source, parent));
        Some(call_node)
    }

    /// Deep copy of `source`: recursively duplicates its interior (for
    /// groups/macros) into a brand new definition, then creates a call to
    /// that clone inside `parent` (spec.md §4.8). Unlike [`Self::create_copy`],
    /// the clone does not share `source`'s interior — editing one leaves the
    /// other untouched. A `Function` has no interior to duplicate, so
    /// cloning one behaves like [`Self::create_copy`].
    pub fn create_clone(&self, parent: Uid, source: Uid, id: Option<Uid>) -> Option<NodeHandle> {
        if source == self.root {
            return None;
        }
        let mut defs = self.definitions.write();
        if !defs.contains_key(&parent) {
            return None;
        }
        let mut walk = Some(parent);
        while let Some(g) = walk {
            if g == source {
                return None;
            }
            walk = defs.get(&g).and_then(|d| d.parent);
        }

        let (kind, name, input_names, output_names, defaults) = {
            let src = defs.get(&source)?;
            (src.kind, src.name.clone(), src.input_names.clone(), src.output_names.clone(), src.defaults.clone())
        };

        let (new_graph, new_group_input, new_group_output) = if matches!(kind, DefinitionKind::Group | DefinitionKind::Macro) {
            let src = defs.get(&source)?;
            clone_interior(&src.graph, src.group_input, src.group_output)
        } else {
            (BasicNodeGraph::default(), None, None)
        };

        let new_defn_id = Uid::new();
        defs.insert(
            new_defn_id,
            Definition {
                kind,
                name: name.clone(),
                parent: if matches!(kind, DefinitionKind::Group | DefinitionKind::Macro) { Some(parent) } else { None },
                graph: new_graph,
                group_input: new_group_input,
                group_output: new_group_output,
                input_names: input_names.clone(),
                output_names: output_names.clone(),
                defaults,
                call_sites: Vec::new(),
            },
        );

        let input_refs: Vec<&str> = input_names.iter().map(|s| s.as_str()).collect();
        let output_refs: Vec<&str> = output_names.iter().map(|s| s.as_str()).collect();
        let uid = id.unwrap_or_else(Uid::new);
        if uid.is_nil() {
            return None;
        }
        let call_node = defs.get(&parent)?.graph.add(name, &input_refs, &output_refs, NodeKind::Normal, Some(uid))?;
        defs.get_mut(&new_defn_id)?.call_sites.push((parent, call_node));
        drop(defs);
        self.calls.write().insert(call_node.id(), (new_defn_id, parent));
        Some(call_node)
    }

    /// Inverse of [`Self::create_group`]: splice `call_node`'s referenced
    /// group/macro interior back out into `parent`, reconnecting around the
    /// removed interface, then drop the call and (if it held the
    /// definition's last call site) the definition itself (spec.md §4.8).
    pub fn ungroup(&self, parent: Uid, call_node: NodeHandle) -> bool {
        let mut defs = self.definitions.write();
        if !defs.contains_key(&parent) {
            return false;
        }
        let Some(group_id) = self.calls.read().get(&call_node.id()).map(|(defn, _)| *defn) else { return false };
        let Some(kind) = defs.get(&group_id).map(|d| d.kind) else { return false };
        if !matches!(kind, DefinitionKind::Group | DefinitionKind::Macro) {
            return false;
        }
        if !defs.get(&parent).unwrap().graph.exists_node(call_node) {
            return false;
        }

        // Snapshot the call's own external wiring before touching anything.
        let (external_inputs, external_outputs) = {
            let parent_graph = &defs.get(&parent).unwrap().graph;
            let call_inputs = parent_graph.sockets(call_node, Some(SocketKind::Input));
            let call_outputs = parent_graph.sockets(call_node, Some(SocketKind::Output));
            let external_inputs: Vec<Option<SocketHandle>> = call_inputs
                .iter()
                .map(|s| parent_graph.input_connection(*s).and_then(|c| parent_graph.get_connection_info(c)).map(|c| c.output))
                .collect();
            let external_outputs: Vec<Vec<SocketHandle>> = call_outputs
                .iter()
                .map(|s| {
                    parent_graph
                        .connections(*s)
                        .iter()
                        .filter_map(|c| parent_graph.get_connection_info(*c))
                        .map(|c| c.input)
                        .collect()
                })
                .collect();
            (external_inputs, external_outputs)
        };

        let (group_input, group_output) = {
            let d = defs.get(&group_id).unwrap();
            (d.group_input, d.group_output)
        };
        let members: Vec<NodeHandle> = defs
            .get(&group_id)
            .unwrap()
            .graph
            .all_nodes()
            .into_iter()
            .filter(|n| Some(*n) != group_input && Some(*n) != group_output)
            .collect();

        // Recreate every interior member directly inside `parent` — the
        // mirror image of `create_group`'s splice-in.
        let mut socket_map: HashMap<Uid, SocketHandle> = HashMap::new();
        for &old in &members {
            let interior = &defs.get(&group_id).unwrap().graph;
            let parent_graph = &defs.get(&parent).unwrap().graph;
            let Some((_new_node, mapped)) = recreate_node(interior, parent_graph, old) else { continue };
            socket_map.extend(mapped);
        }

        // Internal member-to-member connections, recreated directly.
        {
            let interior = &defs.get(&group_id).unwrap().graph;
            let parent_graph = &defs.get(&parent).unwrap().graph;
            for &old in &members {
                let Some(info) = interior.get_node_info(old) else { continue };
                for old_in in &info.inputs {
                    let Some(conn) = interior.input_connection(*old_in) else { continue };
                    let Some(cinfo) = interior.get_connection_info(conn) else { continue };
                    let Some(producer_owner) = interior.get_socket_info(cinfo.output).map(|i| i.owner) else { continue };
                    if members.contains(&producer_owner) {
                        if let (Some(&new_out), Some(&new_in)) = (socket_map.get(&cinfo.output.id()), socket_map.get(&old_in.id())) {
                            parent_graph.connect(new_out, new_in, None);
                        }
                    }
                }
            }
        }

        // Reconnect crossing edges around the removed interface using the
        // call's own external wiring captured above.
        {
            let interior = &defs.get(&group_id).unwrap().graph;
            let parent_graph = &defs.get(&parent).unwrap().graph;
            if let Some(group_input) = group_input {
                let mirrored_outputs = interior.sockets(group_input, Some(SocketKind::Output));
                for (idx, mirrored_out) in mirrored_outputs.iter().enumerate() {
                    let Some(external_src) = external_inputs.get(idx).copied().flatten() else { continue };
                    for conn in interior.connections(*mirrored_out) {
                        let Some(cinfo) = interior.get_connection_info(conn) else { continue };
                        if let Some(&new_in) = socket_map.get(&cinfo.input.id()) {
                            parent_graph.connect(external_src, new_in, None);
                        }
                    }
                }
            }
            if let Some(group_output) = group_output {
                let mirrored_inputs = interior.sockets(group_output, Some(SocketKind::Input));
                for (idx, mirrored_in) in mirrored_inputs.iter().enumerate() {
                    let Some(conn) = interior.input_connection(*mirrored_in) else { continue };
                    let Some(cinfo) = interior.get_connection_info(conn) else { continue };
                    let Some(&new_out) = socket_map.get(&cinfo.output.id()) else { continue };
                    for external_dst in external_outputs.get(idx).cloned().unwrap_or_default() {
                        parent_graph.connect(new_out, external_dst, None);
                    }
                }
            }
        }

        defs.get(&parent).unwrap().graph.remove(call_node);
        self.calls.write().remove(&call_node.id());
        let remaining = {
            let d = defs.get_mut(&group_id).unwrap();
            d.call_sites.retain(|(p, c)| !(*p == parent && *c == call_node));
            d.call_sites.len()
        };
        if remaining == 0 {
            defs.remove(&group_id);
        }
        true
    }

    pub fn set_name(&self, defn: Uid, name: impl Into<ArcStr>) -> bool {
        let mut defs = self.definitions.write();
        match defs.get_mut(&defn) {
            Some(d) => {
                d.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Adds a socket to a group/macro definition, mirrored to the interior
    /// `group_input`/`group_output` node and to every call site.
    pub fn add_input_socket(&self, defn: Uid, name: impl Into<ArcStr>, index: Option<usize>) -> bool {
        self.add_socket(defn, name, SocketKind::Input, index)
    }

    pub fn add_output_socket(&self, defn: Uid, name: impl Into<ArcStr>, index: Option<usize>) -> bool {
        self.add_socket(defn, name, SocketKind::Output, index)
    }

    fn add_socket(&self, defn: Uid, name: impl Into<ArcStr>, kind: SocketKind, index: Option<usize>) -> bool {
        let name = name.into();
        let mut defs = self.definitions.write();
        let Some(d) = defs.get_mut(&defn) else { return false };
        if !matches!(d.kind, DefinitionKind::Group | DefinitionKind::Macro) {
            return false;
        }
        let names = match kind {
            SocketKind::Input => &mut d.input_names,
            SocketKind::Output => &mut d.output_names,
        };
        match index {
            Some(i) if i <= names.len() => names.insert(i, name.clone()),
            _ => names.push(name.clone()),
        }

        let interior_node = match kind {
            SocketKind::Input => d.group_input,
            SocketKind::Output => d.group_output,
        };
        // group_input exposes the definition's inputs as its own *outputs*
        // (so interior consumers read from them), symmetrically for output.
        let mirrored_kind = match kind {
            SocketKind::Input => SocketKind::Output,
            SocketKind::Output => SocketKind::Input,
        };
        if let Some(interior_node) = interior_node {
            d.graph.add_socket(interior_node, name.clone(), mirrored_kind, index, None);
        }
        let call_sites = d.call_sites.clone();
        drop(defs);
        let defs = self.definitions.read();
        for (parent_group, call_node) in call_sites {
            if let Some(parent_def) = defs.get(&parent_group) {
                parent_def.graph.add_socket(call_node, name.clone(), kind, index, None);
            }
        }
        true
    }

    pub fn set_socket_name(&self, defn: Uid, is_input: bool, index: usize, name: impl Into<ArcStr>) -> bool {
        let name = name.into();
        let mut defs = self.definitions.write();
        let Some(d) = defs.get_mut(&defn) else { return false };
        if !matches!(d.kind, DefinitionKind::Group | DefinitionKind::Macro) {
            return false;
        }
        let names = if is_input { &mut d.input_names } else { &mut d.output_names };
        match names.get_mut(index) {
            Some(n) => *n = name,
            None => return false,
        }
        true
    }

    pub fn set_pos(&self, node_uid: Uid, pos: (f32, f32)) {
        self.positions.write().insert(node_uid, pos);
    }

    pub fn get_pos(&self, node_uid: Uid) -> Option<(f32, f32)> {
        self.positions.read().get(&node_uid).copied()
    }

    pub fn set_property(&self, h: Uid, path: &[&str], value: PropertyValue) {
        self.properties.write().entry(h).or_default().set(path, value);
    }

    pub fn get_property(&self, h: Uid, path: &[&str]) -> Option<PropertyNode> {
        self.properties.read().get(&h)?.get(path).cloned()
    }

    pub fn bring_front(&self, node_uid: Uid) -> u64 {
        let z = self.z_counter.fetch_add(1, Ordering::Relaxed);
        self.z_order.write().insert(node_uid, z);
        z
    }

    pub fn definition_kind(&self, defn: Uid) -> Option<DefinitionKind> {
        self.definitions.read().get(&defn).map(|d| d.kind)
    }

    pub fn input_names_of(&self, defn: Uid) -> Vec<ArcStr> {
        self.definitions.read().get(&defn).map(|d| d.input_names.clone()).unwrap_or_default()
    }

    pub fn output_names_of(&self, defn: Uid) -> Vec<ArcStr> {
        self.definitions.read().get(&defn).map(|d| d.output_names.clone()).unwrap_or_default()
    }

    pub fn group_output_node(&self, defn: Uid) -> Option<NodeHandle> {
        self.definitions.read().get(&defn)?.group_output
    }

    pub fn group_input_node(&self, defn: Uid) -> Option<NodeHandle> {
        self.definitions.read().get(&defn)?.group_input
    }

    /// Look up the `group_output` interior socket mirroring `defn`'s
    /// declared output named `name` — used by the parser to cross from a
    /// group-call's requested output into that group's interior (spec.md
    /// §4.9 step 3).
    pub fn group_output_socket_named(&self, defn: Uid, name: &str) -> Option<SocketHandle> {
        let defs = self.definitions.read();
        let d = defs.get(&defn)?;
        let output = d.group_output?;
        d.graph.sockets(output, Some(SocketKind::Input)).into_iter().find(|s| d.graph.get_socket_info(*s).unwrap().name.as_str() == name)
    }

    /// Run `f` against the interior graph of `group`, holding the read lock
    /// only for the duration of the call.
    pub fn with_interior<R>(&self, group: Uid, f: impl FnOnce(&BasicNodeGraph) -> R) -> Option<R> {
        let defs = self.definitions.read();
        Some(f(&defs.get(&group)?.graph))
    }
}

/// Recreate `old`'s socket shape, node payload, and socket data as a fresh
/// node inside `dest`, returning the new handle plus the old→new socket id
/// mapping contributed by it. Shared by [`StructuredNodeGraph::ungroup`] and
/// [`clone_interior`]; `create_group` has its own copy of this loop inline
/// since it additionally needs to track crossing connections as it goes.
fn recreate_node(src: &BasicNodeGraph, dest: &BasicNodeGraph, old: NodeHandle) -> Option<(NodeHandle, Vec<(Uid, SocketHandle)>)> {
    let info = src.get_node_info(old)?;
    let input_names: Vec<String> = info.inputs.iter().map(|s| src.get_socket_info(*s).unwrap().name.to_string()).collect();
    let output_names: Vec<String> = info.outputs.iter().map(|s| src.get_socket_info(*s).unwrap().name.to_string()).collect();
    let input_refs: Vec<&str> = input_names.iter().map(|s| s.as_str()).collect();
    let output_refs: Vec<&str> = output_names.iter().map(|s| s.as_str()).collect();
    let new_node = dest.add(info.name.clone(), &input_refs, &output_refs, info.kind, None)?;

    if let Some(Some(data)) = src.get_node_data(old) {
        dest.set_node_data(new_node, Some(data));
    }
    let mut mapped = Vec::with_capacity(info.inputs.len() + info.outputs.len());
    for (old_s, new_s) in info.inputs.iter().zip(dest.sockets(new_node, Some(SocketKind::Input))) {
        if let Some(Some(d)) = src.get_socket_data(*old_s) {
            dest.set_data(new_s, Some(d));
        }
        mapped.push((old_s.id(), new_s));
    }
    for (old_s, new_s) in info.outputs.iter().zip(dest.sockets(new_node, Some(SocketKind::Output))) {
        if let Some(Some(d)) = src.get_socket_data(*old_s) {
            dest.set_data(new_s, Some(d));
        }
        mapped.push((old_s.id(), new_s));
    }
    Some((new_node, mapped))
}

/// Deep-copy an entire group/macro interior (including the synthetic
/// `group_input`/`group_output` pair) into a fresh [`BasicNodeGraph`],
/// recreating every internal connection. Used by
/// [`StructuredNodeGraph::create_clone`].
fn clone_interior(src: &BasicNodeGraph, src_group_input: Option<NodeHandle>, src_group_output: Option<NodeHandle>) -> (BasicNodeGraph, Option<NodeHandle>, Option<NodeHandle>) {
    let dest = BasicNodeGraph::default();
    let all = src.all_nodes();
    let mut node_map: HashMap<Uid, NodeHandle> = HashMap::new();
    let mut socket_map: HashMap<Uid, SocketHandle> = HashMap::new();

    for &old in &all {
        let Some((new_node, mapped)) = recreate_node(src, &dest, old) else { continue };
        socket_map.extend(mapped);
        node_map.insert(old.id(), new_node);
    }

    for &old in &all {
        let Some(info) = src.get_node_info(old) else { continue };
        for old_in in &info.inputs {
            let Some(conn) = src.input_connection(*old_in) else { continue };
            let Some(cinfo) = src.get_connection_info(conn) else { continue };
            if let (Some(&new_out), Some(&new_in)) = (socket_map.get(&cinfo.output.id()), socket_map.get(&old_in.id())) {
                dest.connect(new_out, new_in, None);
            }
        }
    }

    let new_group_input = src_group_input.and_then(|n| node_map.get(&n.id()).copied());
    let new_group_output = src_group_output.and_then(|n| node_map.get(&n.id()).copied());
    (dest, new_group_input, new_group_output)
}
