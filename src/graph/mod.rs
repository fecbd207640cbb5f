//! The basic node graph (spec.md §3, §4.7).
//!
//! A multigraph of nodes, directed input→output socket connections, and
//! interface nodes that borrow sockets owned elsewhere. Grounded on
//! `meew0-samaku`'s `src/nde/graph.rs` for the "DFS with a per-node
//! visited/on-path flag rejects cycles" shape the teacher crate itself has
//! no analogue for, and on `GraphiteEditor-Graphite`'s
//! `network_interface.rs` for keeping socket/connection lists in
//! *insertion* order (deterministic iteration, spec.md §4.7) via
//! `indexmap`.

mod connection;
mod node;
mod socket;

pub use connection::ConnectionData;
pub use node::NodeKind;
pub use socket::SocketKind;

use connection::ConnectionData as Connection;
use node::NodeData;
use socket::SocketData;

use crate::arena::Arena;
use crate::uid::{ConnectionHandle, NodeHandle, SocketHandle, Uid};
use arcstr::ArcStr;
use parking_lot::RwLock;

/// Pre-sizing hints only — never a hard cap (SPEC_FULL.md §1.3).
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub expected_nodes: usize,
    pub expected_sockets_per_node: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits { expected_nodes: 64, expected_sockets_per_node: 4 }
    }
}

#[derive(Clone, Debug)]
pub struct NodeInfo {
    pub name: ArcStr,
    pub kind: NodeKind,
    pub inputs: Vec<SocketHandle>,
    pub outputs: Vec<SocketHandle>,
}

#[derive(Clone, Debug)]
pub struct SocketInfo {
    pub name: ArcStr,
    pub kind: SocketKind,
    pub owner: NodeHandle,
}

#[derive(Clone, Copy, Debug)]
pub struct ConnectionInfo {
    pub output: SocketHandle,
    pub input: SocketHandle,
}

struct Storage {
    nodes: Arena<NodeData>,
    sockets: Arena<SocketData>,
    connections: Arena<Connection>,
}

/// The mutable multigraph. Reads may run concurrently with other reads;
/// writers are serialized — both enforced by wrapping the storage in a
/// single `RwLock` (spec.md §5), rather than leaving that discipline to
/// every caller.
pub struct BasicNodeGraph {
    storage: RwLock<Storage>,
}

/// Panic with an `anyhow`-formatted "BUG: ..." message, the teacher's idiom
/// for conditions that are unreachable if the rest of this module is
/// correct (e.g. an arena entry missing immediately after its own
/// insertion). Every public method here stays infallible (`Option`/`bool`)
/// since callers treat absence as "no such node/socket", not as a failure
/// to recover from — only these truly-internal lookups route through here.
fn bug(msg: impl std::fmt::Display) -> ! {
    panic!("{}", anyhow::anyhow!("BUG: {msg}"));
}

impl Default for BasicNodeGraph {
    fn default() -> Self {
        Self::with_limits(Limits::default())
    }
}

impl BasicNodeGraph {
    pub fn with_limits(limits: Limits) -> Self {
        BasicNodeGraph {
            storage: RwLock::new(Storage {
                nodes: Arena::with_capacity(limits.expected_nodes),
                sockets: Arena::with_capacity(limits.expected_nodes * limits.expected_sockets_per_node),
                connections: Arena::with_capacity(limits.expected_nodes),
            }),
        }
    }

    /// Create a node with freshly-owned sockets for each name in `inputs`
    /// and `outputs`. Returns `None` only if `id` collides with the nil uid.
    pub fn add(
        &self,
        name: impl Into<ArcStr>,
        inputs: &[&str],
        outputs: &[&str],
        kind: NodeKind,
        id: Option<Uid>,
    ) -> Option<NodeHandle> {
        let uid = id.unwrap_or_else(Uid::new);
        if uid.is_nil() {
            return None;
        }
        let mut storage = self.storage.write();
        let descriptor = storage.nodes.insert(uid, NodeData::new(name.into(), kind));
        let node_handle = NodeHandle::new(descriptor, uid);

        for input_name in inputs {
            let socket_uid = Uid::new();
            let sd = storage.sockets.insert(socket_uid, SocketData::new((*input_name).into(), SocketKind::Input, node_handle));
            let handle = SocketHandle::new(sd, socket_uid);
            storage.nodes.get_mut(descriptor).unwrap_or_else(|| bug("node missing immediately after insert")).inputs.push(handle);
        }
        for output_name in outputs {
            let socket_uid = Uid::new();
            let sd = storage.sockets.insert(socket_uid, SocketData::new((*output_name).into(), SocketKind::Output, node_handle));
            let handle = SocketHandle::new(sd, socket_uid);
            storage.nodes.get_mut(descriptor).unwrap_or_else(|| bug("node missing immediately after insert")).outputs.push(handle);
        }

        log::trace!("created node {name:?}", name = node_handle.id());
        Some(node_handle)
    }

    /// Remove `node`: detach every socket it owns, drop any connection that
    /// referenced them, and destroy the node itself.
    pub fn remove(&self, node: NodeHandle) -> bool {
        let mut storage = self.storage.write();
        if !storage.nodes.contains(node) {
            return false;
        }
        let (inputs, outputs) = {
            let data = storage.nodes.get(node.descriptor).unwrap_or_else(|| bug("node vanished under the write lock between the contains() check and this lookup"));
            (data.inputs.clone(), data.outputs.clone())
        };
        for socket in inputs.into_iter().chain(outputs.into_iter()) {
            remove_socket_locked(&mut storage, socket);
        }
        storage.nodes.remove(node.descriptor);
        log::trace!("removed node {}", node.id());
        true
    }

    /// Create a new socket owned by `node`, inserted at `index` (default:
    /// appended) among sockets of the same direction. Used both by
    /// higher layers mirroring a socket change across a definition's
    /// interior/call sites, and to grow `group_input`/`group_output`.
    pub fn add_socket(
        &self,
        node: NodeHandle,
        name: impl Into<ArcStr>,
        kind: SocketKind,
        index: Option<usize>,
        id: Option<Uid>,
    ) -> Option<SocketHandle> {
        let uid = id.unwrap_or_else(Uid::new);
        if uid.is_nil() {
            return None;
        }
        let mut storage = self.storage.write();
        if !storage.nodes.contains(node) {
            return None;
        }
        let descriptor = storage.sockets.insert(uid, SocketData::new(name.into(), kind, node));
        let handle = SocketHandle::new(descriptor, uid);
        let bucket = match kind {
            SocketKind::Input => &mut storage.nodes.get_mut(node.descriptor).unwrap_or_else(|| bug("node vanished under the write lock between the contains() check and this lookup")).inputs,
            SocketKind::Output => &mut storage.nodes.get_mut(node.descriptor).unwrap_or_else(|| bug("node vanished under the write lock between the contains() check and this lookup")).outputs,
        };
        match index {
            Some(i) if i <= bucket.len() => bucket.insert(i, handle),
            _ => bucket.push(handle),
        }
        Some(handle)
    }

    /// Destroy a socket, along with any connection and interface
    /// attachments referencing it.
    pub fn remove_socket(&self, socket: SocketHandle) -> bool {
        let mut storage = self.storage.write();
        if !storage.sockets.contains(socket) {
            return false;
        }
        let owner = storage.sockets.get(socket.descriptor).unwrap_or_else(|| bug("socket vanished under the write lock between the contains() check and this lookup")).owner;
        remove_socket_locked(&mut storage, socket);
        if let Some(data) = storage.nodes.get_mut(owner.descriptor) {
            data.inputs.retain(|s| *s != socket);
            data.outputs.retain(|s| *s != socket);
        }
        true
    }

    /// All live nodes, in arena (creation) order.
    pub fn all_nodes(&self) -> Vec<NodeHandle> {
        let storage = self.storage.read();
        storage
            .nodes
            .iter()
            .map(|(descriptor, _)| NodeHandle::new(descriptor, storage.nodes.uid_of(descriptor).unwrap()))
            .collect()
    }

    /// Idempotently register `socket` as also exposed by `interface`.
    pub fn attach_interface(&self, interface: NodeHandle, socket: SocketHandle) -> bool {
        let mut storage = self.storage.write();
        if !storage.nodes.contains(interface) || !storage.sockets.contains(socket) {
            return false;
        }
        let already = storage.sockets.get(socket.descriptor).unwrap_or_else(|| bug("socket vanished under the write lock between the contains() check and this lookup")).interfaces.contains(&interface);
        if !already {
            storage.sockets.get_mut(socket.descriptor).unwrap_or_else(|| bug("socket vanished under the write lock between the contains() check and this lookup")).interfaces.push(interface);
            let kind = storage.sockets.get(socket.descriptor).unwrap_or_else(|| bug("socket vanished under the write lock between the contains() check and this lookup")).kind;
            let bucket = match kind {
                SocketKind::Input => &mut storage.nodes.get_mut(interface.descriptor).unwrap_or_else(|| bug("interface node vanished under the write lock between the contains() check and this lookup")).inputs,
                SocketKind::Output => &mut storage.nodes.get_mut(interface.descriptor).unwrap_or_else(|| bug("interface node vanished under the write lock between the contains() check and this lookup")).outputs,
            };
            if !bucket.contains(&socket) {
                bucket.push(socket);
            }
        }
        true
    }

    /// Connect `src` (an output socket) to `dst` (an input socket).
    /// Fails (returns `None`) if either socket has the wrong direction, if
    /// `dst` already has a connection, or if the edge would close a cycle
    /// (spec.md §4.7). If an identical connection already exists, its
    /// handle is returned instead of creating a duplicate.
    pub fn connect(&self, src: SocketHandle, dst: SocketHandle, id: Option<Uid>) -> Option<ConnectionHandle> {
        let mut storage = self.storage.write();
        if !storage.sockets.contains(src) || !storage.sockets.contains(dst) {
            return None;
        }
        if storage.sockets.get(src.descriptor).unwrap_or_else(|| bug("socket vanished under the write lock between the contains() check and this lookup")).kind != SocketKind::Output {
            return None;
        }
        if storage.sockets.get(dst.descriptor).unwrap_or_else(|| bug("socket vanished under the write lock between the contains() check and this lookup")).kind != SocketKind::Input {
            return None;
        }

        if let Some(existing) = existing_identical_connection(&storage, src, dst) {
            return Some(existing);
        }

        if !storage.sockets.get(dst.descriptor).unwrap_or_else(|| bug("socket vanished under the write lock between the contains() check and this lookup")).connections.is_empty() {
            log::debug!("rejected connect: input socket already connected");
            return None;
        }

        let src_owner = storage.sockets.get(src.descriptor).unwrap_or_else(|| bug("socket vanished under the write lock between the contains() check and this lookup")).owner;
        let dst_owner = storage.sockets.get(dst.descriptor).unwrap_or_else(|| bug("socket vanished under the write lock between the contains() check and this lookup")).owner;
        if src_owner != dst_owner && would_create_cycle(&mut storage, src_owner, dst_owner) {
            log::debug!("rejected connect: would create a cycle");
            return None;
        }

        let uid = id.unwrap_or_else(Uid::new);
        if uid.is_nil() {
            return None;
        }
        let descriptor = storage.connections.insert(uid, Connection { output: src, input: dst });
        let handle = ConnectionHandle::new(descriptor, uid);
        storage.sockets.get_mut(src.descriptor).unwrap_or_else(|| bug("socket vanished under the write lock between the contains() check and this lookup")).connections.push(handle);
        storage.sockets.get_mut(dst.descriptor).unwrap_or_else(|| bug("socket vanished under the write lock between the contains() check and this lookup")).connections.push(handle);
        Some(handle)
    }

    pub fn disconnect(&self, c: ConnectionHandle) -> bool {
        let mut storage = self.storage.write();
        disconnect_locked(&mut storage, c)
    }

    pub fn set_data(&self, socket: SocketHandle, data: Option<crate::object::ObjectPtr>) -> bool {
        let mut storage = self.storage.write();
        match storage.sockets.get_mut(socket.descriptor) {
            Some(s) => {
                s.data = data;
                true
            }
            None => false,
        }
    }

    pub fn set_node_data(&self, node: NodeHandle, data: Option<crate::object::ObjectPtr>) -> bool {
        let mut storage = self.storage.write();
        match storage.nodes.get_mut(node.descriptor) {
            Some(n) => {
                n.data = data;
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut storage = self.storage.write();
        storage.nodes.clear();
        storage.sockets.clear();
        storage.connections.clear();
    }

    pub fn exists_node(&self, node: NodeHandle) -> bool {
        self.storage.read().nodes.contains(node)
    }
    pub fn exists_socket(&self, socket: SocketHandle) -> bool {
        self.storage.read().sockets.contains(socket)
    }
    pub fn exists_connection(&self, c: ConnectionHandle) -> bool {
        self.storage.read().connections.contains(c)
    }

    pub fn get_node_info(&self, node: NodeHandle) -> Option<NodeInfo> {
        let storage = self.storage.read();
        let data = storage.nodes.get(node.descriptor)?;
        Some(NodeInfo { name: data.name.clone(), kind: data.kind, inputs: data.inputs.clone(), outputs: data.outputs.clone() })
    }

    pub fn get_socket_info(&self, socket: SocketHandle) -> Option<SocketInfo> {
        let storage = self.storage.read();
        let data = storage.sockets.get(socket.descriptor)?;
        Some(SocketInfo { name: data.name.clone(), kind: data.kind, owner: data.owner })
    }

    pub fn get_connection_info(&self, c: ConnectionHandle) -> Option<ConnectionInfo> {
        let storage = self.storage.read();
        let data = storage.connections.get(c.descriptor)?;
        Some(ConnectionInfo { output: data.output, input: data.input })
    }

    pub fn get_node_data(&self, node: NodeHandle) -> Option<Option<crate::object::ObjectPtr>> {
        self.storage.read().nodes.get(node.descriptor).map(|n| n.data.clone())
    }

    pub fn get_socket_data(&self, socket: SocketHandle) -> Option<Option<crate::object::ObjectPtr>> {
        self.storage.read().sockets.get(socket.descriptor).map(|s| s.data.clone())
    }

    pub fn get_name(&self, node: NodeHandle) -> Option<ArcStr> {
        self.storage.read().nodes.get(node.descriptor).map(|n| n.name.clone())
    }

    /// Sockets owned by `node`, optionally filtered by direction, in
    /// insertion order.
    pub fn sockets(&self, node: NodeHandle, kind: Option<SocketKind>) -> Vec<SocketHandle> {
        let storage = self.storage.read();
        let Some(data) = storage.nodes.get(node.descriptor) else { return Vec::new() };
        match kind {
            None => data.inputs.iter().copied().chain(data.outputs.iter().copied()).collect(),
            Some(SocketKind::Input) => data.inputs.clone(),
            Some(SocketKind::Output) => data.outputs.clone(),
        }
    }

    /// Connections attached to `socket`, in insertion order.
    pub fn connections(&self, socket: SocketHandle) -> Vec<ConnectionHandle> {
        let storage = self.storage.read();
        storage.sockets.get(socket.descriptor).map(|s| s.connections.clone()).unwrap_or_default()
    }

    pub fn has_connection(&self, socket: SocketHandle) -> bool {
        !self.connections(socket).is_empty()
    }

    /// The single incoming connection to an input socket, if any.
    pub fn input_connection(&self, socket: SocketHandle) -> Option<ConnectionHandle> {
        self.connections(socket).first().copied()
    }

    pub fn interfaces(&self, socket: SocketHandle) -> Vec<NodeHandle> {
        self.storage.read().sockets.get(socket.descriptor).map(|s| s.interfaces.clone()).unwrap_or_default()
    }

    pub fn is_input_socket(&self, socket: SocketHandle) -> Option<bool> {
        self.storage.read().sockets.get(socket.descriptor).map(|s| s.kind == SocketKind::Input)
    }

    /// Nodes whose outputs (if any) are not connected to anything: the
    /// terminal sinks of the dataflow.
    pub fn roots(&self) -> Vec<NodeHandle> {
        let storage = self.storage.read();
        storage
            .nodes
            .iter()
            .filter_map(|(descriptor, data)| {
                let unconsumed = data.outputs.iter().all(|s| {
                    storage.sockets.get(s.descriptor).map(|sd| sd.connections.is_empty()).unwrap_or(true)
                });
                if unconsumed {
                    storage.nodes.uid_of(descriptor).map(|uid| NodeHandle::new(descriptor, uid))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Walk forward from `n` through whichever node consumes its output,
    /// until reaching a node whose outputs are unconsumed.
    pub fn root_of(&self, n: NodeHandle) -> Option<NodeHandle> {
        let storage = self.storage.read();
        if !storage.nodes.contains(n) {
            return None;
        }
        let mut current = n;
        loop {
            let data = storage.nodes.get(current.descriptor)?;
            let mut consumer = None;
            'search: for out in &data.outputs {
                let Some(sd) = storage.sockets.get(out.descriptor) else { continue };
                for c in &sd.connections {
                    if let Some(cd) = storage.connections.get(c.descriptor) {
                        let owner = storage.sockets.get(cd.input.descriptor).unwrap_or_else(|| bug("connection references a socket that no longer exists")).owner;
                        consumer = Some(owner);
                        break 'search;
                    }
                }
            }
            match consumer {
                Some(next) => current = next,
                None => return Some(current),
            }
        }
    }
}

fn existing_identical_connection(storage: &Storage, src: SocketHandle, dst: SocketHandle) -> Option<ConnectionHandle> {
    storage.sockets.get(dst.descriptor)?.connections.iter().copied().find(|c| {
        storage.connections.get(c.descriptor).map(|cd| cd.output == src && cd.input == dst).unwrap_or(false)
    })
}

fn remove_socket_locked(storage: &mut Storage, socket: SocketHandle) {
    let Some(data) = storage.sockets.get(socket.descriptor) else { return };
    let conns = data.connections.clone();
    for c in conns {
        disconnect_locked(storage, c);
    }
    storage.sockets.remove(socket.descriptor);
}

fn disconnect_locked(storage: &mut Storage, c: ConnectionHandle) -> bool {
    let Some(data) = storage.connections.remove(c.descriptor) else { return false };
    if let Some(s) = storage.sockets.get_mut(data.output.descriptor) {
        s.connections.retain(|x| *x != c);
    }
    if let Some(s) = storage.sockets.get_mut(data.input.descriptor) {
        s.connections.retain(|x| *x != c);
    }
    true
}

/// Would connecting an output of `producer` into an input of `consumer`
/// close a cycle? Equivalent to asking whether `producer` already
/// (transitively) depends on `consumer` by following existing input
/// connections backwards. Uses the per-node `visited`/`on_path` flags
/// spec.md §4.7 calls for, cleared before each check.
fn would_create_cycle(storage: &mut Storage, producer: NodeHandle, consumer: NodeHandle) -> bool {
    for (_, data) in storage.nodes.iter_mut_all() {
        data.visited = false;
        data.on_path = false;
    }
    depends_on(storage, producer, consumer)
}

fn depends_on(storage: &mut Storage, current: NodeHandle, target: NodeHandle) -> bool {
    if current == target {
        return true;
    }
    {
        let Some(data) = storage.nodes.get_mut(current.descriptor) else { return false };
        if data.visited {
            return false;
        }
        data.visited = true;
        data.on_path = true;
    }
    let inputs = storage.nodes.get(current.descriptor).unwrap_or_else(|| bug("node vanished mid-traversal under the held write lock")).inputs.clone();
    let mut found = false;
    for input in inputs {
        let Some(sd) = storage.sockets.get(input.descriptor) else { continue };
        for c in sd.connections.clone() {
            let Some(cd) = storage.connections.get(c.descriptor) else { continue };
            let Some(producer_sd) = storage.sockets.get(cd.output.descriptor) else { continue };
            let producer = producer_sd.owner;
            if depends_on(storage, producer, target) {
                found = true;
                break;
            }
        }
        if found {
            break;
        }
    }
    if let Some(data) = storage.nodes.get_mut(current.descriptor) {
        data.on_path = false;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_then_disconnect_restores_the_graph() {
        let g = BasicNodeGraph::default();
        let n1 = g.add("n1", &[], &["o"], NodeKind::Normal, None).unwrap();
        let n2 = g.add("n2", &["i"], &[], NodeKind::Normal, None).unwrap();
        let out = g.sockets(n1, Some(SocketKind::Output))[0];
        let inp = g.sockets(n2, Some(SocketKind::Input))[0];
        assert!(!g.has_connection(inp));
        let c = g.connect(out, inp, None).unwrap();
        assert!(g.has_connection(inp));
        assert!(g.disconnect(c));
        assert!(!g.has_connection(inp));
        assert!(!g.exists_connection(c));
    }

    #[test]
    fn an_input_socket_accepts_at_most_one_connection() {
        let g = BasicNodeGraph::default();
        let n1 = g.add("n1", &[], &["o"], NodeKind::Normal, None).unwrap();
        let n2 = g.add("n2", &[], &["o"], NodeKind::Normal, None).unwrap();
        let n3 = g.add("n3", &["i"], &[], NodeKind::Normal, None).unwrap();
        let o1 = g.sockets(n1, Some(SocketKind::Output))[0];
        let o2 = g.sockets(n2, Some(SocketKind::Output))[0];
        let i = g.sockets(n3, Some(SocketKind::Input))[0];
        assert!(g.connect(o1, i, None).is_some());
        assert!(g.connect(o2, i, None).is_none());
    }

    #[test]
    fn connecting_back_into_an_upstream_node_is_rejected() {
        let g = BasicNodeGraph::default();
        let n1 = g.add("n1", &["i"], &["o"], NodeKind::Normal, None).unwrap();
        let n2 = g.add("n2", &["i"], &["o"], NodeKind::Normal, None).unwrap();
        let n1_out = g.sockets(n1, Some(SocketKind::Output))[0];
        let n2_in = g.sockets(n2, Some(SocketKind::Input))[0];
        g.connect(n1_out, n2_in, None).unwrap();

        let n2_out = g.sockets(n2, Some(SocketKind::Output))[0];
        let n1_in = g.sockets(n1, Some(SocketKind::Input))[0];
        let before = (g.connections(n1_in).len(), g.connections(n2_out).len());
        assert!(g.connect(n2_out, n1_in, None).is_none());
        let after = (g.connections(n1_in).len(), g.connections(n2_out).len());
        assert_eq!(before, after);
    }

    #[test]
    fn removed_nodes_are_no_longer_reported_as_existing() {
        let g = BasicNodeGraph::default();
        let n = g.add("n", &[], &[], NodeKind::Normal, None).unwrap();
        assert!(g.exists_node(n));
        assert!(g.remove(n));
        assert!(!g.exists_node(n));
    }

    #[test]
    fn socket_and_connection_lists_preserve_insertion_order() {
        let g = BasicNodeGraph::default();
        let n = g.add("n", &["a", "b", "c"], &[], NodeKind::Normal, None).unwrap();
        let names: Vec<_> = g
            .sockets(n, Some(SocketKind::Input))
            .iter()
            .map(|s| g.get_socket_info(*s).unwrap().name)
            .collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }
}
