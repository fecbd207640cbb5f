//! Basic sockets (spec.md §3 "Basic socket").

use crate::object::ObjectPtr;
use crate::uid::NodeHandle;
use arcstr::ArcStr;

/// Whether a socket accepts an incoming connection or produces one.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SocketKind {
    Input,
    Output,
}

pub(crate) struct SocketData {
    pub(crate) name: ArcStr,
    pub(crate) kind: SocketKind,
    pub(crate) owner: NodeHandle,
    pub(crate) data: Option<ObjectPtr>,
    /// Interface nodes that expose this socket without owning it
    /// (spec.md §9 "Interfaces as shared references").
    pub(crate) interfaces: Vec<NodeHandle>,
    /// Connections attached to this socket, in insertion order. An input
    /// socket's `connections` never holds more than one entry.
    pub(crate) connections: Vec<crate::uid::ConnectionHandle>,
}

impl SocketData {
    pub(crate) fn new(name: ArcStr, kind: SocketKind, owner: NodeHandle) -> Self {
        SocketData { name, kind, owner, data: None, interfaces: Vec::new(), connections: Vec::new() }
    }
}
