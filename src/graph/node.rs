//! Basic nodes (spec.md §3 "Basic node").

use crate::object::ObjectPtr;
use crate::uid::SocketHandle;
use arcstr::ArcStr;

/// A normal node owns the sockets it declares; an interface node borrows
/// sockets owned elsewhere (spec.md §9 "Interfaces as shared references").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeKind {
    Normal,
    Interface,
}

pub(crate) struct NodeData {
    pub(crate) name: ArcStr,
    pub(crate) kind: NodeKind,
    pub(crate) inputs: Vec<SocketHandle>,
    pub(crate) outputs: Vec<SocketHandle>,
    pub(crate) data: Option<ObjectPtr>,
    pub(crate) visited: bool,
    pub(crate) on_path: bool,
}

impl NodeData {
    pub(crate) fn new(name: ArcStr, kind: NodeKind) -> Self {
        NodeData { name, kind, inputs: Vec::new(), outputs: Vec::new(), data: None, visited: false, on_path: false }
    }
}
