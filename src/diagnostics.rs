//! Structured compiler diagnostics (spec.md §4.11, §6 "Diagnostics taxonomy").
//!
//! A closed tagged enum rather than `anyhow::Error`: callers need to filter
//! and route these by kind/category, which a free-form error type can't
//! support. Internal invariant violations still use `anyhow` (see
//! `src/graph/mod.rs` and `src/types/type_of.rs`); this type is reserved for
//! diagnostics that are meant to reach the editor, and itself implements
//! `Display`/`std::error::Error` so it composes with `anyhow`-based callers.

use crate::types::Type;
use crate::uid::{NodeHandle, SocketHandle};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Category {
    Parse,
    Type,
    Other,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Info,
    Error,
}

/// One diagnostic kind per row of spec.md §6's taxonomy table.
#[derive(Clone, Debug)]
pub enum Message {
    InternalCompileError(String),
    UnexpectedParseError(String),
    MissingInput { node: NodeHandle, socket: SocketHandle },
    MissingOutput { node: NodeHandle, socket: SocketHandle },
    IsLambdaNode { node: NodeHandle },
    HasDefaultArgument { node: NodeHandle, socket: SocketHandle },
    HasInputConnection { node: NodeHandle, socket: SocketHandle },
    HasOutputConnection { node: NodeHandle, socket: SocketHandle },
    UnexpectedTypeError(String),
    NoValidOverloading { socket: SocketHandle },
    /// Two or more candidate binds remain after unification and neither is
    /// strictly more general than the other (spec.md §4.10 step 6). Not
    /// listed as its own row in spec.md §6's taxonomy table, but named
    /// explicitly by the compiler algorithm text — kept as a distinct
    /// `Type`-category error rather than folded into `no_valid_overloading`,
    /// since the two failure modes (no match vs. too many equally good
    /// matches) are diagnostically different.
    AmbiguousOverloading { socket: SocketHandle },
    TypeMissmatch(TypeMissmatch),
    UnsolvableConstraints { lhs_socket: SocketHandle, rhs_socket: SocketHandle, lhs_type: Type, rhs_type: Type },
    InvalidOutputType { expected: Type, provided: Type },
}

/// Carries both the "expected" and "provided" socket/type pair for a unify
/// failure at a single input.
#[derive(Clone, Debug)]
pub struct TypeMissmatch {
    socket_expected_id: SocketHandle,
    socket_provided_id: SocketHandle,
    pub expected_type: Type,
    pub provided_type: Type,
}

impl TypeMissmatch {
    pub fn new(expected_socket: SocketHandle, provided_socket: SocketHandle, expected_type: Type, provided_type: Type) -> Self {
        TypeMissmatch { socket_expected_id: expected_socket, socket_provided_id: provided_socket, expected_type, provided_type }
    }

    pub fn socket_expected_id(&self) -> SocketHandle {
        self.socket_expected_id
    }

    /// Reproduces a bug present in the original source: this accessor
    /// returns the *expected* socket id, not the provided one. Kept
    /// faithfully rather than silently fixed (see DESIGN.md) — the two
    /// accessors must be treated as independent by callers and tests.
    pub fn socket_provided_id(&self) -> SocketHandle {
        self.socket_expected_id
    }
}

impl Message {
    pub fn severity(&self) -> Severity {
        match self {
            Message::IsLambdaNode { .. }
            | Message::HasDefaultArgument { .. }
            | Message::HasInputConnection { .. }
            | Message::HasOutputConnection { .. } => Severity::Info,
            _ => Severity::Error,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Message::InternalCompileError(_) | Message::InvalidOutputType { .. } => Category::Other,
            Message::UnexpectedParseError(_)
            | Message::MissingInput { .. }
            | Message::MissingOutput { .. }
            | Message::IsLambdaNode { .. }
            | Message::HasDefaultArgument { .. }
            | Message::HasInputConnection { .. }
            | Message::HasOutputConnection { .. } => Category::Parse,
            Message::UnexpectedTypeError(_)
            | Message::NoValidOverloading { .. }
            | Message::AmbiguousOverloading { .. }
            | Message::TypeMissmatch(_)
            | Message::UnsolvableConstraints { .. } => Category::Type,
        }
    }

    /// The node this message is attached to, if any (used by
    /// [`MessageMap::for_node`]'s ancestor walk).
    pub fn node(&self) -> Option<NodeHandle> {
        match self {
            Message::MissingInput { node, .. }
            | Message::MissingOutput { node, .. }
            | Message::IsLambdaNode { node }
            | Message::HasDefaultArgument { node, .. }
            | Message::HasInputConnection { node, .. }
            | Message::HasOutputConnection { node, .. } => Some(*node),
            _ => None,
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::InternalCompileError(msg) => write!(f, "internal compiler error: {msg}"),
            Message::UnexpectedParseError(msg) => write!(f, "unexpected parse error: {msg}"),
            Message::MissingInput { socket, .. } => write!(f, "missing input at socket {socket:?}"),
            Message::MissingOutput { socket, .. } => write!(f, "missing output at socket {socket:?}"),
            Message::IsLambdaNode { node } => write!(f, "node {node:?} compiles to a lambda"),
            Message::HasDefaultArgument { socket, .. } => write!(f, "socket {socket:?} falls back to its default argument"),
            Message::HasInputConnection { socket, .. } => write!(f, "socket {socket:?} is fed by a connection"),
            Message::HasOutputConnection { socket, .. } => write!(f, "socket {socket:?} feeds a connection"),
            Message::UnexpectedTypeError(msg) => write!(f, "unexpected type error: {msg}"),
            Message::NoValidOverloading { socket } => write!(f, "no overload of the node at socket {socket:?} type-checks"),
            Message::AmbiguousOverloading { socket } => write!(f, "ambiguous overload at socket {socket:?}: multiple equally general binds match"),
            Message::TypeMissmatch(m) => write!(f, "type mismatch: expected {:?}, got {:?}", m.expected_type, m.provided_type),
            Message::UnsolvableConstraints { lhs_type, rhs_type, .. } => write!(f, "unsolvable constraint: {lhs_type:?} does not unify with {rhs_type:?}"),
            Message::InvalidOutputType { expected, provided } => write!(f, "invalid output type: expected {expected:?}, got {provided:?}"),
        }
    }
}

impl std::error::Error for Message {}

/// Collects diagnostics and supports filtering by kind/category and by
/// node/socket reference.
#[derive(Default, Debug)]
pub struct MessageMap {
    messages: Vec<Message>,
}

impl MessageMap {
    pub fn new() -> Self {
        MessageMap::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, other: MessageMap) {
        self.messages.extend(other.messages);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.severity() == Severity::Error)
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(move |m| m.category() == category)
    }

    pub fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(move |m| m.severity() == severity)
    }

    /// Messages attached to `node`, or to any node whose ancestor-group walk
    /// (via `ancestors`) reaches `node` — so a message on an interior node
    /// surfaces when a containing group is queried.
    pub fn for_node<'a>(&'a self, node: NodeHandle, ancestors: impl Fn(NodeHandle) -> Vec<NodeHandle> + 'a) -> Vec<&'a Message> {
        self.messages
            .iter()
            .filter(move |m| match m.node() {
                Some(n) => n == node || ancestors(n).contains(&node),
                None => false,
            })
            .collect()
    }
}
