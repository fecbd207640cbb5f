//! Editor-facing node metadata (spec.md §6 `PropertyTreeNode`).
//!
//! A recursive tagged tree: leaves carry one of the four primitive value
//! kinds, inner nodes optionally carry a nominal type-constructor name so a
//! round trip through serialization (out of scope here, but the shape must
//! support it) keeps the same uuid-identified type. Children are kept in
//! `indexmap::IndexMap` so iteration order matches insertion order, as for
//! the basic graph's socket/connection lists.

use arcstr::ArcStr;
use indexmap::IndexMap;

#[derive(Clone, PartialEq, Debug)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    String(ArcStr),
    Bool(bool),
}

#[derive(Clone, Debug, Default)]
pub struct PropertyNode {
    pub value: Option<PropertyValue>,
    /// Set when this node represents an instance of a nominal type
    /// constructor rather than a primitive leaf.
    pub nominal_type: Option<ArcStr>,
    pub children: IndexMap<ArcStr, PropertyNode>,
}

impl PropertyNode {
    pub fn leaf(value: PropertyValue) -> Self {
        PropertyNode { value: Some(value), nominal_type: None, children: IndexMap::new() }
    }

    /// Set the value at a dotted child path, creating intermediate nodes
    /// as needed.
    pub fn set(&mut self, path: &[&str], value: PropertyValue) {
        match path.split_first() {
            None => self.value = Some(value),
            Some((head, rest)) => {
                let child = self.children.entry(ArcStr::from(*head)).or_default();
                child.set(rest, value);
            }
        }
    }

    pub fn get(&self, path: &[&str]) -> Option<&PropertyNode> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self.children.get(*head).and_then(|c| c.get(rest)),
        }
    }
}
