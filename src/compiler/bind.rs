//! The bind registry: runtime descriptions of a node's candidate
//! implementations (spec.md §6 `bind_info_manager`).
//!
//! Grounded on `graphix-compiler::node::genn` — the teacher's own
//! declarative wrapping of a native Rust function as a graph node —
//! generalized from the teacher's single-arity-closure style to this
//! crate's multi-input-socket, overloaded `node_declaration` shape.

use crate::object::ObjectPtr;
use crate::sgraph::PropertyNode;
use crate::types::Type;
use arcstr::ArcStr;
use std::sync::Arc;

/// `(primitive_container?) -> object_ptr<Object>` from spec.md §6.
pub type InstanceGetter = Arc<dyn Fn(Option<&PropertyNode>) -> ObjectPtr + Send + Sync>;

/// One candidate implementation for a node name: which input sockets it
/// expects (in order), which output socket it produces, its declared type,
/// and how to obtain its runtime term.
#[derive(Clone)]
pub struct Bind {
    pub node_name: ArcStr,
    pub input_pattern: Vec<ArcStr>,
    pub output_name: ArcStr,
    pub declared_type: Type,
    pub get_instance: InstanceGetter,
}

impl Bind {
    pub fn instantiate(&self, properties: Option<&PropertyNode>) -> ObjectPtr {
        (self.get_instance)(properties)
    }
}

impl std::fmt::Debug for Bind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bind")
            .field("node_name", &self.node_name)
            .field("input_pattern", &self.input_pattern)
            .field("output_name", &self.output_name)
            .field("declared_type", &self.declared_type)
            .finish()
    }
}

#[derive(Default)]
pub struct BindRegistry {
    by_name: std::collections::HashMap<ArcStr, Vec<Bind>>,
}

impl BindRegistry {
    pub fn new() -> Self {
        BindRegistry::default()
    }

    pub fn register(&mut self, bind: Bind) {
        self.by_name.entry(bind.node_name.clone()).or_default().push(bind);
    }

    /// Candidates whose input pattern matches the currently connected
    /// socket names, in order, and whose output matches `output_name`
    /// (spec.md §4.10 step 2).
    pub fn candidates(&self, node_name: &str, output_name: &str, connected_inputs: &[ArcStr]) -> Vec<&Bind> {
        self.by_name
            .get(node_name)
            .map(|binds| {
                binds
                    .iter()
                    .filter(|b| b.output_name.as_str() == output_name && b.input_pattern.as_slice() == connected_inputs)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{make_value, Value};

    #[test]
    fn candidates_filters_by_name_output_and_input_pattern() {
        let mut reg = BindRegistry::new();
        reg.register(Bind {
            node_name: "add".into(),
            input_pattern: vec!["a".into(), "b".into()],
            output_name: "out".into(),
            declared_type: Type::builtin_int(),
            get_instance: Arc::new(|_| make_value(Value::Int(0))),
        });
        let found = reg.candidates("add", "out", &["a".into(), "b".into()]);
        assert_eq!(found.len(), 1);
        assert!(reg.candidates("add", "out", &["a".into()]).is_empty());
        assert!(reg.candidates("missing", "out", &["a".into(), "b".into()]).is_empty());
    }
}
