//! GraphBuilder: the append-only API candidate programs use to grow a graph.
//!
//! [`GraphBuilder::node`] stores bindings verbatim and performs no checking;
//! validation is deferred to the checker so that every defect is reported in
//! one pass. Node ids come from a monotonically increasing counter, optionally
//! namespaced by a prefix so they cannot collide with an outer graph.

use indexmap::IndexMap;

use crate::graph::{Graph, InputValue, NodeInstance, SocketRef};
use crate::id::NodeId;

/// Handle to a node placed by a [`GraphBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    id: NodeId,
}

impl NodeHandle {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Reference to output `index` of this node. Not bounds-checked.
    pub fn out(&self, index: usize) -> SocketRef {
        SocketRef {
            node: self.id.clone(),
            output: index,
        }
    }
}

/// Builds one candidate graph. Owned by a single synthesis attempt.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    prefix: String,
    next_id: u64,
    graph: Graph,
}

impl GraphBuilder {
    /// Creates a builder whose ids are `"1"`, `"2"`, ...
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    /// Creates a builder whose ids are `"<prefix>1"`, `"<prefix>2"`, ...
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        GraphBuilder {
            prefix: prefix.into(),
            next_id: 1,
            graph: Graph::new(),
        }
    }

    /// Appends a node of `type_name` with the given bindings.
    ///
    /// Later bindings for the same input name replace earlier ones.
    pub fn node<I, K>(&mut self, type_name: impl Into<String>, inputs: I) -> NodeHandle
    where
        I: IntoIterator<Item = (K, InputValue)>,
        K: Into<String>,
    {
        let id = NodeId(format!("{}{}", self.prefix, self.next_id));
        self.next_id += 1;

        let inputs: IndexMap<String, InputValue> = inputs
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();

        self.graph.insert(NodeInstance {
            id: id.clone(),
            type_name: type_name.into(),
            inputs,
        });

        NodeHandle { id }
    }

    /// The graph built so far.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.len()
    }

    /// Consumes the builder and returns the completed graph.
    pub fn finalize(self) -> Graph {
        self.graph
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Literal;

    #[test]
    fn ids_are_assigned_in_creation_order() {
        let mut g = GraphBuilder::new();
        let a = g.node("A", Vec::<(String, InputValue)>::new());
        let b = g.node("B", [("img", InputValue::Link(a.out(0)))]);

        assert_eq!(a.id().as_str(), "1");
        assert_eq!(b.id().as_str(), "2");

        let ids: Vec<&str> = g.graph().nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn prefix_namespaces_ids() {
        let mut g = GraphBuilder::with_prefix("9.");
        let a = g.node("A", Vec::<(String, InputValue)>::new());
        assert_eq!(a.id().as_str(), "9.1");
    }

    #[test]
    fn out_does_not_check_bounds() {
        let mut g = GraphBuilder::new();
        let a = g.node("A", Vec::<(String, InputValue)>::new());
        assert_eq!(a.out(5), SocketRef::new("1", 5));
    }

    #[test]
    fn bindings_are_stored_verbatim() {
        let mut g = GraphBuilder::new();
        let node = g.node(
            "NotInAnyCatalog",
            [
                ("text", InputValue::from("hello")),
                ("steps", InputValue::from(30i64)),
            ],
        );
        let graph = g.finalize();
        let stored = graph.get(node.id()).unwrap();
        assert_eq!(stored.type_name, "NotInAnyCatalog");
        assert_eq!(
            stored.inputs["text"],
            InputValue::Literal(Literal::String("hello".into()))
        );
        assert_eq!(stored.inputs.len(), 2);
    }
}
