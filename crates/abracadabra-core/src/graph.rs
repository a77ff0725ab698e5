//! Graph model: node instances, socket references, and the ordered graph.
//!
//! A [`Graph`] is an insertion-ordered mapping of [`NodeId`] to
//! [`NodeInstance`]. Candidate graphs are only grown through
//! [`GraphBuilder`](crate::builder::GraphBuilder); outer graphs are loaded
//! from the host's prompt JSON and only ever read.
//!
//! # Prompt JSON
//!
//! A graph serializes to the host's prompt format:
//!
//! ```text
//! { "3": { "class_type": "KSampler", "inputs": { "seed": 42, "model": ["4", 0] } } }
//! ```
//!
//! Links are two-element arrays `[producer id, output index]`; everything else
//! is a literal.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::CoreError;
use crate::id::NodeId;

/// Reference to one output of one node.
///
/// Carries no bounds information; whether `output` exists is decided by the
/// validator against the producer's catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(NodeId, usize)", into = "(NodeId, usize)")]
pub struct SocketRef {
    pub node: NodeId,
    pub output: usize,
}

impl SocketRef {
    pub fn new(node: impl Into<NodeId>, output: usize) -> Self {
        SocketRef {
            node: node.into(),
            output,
        }
    }
}

impl From<(NodeId, usize)> for SocketRef {
    fn from((node, output): (NodeId, usize)) -> Self {
        SocketRef { node, output }
    }
}

impl From<SocketRef> for (NodeId, usize) {
    fn from(socket: SocketRef) -> Self {
        (socket.node, socket.output)
    }
}

/// A literal input value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Literal {
    /// Float literal; `None` for NaN and infinities.
    pub fn float(value: f64) -> Option<Self> {
        Number::from_f64(value).map(Literal::Number)
    }

    /// Semantic type label used when describing a literal binding.
    pub fn type_label(&self) -> &'static str {
        match self {
            Literal::Null => "NONE",
            Literal::Bool(_) => "BOOLEAN",
            Literal::Number(n) if n.is_f64() => "FLOAT",
            Literal::Number(_) => "INTEGER",
            Literal::String(_) => "STRING",
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Number(value.into())
    }
}

impl From<u64> for Literal {
    fn from(value: u64) -> Self {
        Literal::Number(value.into())
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

/// A value bound to a node input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Link(SocketRef),
    Literal(Literal),
}

impl InputValue {
    pub fn as_link(&self) -> Option<&SocketRef> {
        match self {
            InputValue::Link(socket) => Some(socket),
            InputValue::Literal(_) => None,
        }
    }
}

impl From<SocketRef> for InputValue {
    fn from(socket: SocketRef) -> Self {
        InputValue::Link(socket)
    }
}

impl From<Literal> for InputValue {
    fn from(literal: Literal) -> Self {
        InputValue::Literal(literal)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::Literal(value.into())
    }
}

impl From<i64> for InputValue {
    fn from(value: i64) -> Self {
        InputValue::Literal(value.into())
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Literal(value.into())
    }
}

/// One placed use of a node type.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInstance {
    pub id: NodeId,
    pub type_name: String,
    /// Input bindings in the order they were given.
    pub inputs: IndexMap<String, InputValue>,
}

/// Read-only view of a pre-existing graph that candidates may link into.
pub trait OuterGraph {
    /// Type name of the node with this id, if it exists.
    fn lookup(&self, id: &NodeId) -> Option<&str>;
}

/// An ordered mapping of node id to node instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "IndexMap<NodeId, PromptNode>", into = "IndexMap<NodeId, PromptNode>")]
pub struct Graph {
    nodes: IndexMap<NodeId, NodeInstance>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a graph from the host's prompt JSON text.
    pub fn from_prompt_str(text: &str) -> Result<Self, CoreError> {
        serde_json::from_str(text).map_err(|err| CoreError::InvalidPromptGraph {
            reason: err.to_string(),
        })
    }

    /// Converts an already-parsed prompt JSON document.
    pub fn from_prompt_json(value: serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value).map_err(|err| CoreError::InvalidPromptGraph {
            reason: err.to_string(),
        })
    }

    pub fn get(&self, id: &NodeId) -> Option<&NodeInstance> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInstance> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a node. Only the builder grows graphs.
    pub(crate) fn insert(&mut self, node: NodeInstance) {
        self.nodes.insert(node.id.clone(), node);
    }
}

impl OuterGraph for Graph {
    fn lookup(&self, id: &NodeId) -> Option<&str> {
        self.nodes.get(id).map(|node| node.type_name.as_str())
    }
}

/// Per-node shape of the prompt JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptNode {
    pub class_type: String,
    #[serde(default)]
    pub inputs: IndexMap<String, InputValue>,
}

impl From<IndexMap<NodeId, PromptNode>> for Graph {
    fn from(raw: IndexMap<NodeId, PromptNode>) -> Self {
        let nodes = raw
            .into_iter()
            .map(|(id, node)| {
                let instance = NodeInstance {
                    id: id.clone(),
                    type_name: node.class_type,
                    inputs: node.inputs,
                };
                (id, instance)
            })
            .collect();
        Graph { nodes }
    }
}

impl From<Graph> for IndexMap<NodeId, PromptNode> {
    fn from(graph: Graph) -> Self {
        graph
            .nodes
            .into_iter()
            .map(|(id, node)| {
                (
                    id,
                    PromptNode {
                        class_type: node.type_name,
                        inputs: node.inputs,
                    },
                )
            })
            .collect()
    }
}
