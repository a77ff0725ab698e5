//! Validator findings.
//!
//! [`GraphError`] messages are read by the code-generating collaborator on the
//! next attempt, so each one names the node type, the input, and what was
//! expected in plain words. The structured fields carry the same data for
//! programmatic consumers.

use abracadabra_core::id::NodeId;
use abracadabra_core::types::SocketType;
use serde::Serialize;

/// A structural defect found in a candidate graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind")]
pub enum GraphError {
    /// The node's type is not placeable in this environment.
    #[error("Node type '{node_type}' is not available in this environment.")]
    UnknownNodeType { node: NodeId, node_type: String },

    /// A bound input name is neither required nor optional for the type.
    #[error("Node type '{node_type}' does not have an input named '{input}'.")]
    UnknownInput {
        node: NodeId,
        node_type: String,
        input: String,
    },

    /// A link names a producer that exists in neither graph.
    #[error("The {input} input of node of type '{node_type}' is linked to an invalid node: '{producer}'.")]
    UnresolvedLink {
        node: NodeId,
        node_type: String,
        input: String,
        producer: NodeId,
    },

    /// A link's producer exists but its type has no catalog descriptor.
    #[error("The {input} input of node of type '{node_type}' is linked to node '{producer}' of unknown type '{producer_type}'.")]
    UnknownProducerType {
        node: NodeId,
        node_type: String,
        input: String,
        producer: NodeId,
        producer_type: String,
    },

    /// A link selects an output the producer does not have.
    #[error("Node of type '{node_type}' is attempting to use output {index} from node of type '{producer_type}' which only has {available} outputs.")]
    OutputIndexOutOfRange {
        node: NodeId,
        node_type: String,
        input: String,
        producer_type: String,
        index: usize,
        available: usize,
    },

    /// A link carries a type the input does not accept.
    #[error("The {input} input of node of type '{node_type}' is expecting type '{expected}' but got type '{actual}' from node of type '{producer_type}'.")]
    TypeMismatch {
        node: NodeId,
        node_type: String,
        input: String,
        expected: SocketType,
        actual: SocketType,
        producer_type: String,
    },

    /// A required input has no binding.
    #[error("Node of type '{node_type}' is missing a required input '{input}'.")]
    MissingRequiredInput {
        node: NodeId,
        node_type: String,
        input: String,
    },

    /// `result['outputs']` has the wrong length.
    #[error("result['outputs'] must contain exactly {expected} output(s) but contains {actual}.")]
    OutputCountMismatch { expected: usize, actual: usize },

    /// A declared output names a producer that exists in neither graph.
    #[error("Output {position} in result['outputs'] refers to an invalid node: '{producer}'.")]
    UnresolvedOutput { position: usize, producer: NodeId },

    /// A declared output selects an output the producer does not have.
    #[error("Output {position} in result['outputs'] uses output {index} from node of type '{producer_type}' which only has {available} outputs.")]
    DeclaredOutputOutOfRange {
        position: usize,
        producer_type: String,
        index: usize,
        available: usize,
    },
}

impl GraphError {
    /// The candidate node the finding is attached to, if any.
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            GraphError::UnknownNodeType { node, .. }
            | GraphError::UnknownInput { node, .. }
            | GraphError::UnresolvedLink { node, .. }
            | GraphError::UnknownProducerType { node, .. }
            | GraphError::OutputIndexOutOfRange { node, .. }
            | GraphError::TypeMismatch { node, .. }
            | GraphError::MissingRequiredInput { node, .. } => Some(node),
            GraphError::OutputCountMismatch { .. }
            | GraphError::UnresolvedOutput { .. }
            | GraphError::DeclaredOutputOutOfRange { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_message_names_both_types() {
        let err = GraphError::TypeMismatch {
            node: NodeId::from("2"),
            node_type: "B".into(),
            input: "img".into(),
            expected: SocketType::named("IMAGE"),
            actual: SocketType::named("MASK"),
            producer_type: "A".into(),
        };
        assert_eq!(
            err.to_string(),
            "The img input of node of type 'B' is expecting type 'IMAGE' but got type 'MASK' from node of type 'A'."
        );
    }

    #[test]
    fn serializes_with_kind_tag() {
        let err = GraphError::MissingRequiredInput {
            node: NodeId::from("1"),
            node_type: "B".into(),
            input: "img".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "MissingRequiredInput");
        assert_eq!(json["node"], "1");
    }
}
