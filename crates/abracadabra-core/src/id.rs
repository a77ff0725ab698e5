//! Stable node identifier for graph entities.
//!
//! Node ids are strings because the host's prompt format keys nodes by
//! string. The builder hands out `"<prefix><n>"`; outer graphs may use any
//! string.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Node identifier, unique within one graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display() {
        assert_eq!(format!("{}", NodeId::from("abra.7")), "abra.7");
    }

    #[test]
    fn serde_is_a_bare_string() {
        let json = serde_json::to_string(&NodeId::from("12")).unwrap();
        assert_eq!(json, "\"12\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NodeId::from("12"));
    }
}
