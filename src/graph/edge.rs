//! Typed relation edges between entity nodes
//!
//! Multi-edges between the same pair of nodes are permitted and
//! distinguished by relation type.

use super::types::{NodeId, RelationType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A directed, typed relation between two entity nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    /// Source node (relation goes FROM this node)
    pub source: NodeId,

    /// Target node (relation goes TO this node)
    pub target: NodeId,

    /// Short verb phrase describing the relation
    pub rel_type: RelationType,

    /// Free-form relation properties from ingestion
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl Relation {
    pub fn new(source: NodeId, target: NodeId, rel_type: impl Into<RelationType>) -> Self {
        Relation {
            source,
            target,
            rel_type: rel_type.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_relation() {
        let rel = Relation::new(NodeId::new(1), NodeId::new(2), "GOVERNS")
            .with_property("weight", "0.8");

        assert_eq!(rel.source, NodeId::new(1));
        assert_eq!(rel.target, NodeId::new(2));
        assert_eq!(rel.rel_type.as_str(), "GOVERNS");
        assert_eq!(rel.properties.get("weight").map(String::as_str), Some("0.8"));
    }

    #[test]
    fn test_multi_edges_distinguished_by_type() {
        let a = Relation::new(NodeId::new(1), NodeId::new(2), "GOVERNS");
        let b = Relation::new(NodeId::new(1), NodeId::new(2), "LIMITS");
        assert_ne!(a.rel_type, b.rel_type);
    }
}
