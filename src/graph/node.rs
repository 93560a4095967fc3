//! Entity node implementation for the knowledge graph

use super::types::{Label, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An entity vertex extracted during ingestion
///
/// Nodes carry:
/// - a canonical surface form (`name`)
/// - a non-empty set of labels (`Entity`, `Text`, ...)
/// - a stable numeric id assigned by the ingestion pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the graph store
    pub id: NodeId,

    /// Canonical surface form of the entity
    pub name: String,

    /// Set of labels (always non-empty)
    pub labels: HashSet<Label>,

    /// Stable numeric id from the ingestion corpus
    pub numeric_id: u64,
}

impl Node {
    /// Create a new node with a single label
    pub fn new(id: NodeId, name: impl Into<String>, label: impl Into<Label>, numeric_id: u64) -> Self {
        let mut labels = HashSet::new();
        labels.insert(label.into());

        Node {
            id,
            name: name.into(),
            labels,
            numeric_id,
        }
    }

    /// Create a new node with multiple labels
    ///
    /// Falls back to the `Entity` label when the provided list is empty, so
    /// the non-empty-labels invariant always holds.
    pub fn new_with_labels(id: NodeId, name: impl Into<String>, labels: Vec<Label>, numeric_id: u64) -> Self {
        let mut label_set: HashSet<Label> = labels.into_iter().collect();
        if label_set.is_empty() {
            label_set.insert(Label::new("Entity"));
        }

        Node {
            id,
            name: name.into(),
            labels: label_set,
            numeric_id,
        }
    }

    /// Check if node has a specific label
    pub fn has_label(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }

    /// Get all labels
    pub fn get_labels(&self) -> Vec<&Label> {
        self.labels.iter().collect()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_node_single_label() {
        let node = Node::new(NodeId::new(1), "indemnification", "Entity", 101);
        assert_eq!(node.id, NodeId::new(1));
        assert_eq!(node.name, "indemnification");
        assert_eq!(node.numeric_id, 101);
        assert!(node.has_label(&Label::new("Entity")));
    }

    #[test]
    fn test_create_node_multiple_labels() {
        let labels = vec![Label::new("Entity"), Label::new("Text")];
        let node = Node::new_with_labels(NodeId::new(2), "seller", labels, 102);

        assert_eq!(node.labels.len(), 2);
        assert!(node.has_label(&Label::new("Entity")));
        assert!(node.has_label(&Label::new("Text")));
    }

    #[test]
    fn test_empty_labels_fall_back_to_entity() {
        let node = Node::new_with_labels(NodeId::new(3), "buyer", vec![], 103);
        assert_eq!(node.labels.len(), 1);
        assert!(node.has_label(&Label::new("Entity")));
    }

    #[test]
    fn test_node_equality() {
        let node1 = Node::new(NodeId::new(7), "seller", "Entity", 1);
        let node2 = Node::new(NodeId::new(7), "buyer", "Entity", 2);
        let node3 = Node::new(NodeId::new(8), "seller", "Entity", 1);

        assert_eq!(node1, node2); // same id
        assert_ne!(node1, node3); // different id
    }
}
