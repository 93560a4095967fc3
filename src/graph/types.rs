//! Core identifier types for the knowledge graph

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an indexed passage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct PassageId(pub u64);

impl PassageId {
    pub fn new(id: u64) -> Self {
        PassageId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PassageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PassageId({})", self.0)
    }
}

impl From<u64> for PassageId {
    fn from(id: u64) -> Self {
        PassageId(id)
    }
}

/// Unique identifier for an entity node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn new(id: u64) -> Self {
        NodeId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

/// Unique identifier for a concept vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ConceptId(pub u64);

impl ConceptId {
    pub fn new(id: u64) -> Self {
        ConceptId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConceptId({})", self.0)
    }
}

impl From<u64> for ConceptId {
    fn from(id: u64) -> Self {
        ConceptId(id)
    }
}

/// Node label (e.g., "Entity", "Text")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Label(String);

impl Label {
    pub fn new(label: impl Into<String>) -> Self {
        Label(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label(s)
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label(s.to_string())
    }
}

/// Relation type (short verb phrase, e.g., "GOVERNS", "LIMITS")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct RelationType(String);

impl RelationType {
    pub fn new(rel_type: impl Into<String>) -> Self {
        RelationType(rel_type.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RelationType {
    fn from(s: String) -> Self {
        RelationType(s)
    }
}

impl From<&str> for RelationType {
    fn from(s: &str) -> Self {
        RelationType(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passage_id() {
        let id = PassageId::new(42);
        assert_eq!(id.as_u64(), 42);
        assert_eq!(format!("{}", id), "PassageId(42)");

        let id2: PassageId = 100.into();
        assert_eq!(id2.as_u64(), 100);
    }

    #[test]
    fn test_id_ordering() {
        assert!(PassageId::new(1) < PassageId::new(2));
        assert!(NodeId::new(1) < NodeId::new(2));
        assert!(ConceptId::new(9) > ConceptId::new(3));
    }

    #[test]
    fn test_label() {
        let label = Label::new("Entity");
        assert_eq!(label.as_str(), "Entity");
        assert_eq!(format!("{}", label), "Entity");

        let label2: Label = "Text".into();
        assert_eq!(label2.as_str(), "Text");
    }

    #[test]
    fn test_relation_type() {
        let rel = RelationType::new("GOVERNS");
        assert_eq!(rel.as_str(), "GOVERNS");
        assert_eq!(format!("{}", rel), "GOVERNS");
    }
}
