//! Passage vertices — atomic units of indexed contract text
//!
//! Passages are owned by the ingestion corpus and immutable after indexing.
//! Each indexed passage has exactly one embedding in the vector index keyed
//! by its id.

use super::types::PassageId;
use serde::{Deserialize, Serialize};

/// An atomic unit of indexed contract text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Unique identifier, shared with the vector index
    pub id: PassageId,

    /// The passage text
    pub text: String,

    /// Identifier of the source document
    pub source_id: String,

    /// Position of this passage within the source document
    pub position: usize,
}

impl Passage {
    pub fn new(id: PassageId, text: impl Into<String>, source_id: impl Into<String>, position: usize) -> Self {
        Passage {
            id,
            text: text.into(),
            source_id: source_id.into(),
            position,
        }
    }
}

impl PartialEq for Passage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Passage {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passage_identity() {
        let p1 = Passage::new(PassageId::new(1), "Section 1. Parties.", "contract-a", 0);
        let p2 = Passage::new(PassageId::new(1), "different text", "contract-b", 3);
        let p3 = Passage::new(PassageId::new(2), "Section 1. Parties.", "contract-a", 0);

        assert_eq!(p1, p2); // same id
        assert_ne!(p1, p3); // different id
    }
}
