//! Concept vertices — short noun phrases bridging free text and graph nodes

use super::types::ConceptId;
use serde::{Deserialize, Serialize};

/// A short noun phrase used to bridge free-text queries and graph nodes
///
/// Concepts are unique by normalized (lowercased, trimmed) text and carry
/// the embedding produced at ingestion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub id: ConceptId,

    /// The concept phrase as extracted
    pub text: String,

    /// Embedding of the concept phrase
    pub embedding: Vec<f32>,
}

impl Concept {
    pub fn new(id: ConceptId, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Concept {
            id,
            text: text.into(),
            embedding,
        }
    }

    /// Normalization under which concept texts are unique
    pub fn normalized_text(&self) -> String {
        normalize_concept_text(&self.text)
    }
}

/// Lowercase + whitespace-collapse normalization for concept uniqueness
pub fn normalize_concept_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl PartialEq for Concept {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Concept {}
