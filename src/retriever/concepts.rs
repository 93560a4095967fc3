//! Concept extraction: short noun phrases bridging queries and the graph
//!
//! Extraction is deterministic — tokenizer, stopword filter, and
//! frequency-ranked 1–2-token phrases — so retrieval stays reproducible.
//! Only the embedding call touches the network, and all phrases are
//! embedded in one batch.

use crate::embed::{EmbedError, Embedder};
use crate::graph::{is_stopword, tokenize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    /// Embedding provider is rate limiting; callers retry later
    #[error("concept extractor busy")]
    Busy,

    #[error(transparent)]
    Embed(EmbedError),
}

impl From<EmbedError> for ExtractError {
    fn from(e: EmbedError) -> Self {
        match e {
            EmbedError::RateLimited(_) => ExtractError::Busy,
            other => ExtractError::Embed(other),
        }
    }
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// A concept phrase extracted from free text, with its embedding
#[derive(Debug, Clone)]
pub struct ExtractedConcept {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Input beyond this is ignored
const MAX_INPUT_BYTES: usize = 4096;

fn is_numeric(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_digit())
}

/// Deterministic concept extractor
///
/// Produces a deduplicated (by lowercased text) list of 1–2-token phrases,
/// ranked by frequency and first occurrence, embedded in a single batch.
pub struct ConceptExtractor {
    embedder: Arc<dyn Embedder>,
    max_concepts: usize,
}

impl ConceptExtractor {
    pub fn new(embedder: Arc<dyn Embedder>, max_concepts: usize) -> Self {
        Self {
            embedder,
            max_concepts: max_concepts.max(1),
        }
    }

    /// Extract concepts from a text blob (up to 4 KB considered)
    ///
    /// Returns an empty list for empty or stopword-only input.
    pub async fn extract(&self, text: &str) -> ExtractResult<Vec<ExtractedConcept>> {
        let phrases = self.candidate_phrases(text);
        if phrases.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.embedder.embed(&phrases).await?;

        Ok(phrases
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| ExtractedConcept { text, embedding })
            .collect())
    }

    /// Ranked candidate phrases, before embedding
    fn candidate_phrases(&self, text: &str) -> Vec<String> {
        let truncated = truncate_to_boundary(text, MAX_INPUT_BYTES);
        let tokens: Vec<String> = tokenize(truncated)
            .into_iter()
            .filter(|t| !is_stopword(t) && !is_numeric(t))
            .collect();
        if tokens.is_empty() {
            return Vec::new();
        }

        // phrase -> (frequency, first occurrence)
        let mut counts: HashMap<String, (u32, usize)> = HashMap::new();
        let mut record = |phrase: String, position: usize| {
            let entry = counts.entry(phrase).or_insert((0, position));
            entry.0 += 1;
        };

        for (i, token) in tokens.iter().enumerate() {
            record(token.clone(), i);
            if let Some(next) = tokens.get(i + 1) {
                record(format!("{} {}", token, next), i);
            }
        }

        let mut ranked: Vec<(String, (u32, usize))> = counts.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1 .0
                .cmp(&a.1 .0)
                .then(a.1 .1.cmp(&b.1 .1))
                .then(a.0.cmp(&b.0))
        });

        ranked
            .into_iter()
            .take(self.max_concepts)
            .map(|(phrase, _)| phrase)
            .collect()
    }
}

fn truncate_to_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
