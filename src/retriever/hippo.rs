//! Dense passage retriever with result-level reranking
//!
//! Embeds the query, pulls top-k passages from the vector index, then
//! reranks with a lightweight lexical scorer so the final order reflects
//! both embedding similarity and surface overlap with the query.

use super::{rank_and_truncate, with_store_retry, RetrieveResult, ScoredPassage};
use crate::embed::Embedder;
use crate::graph::{tokenize, GraphStore, PassageId};
use crate::vector::VectorIndex;
use std::sync::Arc;

/// Blend between normalized cosine score and lexical overlap
const DENSE_WEIGHT: f32 = 0.7;
const LEXICAL_WEIGHT: f32 = 0.3;

/// Dense retriever over passage embeddings
pub struct HippoRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    graph: Arc<dyn GraphStore>,
    store_retries: u32,
}

impl HippoRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>, graph: Arc<dyn GraphStore>, store_retries: u32) -> Self {
        Self {
            embedder,
            index,
            graph,
            store_retries,
        }
    }

    pub async fn search(&self, query: &str, k: usize) -> RetrieveResult<Vec<ScoredPassage>> {
        let query = query.trim();
        if query.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let Some(query_vector) = embeddings.into_iter().next() else {
            return Ok(Vec::new());
        };

        let hits = self.index.search(&query_vector, k)?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        // normalize cosine scores within the candidate set
        let max_score = hits.iter().map(|h| h.score).fold(f32::MIN, f32::max);
        let min_score = hits.iter().map(|h| h.score).fold(f32::MAX, f32::min);
        let range = max_score - min_score;

        let query_tokens = dedup_tokens(query);
        let mut scored = Vec::with_capacity(hits.len());

        for hit in hits {
            let passage = with_store_retry(self.store_retries, || {
                self.graph.get_passage(PassageId::new(hit.id))
            })
            .await?;
            let Some(passage) = passage else { continue };

            let dense = if range > 0.0 { (hit.score - min_score) / range } else { 1.0 };
            let lexical = lexical_overlap(&query_tokens, &passage.text);
            let score = DENSE_WEIGHT * dense + LEXICAL_WEIGHT * lexical;

            scored.push(ScoredPassage { passage, score });
        }

        Ok(rank_and_truncate(scored, k))
    }
}

fn dedup_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for t in tokenize(text) {
        if !tokens.contains(&t) {
            tokens.push(t);
        }
    }
    tokens
}

/// Fraction of query tokens present in the passage text
fn lexical_overlap(query_tokens: &[String], passage_text: &str) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let passage_tokens = dedup_tokens(passage_text);
    let matched = query_tokens.iter().filter(|t| passage_tokens.contains(t)).count();
    matched as f32 / query_tokens.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::EmbedResult;
    use crate::graph::{MemoryGraph, Passage};
    use async_trait::async_trait;

    /// Maps known phrases onto fixed unit vectors
    struct AxisEmbedder;

    fn axis_for(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        if lower.contains("terminat") {
            vec![1.0, 0.0, 0.0]
        } else if lower.contains("payment") {
            vec![0.0, 1.0, 0.0]
        } else {
            vec![0.0, 0.0, 1.0]
        }
    }

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| axis_for(t)).collect())
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    async fn setup() -> HippoRetriever {
        let graph = Arc::new(MemoryGraph::new());
        let texts = [
            (1u64, "Either party may terminate for convenience."),
            (2u64, "Payment is due net thirty."),
            (3u64, "Confidential information must be protected."),
        ];

        let mut index = VectorIndex::new(3);
        for (id, text) in texts {
            graph
                .add_passage(Passage::new(PassageId::new(id), text, "c", id as usize))
                .unwrap();
            index.upsert(id, axis_for(text)).unwrap();
        }

        HippoRetriever::new(Arc::new(AxisEmbedder), Arc::new(index), graph, 2)
    }

    #[tokio::test]
    async fn test_dense_search_finds_semantic_match() {
        let retriever = setup().await;
        let results = retriever.search("termination rights", 2).await.unwrap();
        assert_eq!(results[0].passage.id, PassageId::new(1));
    }

    #[tokio::test]
    async fn test_scores_sorted_descending() {
        let retriever = setup().await;
        let results = retriever.search("payment terms", 3).await.unwrap();
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(results[0].passage.id, PassageId::new(2));
    }

    #[tokio::test]
    async fn test_empty_query() {
        let retriever = setup().await;
        assert!(retriever.search("  ", 5).await.unwrap().is_empty());
    }
}
