//! Graph-first retriever: seed nodes from full-text search, expand one
//! hop, rank passages by text score, graph proximity, and concept overlap

use super::concepts::{ConceptExtractor, ExtractedConcept};
use super::{rank_and_truncate, with_store_retry, RetrieveResult, ScoredPassage};
use crate::graph::{GraphStore, NodeId, Passage, PassageId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Weighting of the three ranking components
const TEXT_WEIGHT: f32 = 0.45;
const GRAPH_WEIGHT: f32 = 0.35;
const CONCEPT_WEIGHT: f32 = 0.2;

/// Concept-overlap counts saturate here
const OVERLAP_CAP: u32 = 3;

/// How many extracted concepts become seed terms
const SEED_CONCEPTS: usize = 4;

#[derive(Debug, Default)]
struct Candidate {
    passage: Option<Passage>,
    text_score: f32,
    /// Smallest hop distance at which the passage was reached (0 = seed
    /// node mention, 1 = one-hop neighbor)
    best_hop: Option<u8>,
    concept_overlap: u32,
}

/// Graph-first passage retriever
pub struct LkgRetriever {
    graph: Arc<dyn GraphStore>,
    extractor: Arc<ConceptExtractor>,
    /// Per-seed full-text fan-out
    seed_k: usize,
    store_retries: u32,
}

impl LkgRetriever {
    pub fn new(graph: Arc<dyn GraphStore>, extractor: Arc<ConceptExtractor>, seed_k: usize, store_retries: u32) -> Self {
        Self {
            graph,
            extractor,
            seed_k: seed_k.max(1),
            store_retries,
        }
    }

    /// Retrieve ranked passages for a natural-language query
    pub async fn search(&self, query: &str, k: usize) -> RetrieveResult<Vec<ScoredPassage>> {
        let concepts = self.extractor.extract(query).await?;
        self.search_seeded(query, &concepts, k).await
    }

    /// Retrieve using already-extracted concepts (avoids re-embedding when
    /// the hybrid retriever drives several searches from one extraction)
    pub async fn search_seeded(&self, query: &str, concepts: &[ExtractedConcept], k: usize) -> RetrieveResult<Vec<ScoredPassage>> {
        let mut seeds: Vec<String> = concepts
            .iter()
            .take(SEED_CONCEPTS)
            .map(|c| c.text.clone())
            .collect();
        let query = query.trim();
        if !query.is_empty() {
            seeds.push(query.to_string());
        }
        if seeds.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut candidates: BTreeMap<PassageId, Candidate> = BTreeMap::new();
        let mut seed_nodes: Vec<NodeId> = Vec::new();

        for seed in &seeds {
            let passage_hits = with_store_retry(self.store_retries, || {
                self.graph.fulltext_passage_search(seed, self.seed_k)
            })
            .await?;
            for (passage, score) in passage_hits {
                let entry = candidates.entry(passage.id).or_default();
                entry.text_score = entry.text_score.max(score);
                entry.passage.get_or_insert(passage);
            }

            let node_hits = with_store_retry(self.store_retries, || {
                self.graph.fulltext_node_search(seed, self.seed_k)
            })
            .await?;
            for (node, _) in node_hits {
                if !seed_nodes.contains(&node.id) {
                    seed_nodes.push(node.id);
                }
            }
        }

        debug!(seeds = seeds.len(), seed_nodes = seed_nodes.len(), "lkg seed resolution");

        // hop 0: passages mentioning the seed nodes themselves
        for &node_id in &seed_nodes {
            let passages = with_store_retry(self.store_retries, || self.graph.passages_for_node(node_id)).await?;
            for passage in passages {
                let entry = candidates.entry(passage.id).or_default();
                entry.best_hop = Some(entry.best_hop.map_or(0, |h| h.min(0)));
                entry.passage.get_or_insert(passage);
            }

            // hop 1: passages attached to one-hop neighbors
            let neighbors = with_store_retry(self.store_retries, || self.graph.neighbors(node_id, 1, None)).await?;
            for neighbor in neighbors {
                let passages =
                    with_store_retry(self.store_retries, || self.graph.passages_for_node(neighbor.id)).await?;
                for passage in passages {
                    let entry = candidates.entry(passage.id).or_default();
                    entry.best_hop = Some(entry.best_hop.map_or(1, |h| h.min(1)));
                    entry.passage.get_or_insert(passage);
                }
            }
        }

        // concept overlap over the collected candidates
        if !concepts.is_empty() {
            for candidate in candidates.values_mut() {
                if let Some(passage) = &candidate.passage {
                    let haystack = passage.text.to_lowercase();
                    candidate.concept_overlap = concepts
                        .iter()
                        .filter(|c| haystack.contains(&c.text.to_lowercase()))
                        .count() as u32;
                }
            }
        }

        let scored: Vec<ScoredPassage> = candidates
            .into_values()
            .filter_map(|c| {
                let passage = c.passage?;
                let graph_boost = c.best_hop.map_or(0.0, |hop| 1.0 / (1.0 + hop as f32));
                let overlap = c.concept_overlap.min(OVERLAP_CAP) as f32 / OVERLAP_CAP as f32;
                let score = TEXT_WEIGHT * c.text_score + GRAPH_WEIGHT * graph_boost + CONCEPT_WEIGHT * overlap;
                Some(ScoredPassage { passage, score })
            })
            .collect();

        Ok(rank_and_truncate(scored, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{EmbedResult, Embedder};
    use crate::graph::{MemoryGraph, Node, Relation};
    use async_trait::async_trait;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn corpus() -> Arc<MemoryGraph> {
        let graph = MemoryGraph::new();
        graph
            .add_passage(Passage::new(
                PassageId::new(1),
                "Seller may terminate this agreement upon material breach.",
                "c",
                0,
            ))
            .unwrap();
        graph
            .add_passage(Passage::new(
                PassageId::new(2),
                "Notice of termination must be given thirty days in advance.",
                "c",
                1,
            ))
            .unwrap();
        graph
            .add_passage(Passage::new(
                PassageId::new(3),
                "All payments are due within sixty days of invoice.",
                "c",
                2,
            ))
            .unwrap();
        graph.add_node(Node::new(NodeId::new(10), "termination", "Entity", 10)).unwrap();
        graph.add_node(Node::new(NodeId::new(11), "notice", "Entity", 11)).unwrap();
        graph.add_relation(Relation::new(NodeId::new(10), NodeId::new(11), "REQUIRES")).unwrap();
        graph.link_mention(NodeId::new(10), PassageId::new(1)).unwrap();
        graph.link_mention(NodeId::new(11), PassageId::new(2)).unwrap();
        Arc::new(graph)
    }

    fn retriever(graph: Arc<MemoryGraph>) -> LkgRetriever {
        let extractor = Arc::new(ConceptExtractor::new(Arc::new(StubEmbedder), 4));
        LkgRetriever::new(graph, extractor, 5, 2)
    }

    #[tokio::test]
    async fn test_graph_proximal_passages_rank_first() {
        let retriever = retriever(corpus());
        let results = retriever.search("termination of the agreement", 10).await.unwrap();

        assert!(!results.is_empty());
        // passage 1 mentions the seed node directly; passage 3 is unrelated
        assert_eq!(results[0].passage.id, PassageId::new(1));
        assert!(!results.iter().any(|r| r.passage.id == PassageId::new(3)));
    }

    #[tokio::test]
    async fn test_one_hop_expansion_reaches_neighbor_passages() {
        let retriever = retriever(corpus());
        let results = retriever.search("termination", 10).await.unwrap();

        // passage 2 is reached through the REQUIRES edge to "notice"
        assert!(results.iter().any(|r| r.passage.id == PassageId::new(2)));
    }

    #[tokio::test]
    async fn test_empty_query_returns_empty() {
        let retriever = retriever(corpus());
        let results = retriever.search("", 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_results_bounded_by_k() {
        let retriever = retriever(corpus());
        let results = retriever.search("termination notice agreement", 1).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
