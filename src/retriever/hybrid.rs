//! Concept-enhanced hybrid retriever
//!
//! Fuses four channels into one ranked passage list:
//! (a) direct graph search, (b) concept matching, (c) concept expansion
//! through graph neighbors, (d) dense HiPPO search. Channels fail
//! independently; fusion proceeds as long as at least one succeeds.

use super::concepts::{ConceptExtractor, ExtractedConcept};
use super::hippo::HippoRetriever;
use super::lkg::LkgRetriever;
use super::{rank_and_truncate, with_store_retry, RetrieveError, RetrieveResult, ScoredPassage};
use crate::graph::{ConceptId, GraphStore, PassageId};
use crate::vector::VectorIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fusion weights for the four channels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HybridWeights {
    pub graph: f32,
    pub concept: f32,
    pub expansion: f32,
    pub hippo: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            graph: 0.3,
            concept: 0.25,
            expansion: 0.15,
            hippo: 0.3,
        }
    }
}

/// Observability counters for one hybrid retrieval
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HybridStats {
    pub graph_hits: usize,
    pub concept_hits: usize,
    pub concept_expansion_hits: usize,
    pub hippo_hits: usize,
    pub successful_searches: u32,
    pub failed_searches: u32,
}

impl HybridStats {
    /// Merge counters from another retrieval (parts run several queries)
    pub fn merge(&mut self, other: &HybridStats) {
        self.graph_hits += other.graph_hits;
        self.concept_hits += other.concept_hits;
        self.concept_expansion_hits += other.concept_expansion_hits;
        self.hippo_hits += other.hippo_hits;
        self.successful_searches += other.successful_searches;
        self.failed_searches += other.failed_searches;
    }
}

/// Result of one hybrid retrieval
#[derive(Debug, Clone)]
pub struct HybridResult {
    /// Fused, deduplicated ranking (length ≤ topN)
    pub passages: Vec<ScoredPassage>,
    /// Per-channel hits, kept for observability
    pub graph_hits: Vec<ScoredPassage>,
    pub concept_hits: Vec<ScoredPassage>,
    pub concept_expansion_hits: Vec<ScoredPassage>,
    pub hippo_hits: Vec<ScoredPassage>,
    pub stats: HybridStats,
}

/// Concept-enhanced hybrid retriever over all four channels
pub struct HybridRetriever {
    lkg: Arc<LkgRetriever>,
    hippo: Arc<HippoRetriever>,
    extractor: Arc<ConceptExtractor>,
    graph: Arc<dyn GraphStore>,
    /// Vector index over concept embeddings, keyed by concept id
    concept_index: Arc<VectorIndex>,
    weights: HybridWeights,
    /// Concept vertices matched per extracted concept during expansion
    expansion_top_m: usize,
    store_retries: u32,
}

impl HybridRetriever {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lkg: Arc<LkgRetriever>,
        hippo: Arc<HippoRetriever>,
        extractor: Arc<ConceptExtractor>,
        graph: Arc<dyn GraphStore>,
        concept_index: Arc<VectorIndex>,
        weights: HybridWeights,
        expansion_top_m: usize,
        store_retries: u32,
    ) -> Self {
        Self {
            lkg,
            hippo,
            extractor,
            graph,
            concept_index,
            weights,
            expansion_top_m: expansion_top_m.max(1),
            store_retries,
        }
    }

    /// Run all channels and fuse into a ranked, deduplicated passage list
    pub async fn hybrid_retrieve(&self, query: &str, top_n: usize) -> RetrieveResult<HybridResult> {
        let mut stats = HybridStats::default();

        // concept extraction feeds channels (a)–(c); on failure those
        // channels degrade rather than aborting the retrieval
        let (concepts, extraction_failed) = match self.extractor.extract(query).await {
            Ok(concepts) => (concepts, false),
            Err(e) => {
                warn!(error = %e, "concept extraction failed, degrading to raw-query channels");
                (Vec::new(), true)
            }
        };

        // (a) direct graph search
        let graph_hits = match self.lkg.search_seeded(query, &concepts, top_n).await {
            Ok(hits) => {
                stats.successful_searches += 1;
                hits
            }
            Err(e) => {
                warn!(error = %e, "graph channel failed");
                stats.failed_searches += 1;
                Vec::new()
            }
        };

        // (b) concept matching: one narrow graph search per concept
        let concept_hits = if extraction_failed {
            stats.failed_searches += 1;
            Vec::new()
        } else if concepts.is_empty() {
            stats.successful_searches += 1;
            Vec::new()
        } else {
            let per_concept = top_n.div_ceil(concepts.len());
            let mut hits = Vec::new();
            let mut channel_failed = false;
            for concept in &concepts {
                match self
                    .lkg
                    .search_seeded(&concept.text, std::slice::from_ref(concept), per_concept)
                    .await
                {
                    Ok(found) => hits.extend(found),
                    Err(e) => {
                        warn!(concept = %concept.text, error = %e, "concept channel failed");
                        channel_failed = true;
                        break;
                    }
                }
            }
            if channel_failed {
                stats.failed_searches += 1;
                Vec::new()
            } else {
                stats.successful_searches += 1;
                hits
            }
        };

        // (c) concept expansion through graph neighbors
        let concept_expansion_hits = if extraction_failed {
            stats.failed_searches += 1;
            Vec::new()
        } else {
            match self.expand_concepts(&concepts).await {
                Ok(hits) => {
                    stats.successful_searches += 1;
                    hits
                }
                Err(e) => {
                    warn!(error = %e, "concept expansion failed");
                    stats.failed_searches += 1;
                    Vec::new()
                }
            }
        };

        // (d) dense search
        let hippo_hits = match self.hippo.search(query, top_n).await {
            Ok(hits) => {
                stats.successful_searches += 1;
                hits
            }
            Err(e) => {
                warn!(error = %e, "hippo channel failed");
                stats.failed_searches += 1;
                Vec::new()
            }
        };

        if stats.successful_searches == 0 {
            return Err(RetrieveError::RetrievalUnavailable);
        }

        stats.graph_hits = graph_hits.len();
        stats.concept_hits = concept_hits.len();
        stats.concept_expansion_hits = concept_expansion_hits.len();
        stats.hippo_hits = hippo_hits.len();

        let passages = self.fuse(
            [
                (self.weights.graph, &graph_hits),
                (self.weights.concept, &concept_hits),
                (self.weights.expansion, &concept_expansion_hits),
                (self.weights.hippo, &hippo_hits),
            ],
            top_n,
        );

        debug!(
            fused = passages.len(),
            graph = stats.graph_hits,
            concept = stats.concept_hits,
            expansion = stats.concept_expansion_hits,
            hippo = stats.hippo_hits,
            "hybrid retrieval complete"
        );

        Ok(HybridResult {
            passages,
            graph_hits,
            concept_hits,
            concept_expansion_hits,
            hippo_hits,
            stats,
        })
    }

    /// Resolve each extracted concept to stored concept vertices by
    /// embedding similarity, then collect passages attached to the nodes
    /// carrying those concepts.
    async fn expand_concepts(&self, concepts: &[ExtractedConcept]) -> RetrieveResult<Vec<ScoredPassage>> {
        if concepts.is_empty() || self.concept_index.is_empty() {
            return Ok(Vec::new());
        }

        let mut best: BTreeMap<PassageId, ScoredPassage> = BTreeMap::new();

        for concept in concepts {
            let matches = self.concept_index.search(&concept.embedding, self.expansion_top_m)?;
            for hit in matches {
                let concept_id = ConceptId::new(hit.id);
                let nodes = with_store_retry(self.store_retries, || self.graph.nodes_for_concept(concept_id)).await?;
                for node in nodes {
                    let passages =
                        with_store_retry(self.store_retries, || self.graph.passages_for_node(node.id)).await?;
                    for passage in passages {
                        let score = hit.score.max(0.0);
                        best.entry(passage.id)
                            .and_modify(|existing| existing.score = existing.score.max(score))
                            .or_insert(ScoredPassage { passage, score });
                    }
                }
            }
        }

        Ok(best.into_values().collect())
    }

    /// Weighted fusion with per-channel min-max normalization; missing
    /// channels don't penalize a passage (weights renormalize over the
    /// channels the passage appears in).
    fn fuse(&self, channels: [(f32, &Vec<ScoredPassage>); 4], top_n: usize) -> Vec<ScoredPassage> {
        struct Fused {
            passage: Option<ScoredPassage>,
            weighted: f32,
            weight_sum: f32,
        }

        let mut by_id: BTreeMap<PassageId, Fused> = BTreeMap::new();

        for (weight, hits) in channels {
            if hits.is_empty() || weight <= 0.0 {
                continue;
            }
            let max = hits.iter().map(|h| h.score).fold(f32::MIN, f32::max);
            let min = hits.iter().map(|h| h.score).fold(f32::MAX, f32::min);
            let range = max - min;

            for hit in hits {
                let normalized = if range > 0.0 { (hit.score - min) / range } else { 1.0 };
                let entry = by_id.entry(hit.passage.id).or_insert(Fused {
                    passage: None,
                    weighted: 0.0,
                    weight_sum: 0.0,
                });
                entry.weighted += weight * normalized;
                entry.weight_sum += weight;
                entry.passage.get_or_insert_with(|| hit.clone());
            }
        }

        let fused: Vec<ScoredPassage> = by_id
            .into_values()
            .filter_map(|f| {
                let mut passage = f.passage?;
                passage.score = if f.weight_sum > 0.0 { f.weighted / f.weight_sum } else { 0.0 };
                Some(passage)
            })
            .collect();

        rank_and_truncate(fused, top_n)
    }
}
