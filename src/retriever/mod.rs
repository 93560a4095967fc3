//! Passage retrieval: graph-first, dense, and concept-enhanced hybrid
//!
//! Three retrievers share this module: the graph-first LKG retriever, the
//! dense HiPPO retriever, and the hybrid retriever that fuses them with
//! concept matching and concept expansion.

pub mod concepts;
pub mod hippo;
pub mod hybrid;
pub mod lkg;

use crate::embed::EmbedError;
use crate::graph::{GraphError, GraphResult, Passage};
use crate::vector::VectorError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub use concepts::{ConceptExtractor, ExtractError, ExtractedConcept};
pub use hippo::HippoRetriever;
pub use hybrid::{HybridResult, HybridRetriever, HybridStats, HybridWeights};
pub use lkg::LkgRetriever;

#[derive(Error, Debug)]
pub enum RetrieveError {
    /// Every retrieval channel failed; nothing to rank
    #[error("all retrieval channels failed")]
    RetrievalUnavailable,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Embed(#[from] EmbedError),
}

pub type RetrieveResult<T> = Result<T, RetrieveError>;

/// A passage with its retrieval score
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub score: f32,
}

/// Sort descending by score, ties by passage id ascending, and truncate
pub(crate) fn rank_and_truncate(mut passages: Vec<ScoredPassage>, k: usize) -> Vec<ScoredPassage> {
    passages.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.passage.id.cmp(&b.passage.id))
    });
    passages.truncate(k);
    passages
}

const STORE_BACKOFF: Duration = Duration::from_millis(250);

/// Retry a store operation on `StoreUnavailable`, backing off
/// exponentially from 250 ms
pub(crate) async fn with_store_retry<T, F, Fut>(max_retries: u32, mut op: F) -> GraphResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GraphResult<T>>,
{
    let mut backoff = STORE_BACKOFF;
    let mut attempt = 0;
    loop {
        match op().await {
            Err(GraphError::StoreUnavailable(reason)) if attempt < max_retries => {
                attempt += 1;
                warn!(attempt, %reason, "graph store unavailable, retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            other => return other,
        }
    }
}
