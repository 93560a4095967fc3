//! Clausegraph — retrieval-augmented contract-risk analysis
//!
//! A contract corpus is indexed (externally) into a property graph of
//! passages, entities, and concepts plus a vector index over passage
//! embeddings. Analysis runs a fixed ten-part legal checklist: for each
//! part, a concept-enhanced hybrid retrieval gathers the relevant clauses,
//! and a rate-limited LLM scores every checklist item into a banded risk
//! verdict.
//!
//! # Architecture
//!
//! - [`graph`] — the property graph store and full-text indices
//! - [`vector`] — ANN search over passage and concept embeddings
//! - [`llm`] / [`embed`] — chat and embedding clients with retry and a
//!   shared token-rate governor
//! - [`retriever`] — LKG (graph-first), HiPPO (dense), and the hybrid
//!   fusion retriever
//! - [`checklist`] — the versioned ten-part catalog
//! - [`analysis`] — per-part analyzers and the sequential orchestrator
//! - [`persistence`] — durable session storage
//! - [`http`] — thin axum transport over the core commands
//!
//! # Example
//!
//! ```no_run
//! use clausegraph::checklist::Catalog;
//!
//! let catalog = Catalog::builtin().expect("valid catalog");
//! assert_eq!(catalog.analysis_parts.len(), 10);
//! ```

#![warn(clippy::all)]

pub mod analysis;
pub mod checklist;
pub mod config;
pub mod embed;
pub mod graph;
pub mod http;
pub mod llm;
pub mod persistence;
pub mod retriever;
pub mod vector;

pub use analysis::{
    AnalysisBackend, AnalysisError, AnalysisOrchestrator, AnalysisResult, AnalysisSession,
    GptOnlyAnalyzer, HybridPartAnalyzer, IntegratedReport, ItemResult, ItemStatus, PartAnalyzer,
    PartResult, PartStatus, RiskLevel, SessionStatus, SessionSummary, StartRequest,
};

pub use checklist::{Catalog, CatalogError, ChecklistItem, ChecklistPart};

pub use config::AnalyzerConfig;

pub use graph::{
    Concept, ConceptId, CorpusSnapshot, GraphError, GraphResult, GraphStats, GraphStore, Label,
    MemoryGraph, Node, NodeId, Passage, PassageId, Relation, RelationType,
};

pub use llm::{ChatModel, LlmClient, LlmError, OpenAiChatClient, RateGovernor};

pub use embed::{EmbedError, Embedder, OpenAiEmbeddingClient};

pub use persistence::{MemorySessionStore, RocksSessionStore, SessionStore, StorageError};

pub use retriever::{
    ConceptExtractor, HippoRetriever, HybridResult, HybridRetriever, HybridStats, HybridWeights,
    LkgRetriever, RetrieveError, ScoredPassage,
};

pub use vector::{VectorError, VectorHit, VectorIndex};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
