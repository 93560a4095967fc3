//! Runtime configuration for the analyzer core

use crate::retriever::HybridWeights;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the analysis engine and its clients
///
/// Field defaults mirror the documented operational defaults; everything
/// can be overridden from the binary's flags or environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Cooperative delay between LLM calls within a part, in seconds
    pub rate_limit_delay: f64,

    /// Chat model name
    pub llm_model: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Default topN for retrieval queries
    pub top_n_default: usize,

    /// Fusion weights for the hybrid retriever
    pub hybrid_weights: HybridWeights,

    /// Whole-session budget, in seconds
    pub session_timeout_s: u64,

    /// Per-part soft timeout, in seconds
    pub part_timeout_s: u64,

    /// Per-LLM-call timeout, in seconds
    pub llm_timeout_s: u64,

    /// Maximum attempts for transient LLM / store failures
    pub max_retries: u32,

    /// Graph engine connection settings (used by remote store backends)
    pub graph_uri: String,
    pub graph_user: String,
    pub graph_password: String,
    pub graph_database: String,

    /// Character budget for passage context in item prompts
    pub max_context_chars: usize,

    /// Relevant clauses kept per part after merging the three queries
    pub relevant_clause_limit: usize,

    /// Concepts extracted per query
    pub max_concepts: usize,

    /// Concept vertices matched per concept during expansion
    pub expansion_top_m: usize,

    /// Per-seed full-text fan-out in the graph retriever
    pub seed_k: usize,

    /// Chunk size for the GPT-only backend (10% overlap)
    pub gpt_context_chars: usize,

    /// Fixed seed for reproducible LLM output (temperature is always 0)
    pub llm_seed: Option<u64>,

    /// Embedding dimension shared by the vector indexes
    pub embedding_dimension: usize,

    /// Directory holding the session store
    pub data_dir: PathBuf,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            rate_limit_delay: 2.0,
            llm_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            top_n_default: 15,
            hybrid_weights: HybridWeights::default(),
            session_timeout_s: 1800,
            part_timeout_s: 300,
            llm_timeout_s: 60,
            max_retries: 5,
            graph_uri: "bolt://localhost:7687".to_string(),
            graph_user: "neo4j".to_string(),
            graph_password: String::new(),
            graph_database: "contracts".to_string(),
            max_context_chars: 8192,
            relevant_clause_limit: 30,
            max_concepts: 6,
            expansion_top_m: 3,
            seed_k: 5,
            gpt_context_chars: 12_000,
            llm_seed: None,
            embedding_dimension: 1536,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl AnalyzerConfig {
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_delay.max(0.0))
    }

    pub fn part_timeout(&self) -> Duration {
        Duration::from_secs(self.part_timeout_s)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_s)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_s)
    }
}
