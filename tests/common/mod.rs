//! Shared fixtures: deterministic client doubles and a small indexed corpus

#![allow(dead_code)]

use async_trait::async_trait;
use clausegraph::analysis::{AnalysisOrchestrator, GptOnlyAnalyzer, HybridPartAnalyzer};
use clausegraph::checklist::Catalog;
use clausegraph::config::AnalyzerConfig;
use clausegraph::embed::{EmbedError, EmbedResult, Embedder};
use clausegraph::graph::{Concept, ConceptId, GraphStore, MemoryGraph, Node, NodeId, Passage, PassageId, Relation};
use clausegraph::llm::{ChatCompletion, ChatMessage, ChatModel, ChatOptions, LlmClient, LlmError, LlmResult, RateGovernor, TokenUsage};
use clausegraph::persistence::MemorySessionStore;
use clausegraph::retriever::{ConceptExtractor, HippoRetriever, HybridRetriever, LkgRetriever};
use clausegraph::vector::VectorIndex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub const EMBED_DIM: usize = 8;

/// Deterministic embedder: token hashes folded into a fixed-dimension vector
pub struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embedding(t)).collect())
    }

    fn dimension(&self) -> usize {
        EMBED_DIM
    }
}

pub fn hash_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBED_DIM];
    for token in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
        if token.len() < 2 {
            continue;
        }
        let mut hash: u64 = 1469598103934665603;
        for b in token.bytes() {
            hash ^= b as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
        vector[(hash % EMBED_DIM as u64) as usize] += 1.0;
    }
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Embedder that always reports a network failure
pub struct DeadEmbedder;

#[async_trait]
impl Embedder for DeadEmbedder {
    async fn embed(&self, _texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        Err(EmbedError::NetworkError("embedder offline".to_string()))
    }

    fn dimension(&self) -> usize {
        EMBED_DIM
    }
}

/// Chat double returning the same payload for every call
pub struct FixedChat {
    pub response: String,
    pub calls: AtomicU32,
}

impl FixedChat {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn danger() -> Self {
        Self::new(r#"{"status":"DANGER","risk_score":5,"analysis":"x","recommendation":"y"}"#)
    }

    pub fn pass() -> Self {
        Self::new(r#"{"status":"PASS","risk_score":1,"analysis":"fine","recommendation":""}"#)
    }

    pub fn garbage() -> Self {
        Self::new("this is not json at all")
    }
}

#[async_trait]
impl ChatModel for FixedChat {
    async fn chat(&self, _messages: &[ChatMessage], _opts: &ChatOptions) -> LlmResult<ChatCompletion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChatCompletion {
            content: self.response.clone(),
            usage: TokenUsage { prompt_tokens: 100, completion_tokens: 30 },
        })
    }
}

/// Chat double that always fails permanently
pub struct DeadChat;

#[async_trait]
impl ChatModel for DeadChat {
    async fn chat(&self, _messages: &[ChatMessage], _opts: &ChatOptions) -> LlmResult<ChatCompletion> {
        Err(LlmError::Permanent("auth rejected".to_string()))
    }
}

/// Chat double that pauses at its n-th call until released, so tests can
/// line up cancellation with a known point in the item sequence
pub struct GateChat {
    inner: FixedChat,
    gate_at: u32,
    pub reached: Notify,
    pub release: Notify,
}

impl GateChat {
    pub fn new(gate_at: u32) -> Self {
        Self {
            inner: FixedChat::pass(),
            gate_at,
            reached: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl ChatModel for GateChat {
    async fn chat(&self, messages: &[ChatMessage], opts: &ChatOptions) -> LlmResult<ChatCompletion> {
        let call = self.inner.calls.load(Ordering::SeqCst);
        if call == self.gate_at {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.chat(messages, opts).await
    }
}

/// Corpus of three passages, matching entities, and one concept
pub fn sample_corpus() -> Arc<MemoryGraph> {
    let graph = MemoryGraph::new();
    let passages = [
        (1u64, "The parties to this agreement are Alpha Corp and Beta LLC, each duly organized."),
        (2u64, "Either party may terminate this agreement upon thirty days written notice."),
        (3u64, "Liability of either party is capped at the fees paid in the preceding twelve months."),
    ];
    for (id, text) in passages {
        graph.add_passage(Passage::new(PassageId::new(id), text, "contract-a", id as usize)).unwrap();
    }

    graph.add_node(Node::new(NodeId::new(10), "parties", "Entity", 10)).unwrap();
    graph.add_node(Node::new(NodeId::new(11), "termination", "Entity", 11)).unwrap();
    graph.add_node(Node::new(NodeId::new(12), "liability", "Entity", 12)).unwrap();
    graph.add_relation(Relation::new(NodeId::new(11), NodeId::new(12), "LIMITS")).unwrap();
    graph.link_mention(NodeId::new(10), PassageId::new(1)).unwrap();
    graph.link_mention(NodeId::new(11), PassageId::new(2)).unwrap();
    graph.link_mention(NodeId::new(12), PassageId::new(3)).unwrap();

    graph
        .add_concept(Concept::new(ConceptId::new(50), "termination", hash_embedding("termination")))
        .unwrap();
    graph.link_concept(NodeId::new(11), ConceptId::new(50)).unwrap();

    Arc::new(graph)
}

pub fn test_config() -> Arc<AnalyzerConfig> {
    Arc::new(AnalyzerConfig {
        rate_limit_delay: 0.0,
        llm_seed: Some(42),
        embedding_dimension: EMBED_DIM,
        ..AnalyzerConfig::default()
    })
}

pub struct Harness {
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub hybrid: Arc<HybridRetriever>,
    pub store: Arc<MemorySessionStore>,
    pub graph: Arc<MemoryGraph>,
}

/// Wire the full stack over client doubles
pub async fn build_harness(chat: Arc<dyn ChatModel>, embedder: Arc<dyn Embedder>) -> Harness {
    let config = test_config();
    let graph = sample_corpus();
    let graph_store: Arc<dyn GraphStore> = graph.clone();

    let mut passage_index = VectorIndex::new(EMBED_DIM);
    for id in 1..=3u64 {
        let passage = graph_store.get_passage(PassageId::new(id)).await.unwrap().unwrap();
        passage_index.upsert(id, hash_embedding(&passage.text)).unwrap();
    }
    let mut concept_index = VectorIndex::new(EMBED_DIM);
    for (id, embedding) in graph.concept_embeddings().unwrap() {
        concept_index.upsert(id.as_u64(), embedding).unwrap();
    }

    let extractor = Arc::new(ConceptExtractor::new(embedder.clone(), config.max_concepts));
    let lkg = Arc::new(LkgRetriever::new(graph_store.clone(), extractor.clone(), config.seed_k, 1));
    let hippo = Arc::new(HippoRetriever::new(embedder.clone(), Arc::new(passage_index), graph_store.clone(), 1));
    let hybrid = Arc::new(HybridRetriever::new(
        lkg,
        hippo,
        extractor,
        graph_store.clone(),
        Arc::new(concept_index),
        config.hybrid_weights,
        config.expansion_top_m,
        1,
    ));

    let llm = Arc::new(LlmClient::new(chat, Arc::new(RateGovernor::unlimited()), 2));
    let catalog = Arc::new(Catalog::builtin().unwrap());
    let store = Arc::new(MemorySessionStore::new());

    let hybrid_analyzer = Arc::new(HybridPartAnalyzer::new(hybrid.clone(), llm.clone(), config.clone()));
    let gpt_only = Arc::new(GptOnlyAnalyzer::new(llm, config.clone()));

    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        catalog,
        hybrid_analyzer,
        gpt_only,
        store.clone(),
        config,
    ));

    Harness {
        orchestrator,
        hybrid,
        store,
        graph,
    }
}

/// Poll the status endpoint until the predicate holds
pub async fn wait_until<F>(orchestrator: &Arc<AnalysisOrchestrator>, analysis_id: &str, mut predicate: F)
where
    F: FnMut(&clausegraph::analysis::StatusView) -> bool,
{
    for _ in 0..2000 {
        let status = orchestrator.get_status(analysis_id).await.unwrap();
        if predicate(&status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached for analysis {}", analysis_id);
}
