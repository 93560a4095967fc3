//! Clausegraph server — contract-risk analysis over an indexed corpus

use clap::Parser;
use clausegraph::analysis::{AnalysisOrchestrator, GptOnlyAnalyzer, HybridPartAnalyzer};
use clausegraph::checklist::Catalog;
use clausegraph::config::AnalyzerConfig;
use clausegraph::embed::{Embedder, OpenAiEmbeddingClient};
use clausegraph::graph::{CorpusSnapshot, GraphStore, MemoryGraph};
use clausegraph::http::{AppState, HttpServer};
use clausegraph::llm::{LlmClient, OpenAiChatClient, RateGovernor};
use clausegraph::persistence::RocksSessionStore;
use clausegraph::retriever::{ConceptExtractor, HippoRetriever, HybridRetriever, LkgRetriever};
use clausegraph::vector::VectorIndex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clausegraph", version, about = "Retrieval-augmented contract-risk analyzer")]
struct Cli {
    /// HTTP port to listen on
    #[arg(long, default_value_t = 8000, env = "CLAUSEGRAPH_PORT")]
    port: u16,

    /// Directory for the session store
    #[arg(long, default_value = "data", env = "CLAUSEGRAPH_DATA_DIR")]
    data_dir: PathBuf,

    /// Corpus snapshot (JSON) produced by the ingestion pipeline
    #[arg(long, env = "CLAUSEGRAPH_CORPUS")]
    corpus: Option<PathBuf>,

    /// OpenAI-compatible API base URL
    #[arg(long, default_value = "https://api.openai.com/v1", env = "OPENAI_API_BASE")]
    api_base: String,

    /// API key for the chat and embedding endpoints
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,

    /// Chat model
    #[arg(long, default_value = "gpt-4o-mini", env = "CLAUSEGRAPH_LLM_MODEL")]
    llm_model: String,

    /// Embedding model
    #[arg(long, default_value = "text-embedding-3-small", env = "CLAUSEGRAPH_EMBEDDING_MODEL")]
    embedding_model: String,

    /// Embedding dimension shared by corpus and query vectors
    #[arg(long, default_value_t = 1536)]
    embedding_dimension: usize,

    /// Delay between LLM calls within a part, seconds
    #[arg(long, default_value_t = 2.0)]
    rate_limit_delay: f64,

    /// Shared LLM token budget per minute (leaky bucket)
    #[arg(long, default_value_t = 120_000.0)]
    tokens_per_minute: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = Arc::new(AnalyzerConfig {
        llm_model: cli.llm_model.clone(),
        embedding_model: cli.embedding_model.clone(),
        embedding_dimension: cli.embedding_dimension,
        rate_limit_delay: cli.rate_limit_delay,
        data_dir: cli.data_dir.clone(),
        ..AnalyzerConfig::default()
    });

    // clients
    let chat = Arc::new(OpenAiChatClient::new(
        &cli.api_base,
        &cli.api_key,
        &config.llm_model,
        config.llm_timeout(),
    )?);
    let governor = Arc::new(RateGovernor::new(cli.tokens_per_minute, cli.tokens_per_minute / 60.0));
    let llm = Arc::new(LlmClient::new(chat, governor, config.max_retries));

    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbeddingClient::new(
        &cli.api_base,
        &cli.api_key,
        &config.embedding_model,
        config.embedding_dimension,
        config.llm_timeout(),
    )?);

    // corpus
    let graph = Arc::new(MemoryGraph::with_database(&config.graph_database));
    let mut passage_index = VectorIndex::new(config.embedding_dimension);
    let mut concept_index = VectorIndex::new(config.embedding_dimension);

    if let Some(path) = &cli.corpus {
        let json = std::fs::read_to_string(path)?;
        let snapshot = CorpusSnapshot::from_json(&json)?;
        for (id, vector) in &snapshot.passage_embeddings {
            passage_index.upsert(id.as_u64(), vector.clone())?;
        }
        graph.load_snapshot(snapshot)?;
        for (id, embedding) in graph.concept_embeddings()? {
            concept_index.upsert(id.as_u64(), embedding)?;
        }
        let stats = graph.stats().await?;
        info!(passages = stats.passages, nodes = stats.nodes, concepts = stats.concepts, "corpus ready");
    } else {
        warn!("no corpus snapshot given; retrieval will run over an empty graph");
    }
    let passage_index = Arc::new(passage_index);
    let concept_index = Arc::new(concept_index);

    // retrievers
    let graph_store: Arc<dyn GraphStore> = graph;
    let extractor = Arc::new(ConceptExtractor::new(Arc::clone(&embedder), config.max_concepts));
    let lkg = Arc::new(LkgRetriever::new(
        Arc::clone(&graph_store),
        Arc::clone(&extractor),
        config.seed_k,
        config.max_retries,
    ));
    let hippo = Arc::new(HippoRetriever::new(
        Arc::clone(&embedder),
        passage_index,
        Arc::clone(&graph_store),
        config.max_retries,
    ));
    let hybrid = Arc::new(HybridRetriever::new(
        lkg,
        hippo,
        extractor,
        Arc::clone(&graph_store),
        concept_index,
        config.hybrid_weights,
        config.expansion_top_m,
        config.max_retries,
    ));

    // analysis stack
    let catalog = Arc::new(Catalog::builtin()?);
    let store = Arc::new(RocksSessionStore::open(config.data_dir.join("sessions"))?);
    let hybrid_analyzer = Arc::new(HybridPartAnalyzer::new(
        Arc::clone(&hybrid),
        Arc::clone(&llm),
        Arc::clone(&config),
    ));
    let gpt_only = Arc::new(GptOnlyAnalyzer::new(Arc::clone(&llm), Arc::clone(&config)));
    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        catalog,
        hybrid_analyzer,
        gpt_only,
        store,
        Arc::clone(&config),
    ));

    let state = Arc::new(AppState {
        orchestrator,
        hybrid,
        graph: graph_store,
        config,
    });

    HttpServer::new(state, cli.port).start().await
}
