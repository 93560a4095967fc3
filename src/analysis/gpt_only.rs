//! Degenerate analyzer that feeds the contract text directly to the model
//!
//! Used as a baseline and as the fallback when the graph and vector stores
//! are unavailable. The contract is chunked with 10% overlap; for each
//! checklist item the chunks most lexically similar to the part's core
//! question and the item are packed into the context budget, so the call
//! count matches the hybrid path exactly.

use super::part::{analyze_item, build_context, PartAnalyzer};
use super::session::{ItemResult, PartResult};
use super::CancelFlag;
use crate::checklist::ChecklistPart;
use crate::config::AnalyzerConfig;
use crate::graph::tokenize;
use crate::llm::LlmClient;
use crate::retriever::HybridStats;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

/// Retrieval-free part analyzer over the raw contract text
pub struct GptOnlyAnalyzer {
    llm: Arc<LlmClient>,
    config: Arc<AnalyzerConfig>,
}

impl GptOnlyAnalyzer {
    pub fn new(llm: Arc<LlmClient>, config: Arc<AnalyzerConfig>) -> Self {
        Self { llm, config }
    }
}

/// Character-based splitter with proportional overlap
pub(crate) fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Token-overlap score between a probe text and a chunk
fn overlap_score(probe_tokens: &[String], chunk: &str) -> usize {
    let chunk_tokens = tokenize(chunk);
    probe_tokens.iter().filter(|t| chunk_tokens.contains(t)).count()
}

/// Order chunks by relevance to the probe, most relevant first
fn rank_chunks<'a>(chunks: &'a [String], probe: &str) -> Vec<&'a String> {
    let probe_tokens: Vec<String> = {
        let mut seen = Vec::new();
        for t in tokenize(probe) {
            if !seen.contains(&t) {
                seen.push(t);
            }
        }
        seen
    };

    let mut indexed: Vec<(usize, usize)> = chunks
        .iter()
        .enumerate()
        .map(|(i, c)| (i, overlap_score(&probe_tokens, c)))
        .collect();
    indexed.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    indexed.into_iter().map(|(i, _)| &chunks[i]).collect()
}

#[async_trait]
impl PartAnalyzer for GptOnlyAnalyzer {
    async fn analyze_part(&self, part: &ChecklistPart, contract_text: &str, cancel: &CancelFlag) -> PartResult {
        let started = Instant::now();
        let deadline = started + self.config.part_timeout();
        let number = part.part_number;
        let title = part.part_title.clone();

        info!(part = number, title = %title, "gpt-only part analysis started");

        if contract_text.trim().is_empty() {
            return PartResult::failed(number, title, "no_context", vec![], vec![], HybridStats::default(), 0.0);
        }

        let chunk_size = self.config.gpt_context_chars;
        let chunks = chunk_text(contract_text, chunk_size, chunk_size / 10);

        let mut items: Vec<ItemResult> = Vec::with_capacity(part.deep_dive_checklist.len());
        for (i, item) in part.deep_dive_checklist.iter().enumerate() {
            if cancel.is_canceled() {
                return PartResult::failed(
                    number,
                    title,
                    "canceled",
                    items,
                    vec![],
                    HybridStats::default(),
                    started.elapsed().as_secs_f64(),
                );
            }
            if Instant::now() > deadline {
                warn!(part = number, "gpt-only part soft timeout breached");
                return PartResult::failed(
                    number,
                    title,
                    "timeout",
                    items,
                    vec![],
                    HybridStats::default(),
                    started.elapsed().as_secs_f64(),
                );
            }
            if i > 0 {
                tokio::time::sleep(self.config.rate_limit_delay()).await;
            }

            let probe = format!("{} {}", part.core_question, item.text);
            let ranked: Vec<String> = rank_chunks(&chunks, &probe).into_iter().cloned().collect();
            let context = build_context(&ranked, self.config.max_context_chars);

            let result = analyze_item(&self.llm, &self.config, part, &item.text, &context).await;
            items.push(result);
        }

        let duration = started.elapsed().as_secs_f64();
        info!(part = number, items = items.len(), duration, "gpt-only part analysis complete");

        // no corpus, so no relevant clauses and empty retrieval stats
        PartResult::completed(number, title, items, vec![], &part.mitigation_strategy, HybridStats::default(), duration)
    }
}
