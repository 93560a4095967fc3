//! Per-part risk analysis: three retrieval queries, one LLM call per
//! checklist item, banded aggregation
//!
//! A part always produces a `PartResult`. Item-level problems degrade to a
//! fallback verdict; retrieval loss, timeout, and cancellation fail the
//! part while retaining the items completed so far.

use super::session::{ItemResult, ItemStatus, PartResult};
use super::CancelFlag;
use crate::checklist::ChecklistPart;
use crate::config::AnalyzerConfig;
use crate::llm::{ChatMessage, ChatOptions, LlmClient};
use crate::retriever::{HybridRetriever, HybridStats, ScoredPassage};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Analyzer backend seam; the orchestrator drives either implementation
#[async_trait]
pub trait PartAnalyzer: Send + Sync {
    async fn analyze_part(&self, part: &ChecklistPart, contract_text: &str, cancel: &CancelFlag) -> PartResult;
}

pub(crate) const ANALYST_SYSTEM_PROMPT: &str = "You are a contract-risk analyst. \
Assess exactly one checklist question against the supplied contract clauses. \
Respond with a single JSON object and nothing else, using this schema: \
{\"status\": \"PASS\"|\"WARN\"|\"DANGER\", \"risk_score\": <integer 0-5>, \
\"analysis\": <string, max 500 chars>, \"recommendation\": <string, max 500 chars>}. \
A score of 0 means no risk and 5 means severe risk.";

const REPAIR_SYSTEM_PROMPT: &str = "You repair malformed JSON. Return only the corrected JSON object, \
with keys status, risk_score, analysis, recommendation. No commentary, no markdown.";

const FIELD_CHAR_LIMIT: usize = 500;

/// Raw shape the model is asked to produce
#[derive(Debug, Deserialize)]
struct RawAssessment {
    #[serde(default)]
    status: String,
    #[serde(default)]
    risk_score: f64,
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    recommendation: String,
}

/// Outcome of interpreting one model response
pub(crate) enum ItemOutcome {
    Parsed(ItemResult),
    ParseFailure,
}

impl ItemOutcome {
    /// The parse-error fallback verdict: WARN, score 2
    pub(crate) fn or_fallback(self, item_text: &str) -> ItemResult {
        match self {
            ItemOutcome::Parsed(result) => result,
            ItemOutcome::ParseFailure => ItemResult {
                item_text: item_text.to_string(),
                status: ItemStatus::Warn,
                risk_score: 2,
                analysis: "parse_error".to_string(),
                recommendation: String::new(),
            },
        }
    }
}

/// Strip markdown fences and surrounding prose, keeping the outermost
/// JSON object
fn extract_json(response: &str) -> Option<&str> {
    let trimmed = response.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&trimmed[start..=end])
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    text.chars().take(limit).collect()
}

/// Interpret a model response as an item verdict
///
/// Score is clamped to 0..=5 and the status is forced to the band the
/// score implies, so the two never disagree.
pub(crate) fn interpret_response(response: &str, item_text: &str) -> ItemOutcome {
    let Some(json) = extract_json(response) else {
        return ItemOutcome::ParseFailure;
    };
    let Ok(raw) = serde_json::from_str::<RawAssessment>(json) else {
        return ItemOutcome::ParseFailure;
    };

    // the score band always wins over the model's own status label
    let score = raw.risk_score.round().clamp(0.0, 5.0) as u8;
    let status = ItemStatus::from_score(score);
    let expected_label = match status {
        ItemStatus::Pass => "PASS",
        ItemStatus::Warn => "WARN",
        ItemStatus::Danger => "DANGER",
    };
    if !raw.status.is_empty() && raw.status.to_uppercase() != expected_label {
        debug!(label = %raw.status, score, "status label inconsistent with score, forcing band");
    }

    ItemOutcome::Parsed(ItemResult {
        item_text: item_text.to_string(),
        status,
        risk_score: score,
        analysis: truncate_chars(raw.analysis.trim(), FIELD_CHAR_LIMIT),
        recommendation: truncate_chars(raw.recommendation.trim(), FIELD_CHAR_LIMIT),
    })
}

/// One chat call for one checklist item, with a single-shot JSON repair
/// before giving up
pub(crate) async fn analyze_item(
    llm: &LlmClient,
    config: &AnalyzerConfig,
    part: &ChecklistPart,
    item_text: &str,
    context: &str,
) -> ItemResult {
    let opts = ChatOptions {
        max_tokens: 512,
        temperature: 0.0,
        seed: config.llm_seed,
    };

    let user_prompt = format!(
        "Part: {}\nTop risk pattern: {}\nCore question: {}\nMitigation strategy: {}\n\n\
         Relevant clauses:\n{}\n\nChecklist question: {}",
        part.part_title,
        part.top_risk_pattern,
        part.core_question,
        part.mitigation_strategy,
        context,
        item_text,
    );

    let messages = [ChatMessage::system(ANALYST_SYSTEM_PROMPT), ChatMessage::user(user_prompt)];

    let response = match llm.chat(&messages, &opts).await {
        Ok(completion) => completion.content,
        Err(e) => {
            warn!(item = item_text, error = %e, "item LLM call failed");
            return ItemOutcome::ParseFailure.or_fallback(item_text);
        }
    };

    match interpret_response(&response, item_text) {
        ItemOutcome::Parsed(result) => result,
        ItemOutcome::ParseFailure => {
            // one repair pass, then the fallback verdict
            let repair = [
                ChatMessage::system(REPAIR_SYSTEM_PROMPT),
                ChatMessage::user(response),
            ];
            match llm.chat(&repair, &opts).await {
                Ok(repaired) => interpret_response(&repaired.content, item_text).or_fallback(item_text),
                Err(e) => {
                    warn!(item = item_text, error = %e, "JSON repair call failed");
                    ItemOutcome::ParseFailure.or_fallback(item_text)
                }
            }
        }
    }
}

/// Pack clause texts into the prompt's character budget
pub(crate) fn build_context(clauses: &[String], budget: usize) -> String {
    let mut context = String::new();
    for clause in clauses {
        let line = format!("- {}\n", clause.trim());
        if context.len() + line.len() > budget {
            break;
        }
        context.push_str(&line);
    }
    if context.is_empty() {
        context.push_str("(no relevant clauses found)\n");
    }
    context
}

/// Hybrid-retrieval part analyzer
pub struct HybridPartAnalyzer {
    retriever: Arc<HybridRetriever>,
    llm: Arc<LlmClient>,
    config: Arc<AnalyzerConfig>,
}

impl HybridPartAnalyzer {
    pub fn new(retriever: Arc<HybridRetriever>, llm: Arc<LlmClient>, config: Arc<AnalyzerConfig>) -> Self {
        Self {
            retriever,
            llm,
            config,
        }
    }

    /// The three search queries derived from a checklist part
    fn part_queries(part: &ChecklistPart) -> Vec<String> {
        let mut queries = vec![part.core_question.clone(), part.top_risk_pattern.clone()];
        let cross = part.cross_clause_analysis.join(" ");
        if !cross.trim().is_empty() {
            queries.push(cross);
        }
        queries.retain(|q| !q.trim().is_empty());
        queries
    }
}

#[async_trait]
impl PartAnalyzer for HybridPartAnalyzer {
    async fn analyze_part(&self, part: &ChecklistPart, contract_text: &str, cancel: &CancelFlag) -> PartResult {
        let started = Instant::now();
        let deadline = started + self.config.part_timeout();
        let number = part.part_number;
        let title = part.part_title.clone();

        info!(part = number, title = %title, "part analysis started");

        if contract_text.trim().is_empty() {
            return PartResult::failed(number, title, "no_context", vec![], vec![], HybridStats::default(), 0.0);
        }

        // retrieval: three queries, union by passage id keeping the best
        // fused score
        let mut stats = HybridStats::default();
        let mut best: BTreeMap<crate::graph::PassageId, ScoredPassage> = BTreeMap::new();
        let mut successful_queries = 0usize;

        for query in Self::part_queries(part) {
            if cancel.is_canceled() {
                return PartResult::failed(number, title, "canceled", vec![], vec![], stats, started.elapsed().as_secs_f64());
            }

            match self.retriever.hybrid_retrieve(&query, self.config.top_n_default).await {
                Ok(result) => {
                    stats.merge(&result.stats);
                    successful_queries += 1;
                    for hit in result.passages {
                        best.entry(hit.passage.id)
                            .and_modify(|existing| {
                                if hit.score > existing.score {
                                    existing.score = hit.score;
                                }
                            })
                            .or_insert(hit);
                    }
                }
                Err(e) => {
                    warn!(part = number, %query, error = %e, "part retrieval query failed");
                    stats.failed_searches += 1;
                }
            }
        }

        if successful_queries == 0 {
            return PartResult::failed(
                number,
                title,
                "retrieval_unavailable",
                vec![],
                vec![],
                stats,
                started.elapsed().as_secs_f64(),
            );
        }

        let mut merged: Vec<ScoredPassage> = best.into_values().collect();
        merged.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.passage.id.cmp(&b.passage.id))
        });
        merged.truncate(self.config.relevant_clause_limit);

        let relevant_clauses: Vec<String> = merged.iter().map(|p| p.passage.text.clone()).collect();
        let context = build_context(&relevant_clauses, self.config.max_context_chars);

        // item loop: sequential, rate-limit delay between LLM calls
        let mut items: Vec<ItemResult> = Vec::with_capacity(part.deep_dive_checklist.len());
        for (i, item) in part.deep_dive_checklist.iter().enumerate() {
            if cancel.is_canceled() {
                return PartResult::failed(
                    number,
                    title,
                    "canceled",
                    items,
                    relevant_clauses,
                    stats,
                    started.elapsed().as_secs_f64(),
                );
            }
            if Instant::now() > deadline {
                warn!(part = number, "part soft timeout breached");
                return PartResult::failed(
                    number,
                    title,
                    "timeout",
                    items,
                    relevant_clauses,
                    stats,
                    started.elapsed().as_secs_f64(),
                );
            }
            if i > 0 {
                tokio::time::sleep(self.config.rate_limit_delay()).await;
            }

            let result = analyze_item(&self.llm, &self.config, part, &item.text, &context).await;
            items.push(result);
        }

        let duration = started.elapsed().as_secs_f64();
        info!(part = number, items = items.len(), duration, "part analysis complete");

        PartResult::completed(
            number,
            title,
            items,
            relevant_clauses,
            &part.mitigation_strategy,
            stats,
            duration,
        )
    }
}
