//! Analysis session state: statuses, item and part results, risk banding

use crate::retriever::HybridStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle of an analysis session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Canceled)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Pending => "PENDING",
            SessionStatus::Running => "RUNNING",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Failed => "FAILED",
            SessionStatus::Canceled => "CANCELED",
        };
        write!(f, "{}", s)
    }
}

/// Which analyzer produced a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisBackend {
    /// Hybrid retrieval over the indexed corpus
    #[default]
    Hybrid,
    /// Direct chunked-contract analysis, no retrieval
    GptOnly,
}

/// Checklist-item verdict, always consistent with the score band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pass,
    Warn,
    Danger,
}

impl ItemStatus {
    /// Band implied by an item score: PASS 0–1, WARN 2–3, DANGER 4–5
    pub fn from_score(score: u8) -> Self {
        match score {
            0 | 1 => ItemStatus::Pass,
            2 | 3 => ItemStatus::Warn,
            _ => ItemStatus::Danger,
        }
    }
}

/// Part-level risk band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Bands: [0,1) LOW, [1,2.5) MEDIUM, [2.5,4) HIGH, [4,5] CRITICAL
    pub fn from_score(score: f64) -> Self {
        if score < 1.0 {
            RiskLevel::Low
        } else if score < 2.5 {
            RiskLevel::Medium
        } else if score < 4.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Scored verdict for one checklist item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResult {
    pub item_text: String,
    pub status: ItemStatus,
    /// Integer 0..=5
    pub risk_score: u8,
    pub analysis: String,
    pub recommendation: String,
}

/// Terminal state of one analyzed part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartStatus {
    Completed,
    Failed,
}

/// Aggregated result for one checklist part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartResult {
    pub part_number: u8,
    pub part_title: String,
    pub status: PartStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Mean of item scores, one decimal
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub checklist_results: Vec<ItemResult>,
    pub relevant_clauses: Vec<String>,
    pub recommendations: Vec<String>,
    pub hybrid_search_stats: HybridStats,
    pub duration_seconds: f64,
}

/// Recommendations are deduplicated by this many leading characters
const RECOMMENDATION_PREFIX: usize = 40;
const MAX_RECOMMENDATIONS: usize = 5;

impl PartResult {
    /// Build a completed part result from its item results
    #[allow(clippy::too_many_arguments)]
    pub fn completed(
        part_number: u8,
        part_title: impl Into<String>,
        checklist_results: Vec<ItemResult>,
        relevant_clauses: Vec<String>,
        mitigation_strategy: &str,
        hybrid_search_stats: HybridStats,
        duration_seconds: f64,
    ) -> Self {
        let risk_score = mean_item_score(&checklist_results);
        let recommendations = collect_recommendations(&checklist_results, mitigation_strategy);

        PartResult {
            part_number,
            part_title: part_title.into(),
            status: PartStatus::Completed,
            failure_reason: None,
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            checklist_results,
            relevant_clauses,
            recommendations,
            hybrid_search_stats,
            duration_seconds,
        }
    }

    /// Build a failed part result, retaining any items completed so far
    #[allow(clippy::too_many_arguments)]
    pub fn failed(
        part_number: u8,
        part_title: impl Into<String>,
        reason: impl Into<String>,
        checklist_results: Vec<ItemResult>,
        relevant_clauses: Vec<String>,
        hybrid_search_stats: HybridStats,
        duration_seconds: f64,
    ) -> Self {
        let risk_score = mean_item_score(&checklist_results);

        PartResult {
            part_number,
            part_title: part_title.into(),
            status: PartStatus::Failed,
            failure_reason: Some(reason.into()),
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            checklist_results,
            relevant_clauses,
            recommendations: Vec::new(),
            hybrid_search_stats,
            duration_seconds,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.failure_reason.as_deref() == Some("canceled")
    }
}

fn mean_item_score(items: &[ItemResult]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    let total: u32 = items.iter().map(|i| i.risk_score as u32).sum();
    round1(total as f64 / items.len() as f64)
}

/// Up to five highest-scoring non-empty recommendations, deduplicated by
/// prefix; the part's mitigation strategy fills a remaining slot.
fn collect_recommendations(items: &[ItemResult], mitigation_strategy: &str) -> Vec<String> {
    let mut scored: Vec<(&ItemResult, usize)> = items
        .iter()
        .filter(|i| !i.recommendation.trim().is_empty())
        .zip(0..)
        .collect();
    scored.sort_by(|a, b| b.0.risk_score.cmp(&a.0.risk_score).then(a.1.cmp(&b.1)));

    let mut recommendations: Vec<String> = Vec::new();
    let mut prefixes: Vec<String> = Vec::new();

    for (item, _) in scored {
        if recommendations.len() >= MAX_RECOMMENDATIONS {
            break;
        }
        let prefix: String = item
            .recommendation
            .to_lowercase()
            .chars()
            .take(RECOMMENDATION_PREFIX)
            .collect();
        if prefixes.contains(&prefix) {
            continue;
        }
        prefixes.push(prefix);
        recommendations.push(item.recommendation.trim().to_string());
    }

    if recommendations.len() < MAX_RECOMMENDATIONS && !mitigation_strategy.trim().is_empty() {
        recommendations.push(mitigation_strategy.trim().to_string());
    }

    recommendations
}

/// A stateful, cancelable run of the checklist over one contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub id: String,
    pub contract_id: String,
    pub contract_name: String,
    pub backend: AnalysisBackend,
    pub status: SessionStatus,
    /// 0..=100, monotonically non-decreasing
    pub progress: u8,
    pub selected_parts: Vec<u8>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Keyed by part number; ascending iteration order
    pub part_results: BTreeMap<u8, PartResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_part_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisSession {
    pub fn new(
        id: impl Into<String>,
        contract_id: impl Into<String>,
        contract_name: impl Into<String>,
        backend: AnalysisBackend,
        selected_parts: Vec<u8>,
        started_at: DateTime<Utc>,
    ) -> Self {
        AnalysisSession {
            id: id.into(),
            contract_id: contract_id.into(),
            contract_name: contract_name.into(),
            backend,
            status: SessionStatus::Pending,
            progress: 0,
            selected_parts,
            started_at,
            finished_at: None,
            part_results: BTreeMap::new(),
            current_part_title: None,
            error: None,
        }
    }

    /// Parts that reached a terminal state and count toward progress
    /// (a part interrupted by cancellation does not)
    pub fn completed_parts(&self) -> usize {
        self.part_results.values().filter(|p| !p.is_canceled()).count()
    }

    /// Recompute `progress` from recorded parts
    pub fn update_progress(&mut self) {
        if self.selected_parts.is_empty() {
            self.progress = 100;
            return;
        }
        self.progress = (100 * self.completed_parts() / self.selected_parts.len()) as u8;
    }

    /// Mean risk score across successfully completed parts
    pub fn overall_risk_score(&self) -> Option<f64> {
        let completed: Vec<f64> = self
            .part_results
            .values()
            .filter(|p| p.status == PartStatus::Completed)
            .map(|p| p.risk_score)
            .collect();
        if completed.is_empty() {
            return None;
        }
        Some(round1(completed.iter().sum::<f64>() / completed.len() as f64))
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            contract_name: self.contract_name.clone(),
            backend: self.backend,
            status: self.status,
            progress: self.progress,
            started_at: self.started_at,
            finished_at: self.finished_at,
            overall_risk_score: self.overall_risk_score(),
            total_parts: self.selected_parts.len(),
        }
    }
}

/// Lightweight listing entry; never carries part-result bodies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub contract_name: String,
    pub backend: AnalysisBackend,
    pub status: SessionStatus,
    pub progress: u8,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_risk_score: Option<f64>,
    pub total_parts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(score: u8, recommendation: &str) -> ItemResult {
        ItemResult {
            item_text: "item".to_string(),
            status: ItemStatus::from_score(score),
            risk_score: score,
            analysis: "analysis".to_string(),
            recommendation: recommendation.to_string(),
        }
    }

    #[test]
    fn test_item_status_bands() {
        assert_eq!(ItemStatus::from_score(0), ItemStatus::Pass);
        assert_eq!(ItemStatus::from_score(1), ItemStatus::Pass);
        assert_eq!(ItemStatus::from_score(2), ItemStatus::Warn);
        assert_eq!(ItemStatus::from_score(3), ItemStatus::Warn);
        assert_eq!(ItemStatus::from_score(4), ItemStatus::Danger);
        assert_eq!(ItemStatus::from_score(5), ItemStatus::Danger);
    }

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(1.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(2.4), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(2.5), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(3.9), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(4.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(5.0), RiskLevel::Critical);
    }

    #[test]
    fn test_part_score_is_rounded_mean() {
        let result = PartResult::completed(
            1,
            "Parties",
            vec![item(1, "a"), item(2, "b"), item(2, "c")],
            vec![],
            "",
            HybridStats::default(),
            1.0,
        );
        // mean of 1,2,2 = 1.666... -> 1.7
        assert_eq!(result.risk_score, 1.7);
        assert_eq!(result.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_recommendations_capped_and_deduplicated() {
        let items = vec![
            item(5, "Negotiate a mutual liability cap with defined carve-outs."),
            item(5, "Negotiate a mutual liability cap with DIFFERENT tail text."),
            item(4, "Add a parent guarantee."),
            item(3, "Require itemized invoices."),
            item(2, "Define cure periods."),
            item(1, "Track renewal deadlines."),
            item(1, ""),
        ];
        let result = PartResult::completed(5, "Liability", items, vec![], "", HybridStats::default(), 1.0);

        assert!(result.recommendations.len() <= 5);
        // prefix-duplicate dropped
        let cap_count = result
            .recommendations
            .iter()
            .filter(|r| r.starts_with("Negotiate a mutual liability cap"))
            .count();
        assert_eq!(cap_count, 1);
        // highest scoring first
        assert!(result.recommendations[0].starts_with("Negotiate"));
    }

    #[test]
    fn test_mitigation_strategy_fills_spare_slot() {
        let result = PartResult::completed(
            1,
            "Parties",
            vec![item(3, "Check signing authority.")],
            vec![],
            "Verify corporate registrations.",
            HybridStats::default(),
            1.0,
        );
        assert_eq!(result.recommendations.len(), 2);
        assert_eq!(result.recommendations[1], "Verify corporate registrations.");
    }

    #[test]
    fn test_failed_part_retains_partial_items() {
        let result = PartResult::failed(
            3,
            "Price",
            "timeout",
            vec![item(4, "a"), item(2, "b")],
            vec![],
            HybridStats::default(),
            301.0,
        );
        assert_eq!(result.status, PartStatus::Failed);
        assert_eq!(result.failure_reason.as_deref(), Some("timeout"));
        assert_eq!(result.checklist_results.len(), 2);
        assert_eq!(result.risk_score, 3.0);
    }

    #[test]
    fn test_progress_excludes_canceled_part() {
        let mut session = AnalysisSession::new(
            "a1",
            "c1",
            "Contract",
            AnalysisBackend::Hybrid,
            (1..=10).collect(),
            Utc::now(),
        );
        for n in 1..=2u8 {
            session.part_results.insert(
                n,
                PartResult::completed(n, "t", vec![item(1, "")], vec![], "", HybridStats::default(), 1.0),
            );
        }
        session.part_results.insert(
            3,
            PartResult::failed(3, "t", "canceled", vec![], vec![], HybridStats::default(), 1.0),
        );
        session.update_progress();
        assert_eq!(session.progress, 20);
    }

    #[test]
    fn test_overall_score_ignores_failed_parts() {
        let mut session = AnalysisSession::new(
            "a1",
            "c1",
            "Contract",
            AnalysisBackend::Hybrid,
            vec![1, 2],
            Utc::now(),
        );
        session.part_results.insert(
            1,
            PartResult::completed(1, "t", vec![item(4, "")], vec![], "", HybridStats::default(), 1.0),
        );
        session.part_results.insert(
            2,
            PartResult::failed(2, "t", "no_context", vec![], vec![], HybridStats::default(), 0.0),
        );
        assert_eq!(session.overall_risk_score(), Some(4.0));
    }

    #[test]
    fn test_overall_score_none_when_nothing_completed() {
        let mut session = AnalysisSession::new(
            "a1",
            "c1",
            "Contract",
            AnalysisBackend::Hybrid,
            vec![1],
            Utc::now(),
        );
        session.part_results.insert(
            1,
            PartResult::failed(1, "t", "no_context", vec![], vec![], HybridStats::default(), 0.0),
        );
        assert_eq!(session.overall_risk_score(), None);
    }
}
