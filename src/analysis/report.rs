//! Integrated report emitted when a session reaches a terminal state

use super::session::{AnalysisSession, PartResult, PartStatus, RiskLevel};
use serde::{Deserialize, Serialize};

/// Roll-up counters over the analyzed parts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_parts_analyzed: usize,
    /// Parts banded HIGH or CRITICAL
    pub high_risk_parts: usize,
    /// Titles of CRITICAL parts
    pub critical_issues: Vec<String>,
}

/// The final report for one analysis session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegratedReport {
    pub analysis_id: String,
    pub contract_name: String,
    /// Mean of successful part scores; `null` when no part completed
    pub overall_risk_score: Option<f64>,
    pub overall_risk_level: Option<RiskLevel>,
    /// Ascending part-number order
    pub part_results: Vec<PartResult>,
    pub summary: ReportSummary,
}

impl IntegratedReport {
    /// Build the report from a terminal session; pure, so repeated calls
    /// are byte-stable
    pub fn from_session(session: &AnalysisSession) -> Self {
        let part_results: Vec<PartResult> = session.part_results.values().cloned().collect();

        let (overall_risk_score, overall_risk_level) = if session.selected_parts.is_empty() {
            (Some(0.0), Some(RiskLevel::Low))
        } else {
            let score = session.overall_risk_score();
            (score, score.map(RiskLevel::from_score))
        };

        let completed: Vec<&PartResult> = part_results
            .iter()
            .filter(|p| p.status == PartStatus::Completed)
            .collect();

        let summary = ReportSummary {
            total_parts_analyzed: part_results.len(),
            high_risk_parts: completed
                .iter()
                .filter(|p| matches!(p.risk_level, RiskLevel::High | RiskLevel::Critical))
                .count(),
            critical_issues: completed
                .iter()
                .filter(|p| p.risk_level == RiskLevel::Critical)
                .map(|p| p.part_title.clone())
                .collect(),
        };

        IntegratedReport {
            analysis_id: session.id.clone(),
            contract_name: session.contract_name.clone(),
            overall_risk_score,
            overall_risk_level,
            part_results,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::session::{AnalysisBackend, ItemResult, ItemStatus};
    use crate::retriever::HybridStats;
    use chrono::Utc;

    fn item(score: u8) -> ItemResult {
        ItemResult {
            item_text: "q".to_string(),
            status: ItemStatus::from_score(score),
            risk_score: score,
            analysis: String::new(),
            recommendation: "fix it".to_string(),
        }
    }

    fn session_with_parts(scores: &[(u8, u8)]) -> AnalysisSession {
        let selected: Vec<u8> = scores.iter().map(|(n, _)| *n).collect();
        let mut session = AnalysisSession::new(
            "a1",
            "c1",
            "Contract",
            AnalysisBackend::Hybrid,
            selected,
            Utc::now(),
        );
        for &(number, score) in scores {
            session.part_results.insert(
                number,
                PartResult::completed(
                    number,
                    format!("Part {}", number),
                    vec![item(score)],
                    vec![],
                    "",
                    HybridStats::default(),
                    1.0,
                ),
            );
        }
        session
    }

    #[test]
    fn test_overall_is_mean_of_part_scores() {
        let report = IntegratedReport::from_session(&session_with_parts(&[(1, 2), (2, 4)]));
        assert_eq!(report.overall_risk_score, Some(3.0));
        assert_eq!(report.overall_risk_level, Some(RiskLevel::High));
        assert_eq!(report.summary.total_parts_analyzed, 2);
    }

    #[test]
    fn test_critical_parts_listed() {
        let report = IntegratedReport::from_session(&session_with_parts(&[(1, 5), (2, 1)]));
        assert_eq!(report.summary.high_risk_parts, 1);
        assert_eq!(report.summary.critical_issues, vec!["Part 1".to_string()]);
    }

    #[test]
    fn test_empty_selection_reports_zero_low() {
        let session = AnalysisSession::new("a1", "c1", "Contract", AnalysisBackend::Hybrid, vec![], Utc::now());
        let report = IntegratedReport::from_session(&session);
        assert_eq!(report.overall_risk_score, Some(0.0));
        assert_eq!(report.overall_risk_level, Some(RiskLevel::Low));
        assert!(report.part_results.is_empty());
    }

    #[test]
    fn test_all_failed_parts_report_null_score() {
        let mut session = AnalysisSession::new("a1", "c1", "Contract", AnalysisBackend::Hybrid, vec![1], Utc::now());
        session.part_results.insert(
            1,
            PartResult::failed(1, "Part 1", "no_context", vec![], vec![], HybridStats::default(), 0.0),
        );
        let report = IntegratedReport::from_session(&session);
        assert_eq!(report.overall_risk_score, None);
        assert_eq!(report.overall_risk_level, None);
    }

    #[test]
    fn test_report_is_byte_stable() {
        let session = session_with_parts(&[(1, 3), (2, 2)]);
        let a = serde_json::to_vec(&IntegratedReport::from_session(&session)).unwrap();
        let b = serde_json::to_vec(&IntegratedReport::from_session(&session)).unwrap();
        assert_eq!(a, b);
    }
}
