//! Sequential analysis orchestrator
//!
//! Owns session lifecycle: one cooperative task per session runs the
//! selected parts in ascending order, writes each part result atomically,
//! and survives part-level failures. Cancellation is observed at
//! suspension points; the interrupted part is recorded FAILED(canceled)
//! and nothing later starts.

use super::part::PartAnalyzer;
use super::report::IntegratedReport;
use super::session::{AnalysisBackend, AnalysisSession, PartResult, SessionStatus, SessionSummary};
use super::{AnalysisError, AnalysisResult, CancelFlag};
use crate::checklist::Catalog;
use crate::config::AnalyzerConfig;
use crate::persistence::{AnalysisStatistics, SessionStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Seconds of estimated wall time per part, reported at start
const ESTIMATED_SECONDS_PER_PART: u64 = 30;

/// Input for starting an analysis
#[derive(Debug, Clone, Deserialize)]
pub struct StartRequest {
    pub contract_id: String,
    pub contract_text: String,
    #[serde(default)]
    pub contract_name: Option<String>,
    #[serde(default)]
    pub selected_parts: Option<Vec<u8>>,
    #[serde(default)]
    pub backend: AnalysisBackend,
}

/// Response to a start request
#[derive(Debug, Clone, Serialize)]
pub struct StartResponse {
    pub analysis_id: String,
    pub status: SessionStatus,
    pub message: String,
    pub estimated_time_s: u64,
}

/// Snapshot served by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub analysis_id: String,
    pub status: SessionStatus,
    pub progress: u8,
    pub message: String,
    pub completed_parts: usize,
}

struct SessionHandle {
    session: Arc<RwLock<AnalysisSession>>,
    cancel: CancelFlag,
}

/// Drives analysis sessions over a chosen backend
pub struct AnalysisOrchestrator {
    catalog: Arc<Catalog>,
    hybrid: Arc<dyn PartAnalyzer>,
    gpt_only: Arc<dyn PartAnalyzer>,
    store: Arc<dyn SessionStore>,
    config: Arc<AnalyzerConfig>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
    sequence: AtomicU64,
}

impl AnalysisOrchestrator {
    pub fn new(
        catalog: Arc<Catalog>,
        hybrid: Arc<dyn PartAnalyzer>,
        gpt_only: Arc<dyn PartAnalyzer>,
        store: Arc<dyn SessionStore>,
        config: Arc<AnalyzerConfig>,
    ) -> Self {
        Self {
            catalog,
            hybrid,
            gpt_only,
            store,
            config,
            sessions: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(1),
        }
    }

    /// Validate the request, create the session, and spawn its task
    pub async fn start(self: Arc<Self>, request: StartRequest) -> AnalysisResult<StartResponse> {
        if request.contract_id.trim().is_empty() {
            return Err(AnalysisError::BadInput("contract_id must not be empty".to_string()));
        }

        let selected_parts = match &request.selected_parts {
            Some(parts) => {
                let mut parts = parts.clone();
                parts.sort_unstable();
                parts.dedup();
                for &n in &parts {
                    if self.catalog.part(n).is_none() {
                        return Err(AnalysisError::BadInput(format!("unknown part number {}", n)));
                    }
                }
                parts
            }
            None => self.catalog.part_numbers(),
        };

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let started_at = Utc::now();
        let analysis_id = format!(
            "analysis_{}_{}_{}",
            started_at.format("%Y%m%d_%H%M%S"),
            seq,
            request.contract_id.trim()
        );
        let contract_name = request
            .contract_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "contract".to_string());

        let mut session = AnalysisSession::new(
            analysis_id.clone(),
            request.contract_id.trim(),
            contract_name,
            request.backend,
            selected_parts.clone(),
            started_at,
        );

        // an empty selection completes immediately with an empty report
        if selected_parts.is_empty() {
            session.status = SessionStatus::Completed;
            session.progress = 100;
            session.finished_at = Some(Utc::now());
            self.store.put(&session)?;
            self.register(session).await;
            return Ok(StartResponse {
                analysis_id,
                status: SessionStatus::Completed,
                message: "no parts selected; empty report available".to_string(),
                estimated_time_s: 0,
            });
        }

        self.store.put(&session)?;
        let handle = self.register(session).await;
        let estimated_time_s = selected_parts.len() as u64 * ESTIMATED_SECONDS_PER_PART;

        let this = Arc::clone(&self);
        let contract_text = request.contract_text;
        let id_for_task = analysis_id.clone();
        tokio::spawn(async move {
            this.run_session(&id_for_task, handle, contract_text).await;
        });

        info!(analysis_id = %analysis_id, parts = selected_parts.len(), "analysis started");

        Ok(StartResponse {
            analysis_id,
            status: SessionStatus::Pending,
            message: "analysis started".to_string(),
            estimated_time_s,
        })
    }

    async fn register(&self, session: AnalysisSession) -> (Arc<RwLock<AnalysisSession>>, CancelFlag) {
        let id = session.id.clone();
        let shared = Arc::new(RwLock::new(session));
        let cancel = CancelFlag::new();
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id,
            SessionHandle {
                session: Arc::clone(&shared),
                cancel: cancel.clone(),
            },
        );
        (shared, cancel)
    }

    /// The per-session task: strictly sequential parts, cancel checks
    /// between and inside parts, persistence after every mutation
    async fn run_session(
        &self,
        analysis_id: &str,
        handle: (Arc<RwLock<AnalysisSession>>, CancelFlag),
        contract_text: String,
    ) {
        let (shared, cancel) = handle;
        let session_started = Instant::now();
        let session_deadline = session_started + self.config.session_timeout();

        let selected = {
            let mut session = shared.write().await;
            session.status = SessionStatus::Running;
            session.selected_parts.clone()
        };
        self.persist(&shared).await;

        let mut was_canceled = false;

        for part_number in selected {
            if cancel.is_canceled() {
                was_canceled = true;
                break;
            }
            if Instant::now() > session_deadline {
                warn!(analysis_id, "session timeout breached");
                let mut session = shared.write().await;
                session.status = SessionStatus::Failed;
                session.error = Some("session_timeout".to_string());
                session.finished_at = Some(Utc::now());
                drop(session);
                self.persist(&shared).await;
                return;
            }

            let Some(part) = self.catalog.part(part_number) else {
                // selection was validated at start; a miss here is a bug
                error!(analysis_id, part_number, "selected part missing from catalog");
                continue;
            };

            {
                let mut session = shared.write().await;
                session.current_part_title = Some(part.part_title.clone());
            }

            let analyzer = {
                let session = shared.read().await;
                match session.backend {
                    AnalysisBackend::Hybrid => Arc::clone(&self.hybrid),
                    AnalysisBackend::GptOnly => Arc::clone(&self.gpt_only),
                }
            };

            let result = analyzer.analyze_part(part, &contract_text, &cancel).await;
            let canceled_part = result.is_canceled();

            self.record_part(&shared, result).await;

            if canceled_part {
                was_canceled = true;
                break;
            }
        }

        {
            let mut session = shared.write().await;
            session.current_part_title = None;
            session.status = if was_canceled { SessionStatus::Canceled } else { SessionStatus::Completed };
            session.finished_at = Some(Utc::now());
        }
        self.persist(&shared).await;

        let status = shared.read().await.status;
        info!(analysis_id, %status, "session finished");
    }

    /// Append one part result and advance progress in a single write
    async fn record_part(&self, shared: &Arc<RwLock<AnalysisSession>>, result: PartResult) {
        {
            let mut session = shared.write().await;
            session.part_results.insert(result.part_number, result);
            session.update_progress();
        }
        self.persist(shared).await;
    }

    async fn persist(&self, shared: &Arc<RwLock<AnalysisSession>>) {
        let snapshot = shared.read().await.clone();
        if let Err(e) = self.store.put(&snapshot) {
            // the in-memory session stays authoritative; log and continue
            error!(analysis_id = %snapshot.id, error = %e, "failed to persist session");
        }
    }

    /// Read-consistent snapshot of a session, from memory or the store
    pub async fn snapshot(&self, analysis_id: &str) -> AnalysisResult<AnalysisSession> {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(analysis_id) {
                return Ok(handle.session.read().await.clone());
            }
        }
        self.store
            .get(analysis_id)?
            .ok_or_else(|| AnalysisError::NotFound(format!("analysis {} not found", analysis_id)))
    }

    pub async fn get_status(&self, analysis_id: &str) -> AnalysisResult<StatusView> {
        let session = self.snapshot(analysis_id).await?;
        let message = match session.status {
            SessionStatus::Running => session
                .current_part_title
                .clone()
                .map(|t| format!("analyzing: {}", t))
                .unwrap_or_else(|| "analysis in progress".to_string()),
            SessionStatus::Pending => "analysis queued".to_string(),
            SessionStatus::Completed => "analysis complete".to_string(),
            SessionStatus::Failed => session.error.clone().unwrap_or_else(|| "analysis failed".to_string()),
            SessionStatus::Canceled => "analysis canceled".to_string(),
        };

        Ok(StatusView {
            analysis_id: session.id.clone(),
            status: session.status,
            progress: session.progress,
            message,
            completed_parts: session.completed_parts(),
        })
    }

    pub async fn get_part(&self, analysis_id: &str, part_number: u8) -> AnalysisResult<PartResult> {
        let session = self.snapshot(analysis_id).await?;
        if !session.selected_parts.contains(&part_number) {
            return Err(AnalysisError::NotFound(format!(
                "part {} is not part of analysis {}",
                part_number, analysis_id
            )));
        }
        session
            .part_results
            .get(&part_number)
            .cloned()
            .ok_or_else(|| AnalysisError::NotReady(format!("part {} not analyzed yet", part_number)))
    }

    /// Full report; 409-shaped until the session is terminal
    pub async fn get_report(&self, analysis_id: &str) -> AnalysisResult<IntegratedReport> {
        let session = self.snapshot(analysis_id).await?;
        if !session.status.is_terminal() {
            return Err(AnalysisError::NotReady(format!(
                "analysis {} is {}",
                analysis_id, session.status
            )));
        }
        Ok(IntegratedReport::from_session(&session))
    }

    /// Cooperative cancel; the running part finishes its current
    /// suspension point and the session lands in CANCELED
    pub async fn cancel(&self, analysis_id: &str) -> AnalysisResult<()> {
        let sessions = self.sessions.read().await;
        if let Some(handle) = sessions.get(analysis_id) {
            handle.cancel.cancel();
            info!(analysis_id, "cancel requested");
            return Ok(());
        }
        drop(sessions);

        // not resident: known saved sessions are already terminal
        if self.store.get(analysis_id)?.is_some() {
            return Ok(());
        }
        Err(AnalysisError::NotFound(format!("analysis {} not found", analysis_id)))
    }

    pub fn list_saved(&self) -> AnalysisResult<Vec<SessionSummary>> {
        Ok(self.store.list()?)
    }

    pub fn search_saved(&self, query: &str) -> AnalysisResult<Vec<SessionSummary>> {
        Ok(self.store.search(query)?)
    }

    pub async fn delete_saved(&self, analysis_id: &str) -> AnalysisResult<()> {
        {
            let mut sessions = self.sessions.write().await;
            if let Some(handle) = sessions.get(analysis_id) {
                handle.cancel.cancel();
                sessions.remove(analysis_id);
            }
        }
        if self.store.delete(analysis_id)? {
            Ok(())
        } else {
            Err(AnalysisError::NotFound(format!("analysis {} not found", analysis_id)))
        }
    }

    pub fn statistics(&self) -> AnalysisResult<AnalysisStatistics> {
        Ok(self.store.statistics()?)
    }
}
