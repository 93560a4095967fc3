//! Part-by-part contract risk analysis
//!
//! The orchestrator runs the checklist parts sequentially over one of two
//! backends: hybrid retrieval against the indexed corpus, or direct
//! chunked-contract analysis.

pub mod gpt_only;
pub mod orchestrator;
pub mod part;
pub mod report;
pub mod session;

use crate::checklist::CatalogError;
use crate::persistence::StorageError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub use gpt_only::GptOnlyAnalyzer;
pub use orchestrator::{AnalysisOrchestrator, StartRequest, StartResponse, StatusView};
pub use part::{HybridPartAnalyzer, PartAnalyzer};
pub use report::{IntegratedReport, ReportSummary};
pub use session::{
    AnalysisBackend, AnalysisSession, ItemResult, ItemStatus, PartResult, PartStatus, RiskLevel,
    SessionStatus, SessionSummary,
};

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Caller error, 4xx-shaped, never retried
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Resource exists but is not in a servable state (409-shaped)
    #[error("not ready: {0}")]
    NotReady(String),

    #[error(transparent)]
    Store(#[from] StorageError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Cooperative cancellation signal, checked at suspension points
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
