//! HTTP handlers for the analysis and retrieval API

use crate::analysis::{AnalysisError, AnalysisOrchestrator, StartRequest};
use crate::config::AnalyzerConfig;
use crate::graph::GraphStore;
use crate::retriever::{HybridRetriever, RetrieveError};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Shared state behind every route
pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub hybrid: Arc<HybridRetriever>,
    pub graph: Arc<dyn GraphStore>,
    pub config: Arc<AnalyzerConfig>,
}

/// Error body with the HTTP status the error maps to
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        let status = match &e {
            AnalysisError::BadInput(_) => StatusCode::BAD_REQUEST,
            AnalysisError::NotFound(_) => StatusCode::NOT_FOUND,
            AnalysisError::NotReady(_) => StatusCode::CONFLICT,
            AnalysisError::Store(_) | AnalysisError::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            message: e.to_string(),
        }
    }
}

impl From<RetrieveError> for ApiError {
    fn from(e: RetrieveError) -> Self {
        let status = match &e {
            RetrieveError::RetrievalUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub async fn start_analysis(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = Arc::clone(&state.orchestrator).start(request).await?;
    Ok(Json(response))
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(analysis_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.orchestrator.get_status(&analysis_id).await?;
    Ok(Json(status))
}

pub async fn get_part(
    State(state): State<Arc<AppState>>,
    Path((analysis_id, part_number)): Path<(String, u8)>,
) -> Result<impl IntoResponse, ApiError> {
    let part = state.orchestrator.get_part(&analysis_id, part_number).await?;
    Ok(Json(part))
}

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(analysis_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.orchestrator.get_report(&analysis_id).await?;
    Ok(Json(report))
}

pub async fn cancel_analysis(
    State(state): State<Arc<AppState>>,
    Path(analysis_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.orchestrator.cancel(&analysis_id).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: Option<String>,
}

pub async fn list_saved(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let summaries = match query.q.as_deref() {
        Some(q) if !q.trim().is_empty() => state.orchestrator.search_saved(q)?,
        _ => state.orchestrator.list_saved()?,
    };
    Ok(Json(summaries))
}

pub async fn delete_saved(
    State(state): State<Arc<AppState>>,
    Path(analysis_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.orchestrator.delete_saved(&analysis_id).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn statistics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.orchestrator.statistics()?;
    Ok(Json(stats))
}

#[derive(Deserialize)]
pub struct RetrieveRequest {
    pub query: String,
    #[serde(default)]
    pub top_n: Option<usize>,
}

#[derive(Serialize)]
pub struct RetrievedPassage {
    pub id: u64,
    pub text: String,
    pub score: f32,
}

#[derive(Serialize)]
pub struct RetrieveResponse {
    pub passages: Vec<RetrievedPassage>,
    pub stats: crate::retriever::HybridStats,
}

/// The chat-path hybrid retrieval endpoint
pub async fn hybrid_retrieve(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RetrieveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let top_n = request.top_n.unwrap_or(state.config.top_n_default);
    let result = state.hybrid.hybrid_retrieve(&request.query, top_n).await?;

    Ok(Json(RetrieveResponse {
        passages: result
            .passages
            .into_iter()
            .map(|p| RetrievedPassage {
                id: p.passage.id.as_u64(),
                text: p.passage.text,
                score: p.score,
            })
            .collect(),
        stats: result.stats,
    }))
}

/// Operational status: store health and corpus counts
pub async fn store_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.graph.stats().await.map_err(|e| ApiError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: e.to_string(),
    })?;

    Ok(Json(json!({
        "status": "healthy",
        "version": crate::VERSION,
        "databases": state.graph.list_databases(),
        "storage": stats,
    })))
}
