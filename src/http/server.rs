//! HTTP server wiring the analysis API onto axum

use super::handler::{self, AppState};
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// HTTP server exposing the analysis and retrieval commands
pub struct HttpServer {
    state: Arc<AppState>,
    port: u16,
}

impl HttpServer {
    pub fn new(state: Arc<AppState>, port: u16) -> Self {
        Self { state, port }
    }

    pub fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/api/risk-analysis/start", post(handler::start_analysis))
            .route("/api/risk-analysis/saved", get(handler::list_saved))
            .route("/api/risk-analysis/statistics", get(handler::statistics))
            .route("/api/risk-analysis/:id/status", get(handler::get_status))
            .route("/api/risk-analysis/:id/part/:number", get(handler::get_part))
            .route("/api/risk-analysis/:id/report", get(handler::get_report))
            .route("/api/risk-analysis/:id/cancel", post(handler::cancel_analysis))
            .route("/api/risk-analysis/:id", delete(handler::delete_saved))
            .route("/api/chat/retrieve", post(handler::hybrid_retrieve))
            .route("/api/status", get(handler::store_status))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and serve until the process exits
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error>> {
        let app = Self::router(Arc::clone(&self.state));

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("analysis API listening on http://localhost:{}", self.port);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
