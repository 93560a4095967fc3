//! Batched embedding client producing fixed-dimension vectors

pub mod client;

use thiserror::Error;

pub use client::{Embedder, OpenAiEmbeddingClient};

#[derive(Error, Debug)]
pub enum EmbedError {
    /// Provider rate limit; callers retry or surface `ExtractorBusy`
    #[error("embedding provider rate limited: {0}")]
    RateLimited(String),

    #[error("embedding API error: {0}")]
    ApiError(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

pub type EmbedResult<T> = Result<T, EmbedError>;
