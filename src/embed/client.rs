//! HTTP embedding client (OpenAI-compatible embeddings endpoint)

use super::{EmbedError, EmbedResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Embedding seam; test doubles implement this
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts in one call, preserving order
    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>>;

    /// Fixed dimension of every produced vector
    fn dimension(&self) -> usize;
}

/// Client for an OpenAI-compatible `/embeddings` endpoint
pub struct OpenAiEmbeddingClient {
    client: Client,
    api_base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddingClient {
    pub fn new(
        api_base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> EmbedResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbedError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            api_base_url: api_base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct Request<'a> {
            input: &'a [String],
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            data: Vec<Data>,
        }

        #[derive(Deserialize)]
        struct Data {
            embedding: Vec<f32>,
        }

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.api_base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&Request { input: texts, model: &self.model })
            .send()
            .await
            .map_err(|e| EmbedError::NetworkError(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbedError::RateLimited(body));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbedError::ApiError(format!("embeddings API returned {}: {}", status, body)));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| EmbedError::ApiError(format!("malformed embeddings response: {}", e)))?;

        let vectors: Vec<Vec<f32>> = result.data.into_iter().map(|d| d.embedding).collect();
        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(EmbedError::DimensionMismatch {
                    expected: self.dimension,
                    got: vector.len(),
                });
            }
        }

        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
