//! Chat clients: the provider trait, an OpenAI-compatible HTTP client, and
//! the retrying wrapper used by the analyzers

use super::governor::RateGovernor;
use super::{ChatCompletion, ChatMessage, ChatOptions, LlmError, LlmResult, TokenUsage};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Provider seam; test doubles implement this
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], opts: &ChatOptions) -> LlmResult<ChatCompletion>;
}

/// OpenAI-compatible chat-completions client
pub struct OpenAiChatClient {
    client: Client,
    api_base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(api_base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(Self {
            client,
            api_base_url: api_base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    async fn chat(&self, messages: &[ChatMessage], opts: &ChatOptions) -> LlmResult<ChatCompletion> {
        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            max_tokens: u32,
            temperature: f32,
            #[serde(skip_serializing_if = "Option::is_none")]
            seed: Option<u64>,
        }

        #[derive(Deserialize)]
        struct Response {
            choices: Vec<Choice>,
            #[serde(default)]
            usage: Option<Usage>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MessageContent,
        }

        #[derive(Deserialize)]
        struct MessageContent {
            content: String,
        }

        #[derive(Deserialize, Default)]
        struct Usage {
            #[serde(default)]
            prompt_tokens: u64,
            #[serde(default)]
            completion_tokens: u64,
        }

        let url = format!("{}/chat/completions", self.api_base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&Request {
                model: &self.model,
                messages,
                max_tokens: opts.max_tokens,
                temperature: opts.temperature,
                seed: opts.seed,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    LlmError::Transient(e.to_string())
                } else {
                    LlmError::Permanent(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = format!("chat API returned {}: {}", status, body);
            return if status == StatusCode::TOO_MANY_REQUESTS
                || status == StatusCode::REQUEST_TIMEOUT
                || status.is_server_error()
            {
                Err(LlmError::Transient(message))
            } else {
                Err(LlmError::Permanent(message))
            };
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| LlmError::Permanent(format!("malformed chat response: {}", e)))?;

        let content = result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();
        let usage = result.usage.unwrap_or_default();

        Ok(ChatCompletion {
            content,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
        })
    }
}

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Retrying wrapper over a [`ChatModel`]
///
/// Transient failures back off exponentially (1 s doubling, capped at
/// 30 s) up to `max_attempts`. Permanent failures surface immediately.
/// Every call passes through the shared rate governor and is counted in
/// the process-wide usage totals.
pub struct LlmClient {
    model: Arc<dyn ChatModel>,
    governor: Arc<RateGovernor>,
    max_attempts: u32,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl LlmClient {
    pub fn new(model: Arc<dyn ChatModel>, governor: Arc<RateGovernor>, max_attempts: u32) -> Self {
        Self {
            model,
            governor,
            max_attempts: max_attempts.max(1),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
        }
    }

    /// Tokens consumed so far across all sessions
    pub fn usage(&self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
        }
    }

    pub async fn chat(&self, messages: &[ChatMessage], opts: &ChatOptions) -> LlmResult<ChatCompletion> {
        // rough prompt-size estimate feeds the leaky bucket
        let estimated: usize = messages.iter().map(|m| m.content.len() / 4 + 4).sum();

        let mut backoff = INITIAL_BACKOFF;
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            self.governor.acquire(estimated as f64).await;

            match self.model.chat(messages, opts).await {
                Ok(completion) => {
                    self.prompt_tokens.fetch_add(completion.usage.prompt_tokens, Ordering::Relaxed);
                    self.completion_tokens.fetch_add(completion.usage.completion_tokens, Ordering::Relaxed);
                    return Ok(completion);
                }
                Err(LlmError::Transient(reason)) => {
                    warn!(attempt, %reason, "transient LLM failure, backing off");
                    last_error = Some(LlmError::Transient(reason));
                    if attempt + 1 < self.max_attempts {
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
                Err(e) => {
                    debug!(error = %e, "permanent LLM failure");
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Transient("retries exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct FlakyModel {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ChatModel for FlakyModel {
        async fn chat(&self, _messages: &[ChatMessage], _opts: &ChatOptions) -> LlmResult<ChatCompletion> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(LlmError::Transient("rate limited".to_string()))
            } else {
                Ok(ChatCompletion {
                    content: "ok".to_string(),
                    usage: TokenUsage { prompt_tokens: 10, completion_tokens: 5 },
                })
            }
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl ChatModel for BrokenModel {
        async fn chat(&self, _messages: &[ChatMessage], _opts: &ChatOptions) -> LlmResult<ChatCompletion> {
            Err(LlmError::Permanent("invalid api key".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retried() {
        let model = Arc::new(FlakyModel { failures_before_success: 2, calls: AtomicU32::new(0) });
        let client = LlmClient::new(model.clone(), Arc::new(RateGovernor::unlimited()), 5);

        let result = client
            .chat(&[ChatMessage::user("hello")], &ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(result.content, "ok");
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
        assert_eq!(client.usage().prompt_tokens, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted() {
        let model = Arc::new(FlakyModel { failures_before_success: u32::MAX, calls: AtomicU32::new(0) });
        let client = LlmClient::new(model.clone(), Arc::new(RateGovernor::unlimited()), 3);

        let err = client
            .chat(&[ChatMessage::user("hello")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Transient(_)));
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let client = LlmClient::new(Arc::new(BrokenModel), Arc::new(RateGovernor::unlimited()), 5);

        let err = client
            .chat(&[ChatMessage::user("hello")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Permanent(_)));
    }
}
