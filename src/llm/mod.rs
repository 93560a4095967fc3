//! Chat-completion abstraction with retry, token accounting, and a shared
//! per-process rate governor

pub mod client;
pub mod governor;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::{ChatModel, LlmClient, OpenAiChatClient};
pub use governor::RateGovernor;

#[derive(Error, Debug)]
pub enum LlmError {
    /// Rate limits, timeouts, 5xx — retried with exponential backoff
    #[error("transient LLM error: {0}")]
    Transient(String),

    /// Auth failures, invalid requests — never retried
    #[error("permanent LLM error: {0}")]
    Permanent(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type LlmResult<T> = Result<T, LlmError>;

/// One message in a chat exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Per-call generation options
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Fixed seed for reproducible runs and tests
    pub seed: Option<u64>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.0,
            seed: None,
        }
    }
}

/// Token counts reported by the provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// A completed chat call
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: TokenUsage,
}
