//! LLM request/response types shared by clients and the chat service.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

use crate::models::Message;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LLMError {
    #[error("LLM provider is not configured (missing API key)")]
    NotConfigured,

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Stream error: {0}")]
    StreamError(String),
}

// ============================================================================
// Prompt / completion
// ============================================================================

/// Provider-neutral chat request: the full conversation plus generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<serde_json::Value>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), usage: None }
    }
}

/// Text fragments as the provider emits them. Single pass; ends on `[DONE]`
/// or the first error.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LLMError>> + Send>>;
