//! OpenAI-compatible HTTP client.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use futures::future::ready;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::models::{ChatPrompt, Completion, LLMError, TextStream};
use crate::config::LLMConfig;

/// Anything that can answer a chat prompt and embed text.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Blocking completion of the whole prompt.
    async fn complete(&self, prompt: &ChatPrompt) -> Result<Completion, LLMError>;

    /// Open a streaming session; fragments arrive as the provider emits them.
    async fn stream(&self, prompt: &ChatPrompt) -> Result<TextStream, LLMError>;

    async fn embed(&self, input: &str) -> Result<Vec<f32>, LLMError>;

    fn model_name(&self) -> &str;
}

pub struct OpenAIClient {
    http: Client,
    api_base: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    timeout_secs: u64,
}

impl OpenAIClient {
    pub fn new(config: &LLMConfig) -> Result<Self, LLMError> {
        if config.api_key.trim().is_empty() {
            return Err(LLMError::NotConfigured);
        }

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(30)))
            .build()
            .map_err(|e| LLMError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a ChatPrompt, stream: bool) -> ChatRequestBody<'a> {
        ChatRequestBody {
            model: &self.chat_model,
            messages: prompt
                .messages
                .iter()
                .map(|m| WireMessage { role: m.role().as_str(), content: m.content() })
                .collect(),
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
            stream,
        }
    }

    fn map_send_error(&self, err: reqwest::Error) -> LLMError {
        if err.is_timeout() {
            LLMError::Timeout(self.timeout_secs)
        } else {
            LLMError::Network(err.to_string())
        }
    }

    async fn check_status(response: Response) -> Result<Response, LLMError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!("LLM provider returned HTTP {}: {}", status, body);
        if status == StatusCode::TOO_MANY_REQUESTS {
            Err(LLMError::RateLimited(body))
        } else {
            Err(LLMError::ApiError(format!("HTTP {}: {}", status.as_u16(), body)))
        }
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(&self, prompt: &ChatPrompt) -> Result<Completion, LLMError> {
        let url = format!("{}/chat/completions", self.api_base);
        tracing::debug!(model = %self.chat_model, messages = prompt.messages.len(), "Sending completion request");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&self.request_body(prompt, false))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check_status(response).await?;
        let body: ChatResponseBody =
            response.json().await.map_err(|e| LLMError::ParseError(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LLMError::ParseError("response contained no message content".into()))?;

        Ok(Completion { content, usage: body.usage })
    }

    async fn stream(&self, prompt: &ChatPrompt) -> Result<TextStream, LLMError> {
        let url = format!("{}/chat/completions", self.api_base);
        tracing::debug!(model = %self.chat_model, messages = prompt.messages.len(), "Opening completion stream");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt, true))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check_status(response).await?;

        let fragments = response
            .bytes_stream()
            .eventsource()
            .map(|event| match event {
                Ok(event) => parse_stream_event(&event.data),
                Err(e) => Err(LLMError::StreamError(e.to_string())),
            })
            .take_while(|item| ready(!matches!(item, Ok(StreamEvent::Done))))
            .filter_map(|item| {
                ready(match item {
                    Ok(StreamEvent::Delta(text)) => Some(Ok(text)),
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                })
            });

        Ok(Box::pin(fragments))
    }

    async fn embed(&self, input: &str) -> Result<Vec<f32>, LLMError> {
        let url = format!("{}/embeddings", self.api_base);

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&EmbeddingRequestBody { model: &self.embedding_model, input })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check_status(response).await?;
        let body: EmbeddingResponseBody =
            response.json().await.map_err(|e| LLMError::ParseError(e.to_string()))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LLMError::ParseError("embedding response contained no data".into()))
    }

    fn model_name(&self) -> &str {
        &self.chat_model
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequestBody<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponseBody {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, PartialEq)]
enum StreamEvent {
    Delta(String),
    Done,
    Ignore,
}

fn parse_stream_event(data: &str) -> Result<StreamEvent, LLMError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(StreamEvent::Done);
    }
    if data.is_empty() {
        return Ok(StreamEvent::Ignore);
    }

    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| LLMError::ParseError(format!("{}: {}", e, data)))?;

    match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
        Some(text) if !text.is_empty() => Ok(StreamEvent::Delta(text)),
        _ => Ok(StreamEvent::Ignore),
    }
}
