use std::sync::Arc;

use super::client::LLMClient;
use super::models::{ChatPrompt, Completion, LLMError, TextStream};
use crate::models::Message;

/// A client bound to one system prompt and one set of generation settings.
///
/// The system prompt always goes first; the conversation handed to `run`
/// follows it unchanged.
pub struct Agent {
    client: Arc<dyn LLMClient>,
    system_prompt: String,
    temperature: f64,
    max_tokens: u32,
}

impl Agent {
    pub fn new(client: Arc<dyn LLMClient>, system_prompt: impl Into<String>) -> Self {
        Self { client, system_prompt: system_prompt.into(), temperature: 0.7, max_tokens: 1000 }
    }

    pub fn with_settings(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn build_prompt(&self, conversation: &[Message]) -> ChatPrompt {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(conversation.iter().cloned());

        ChatPrompt { messages, temperature: self.temperature, max_tokens: self.max_tokens }
    }

    pub async fn run(&self, conversation: &[Message]) -> Result<Completion, LLMError> {
        let prompt = self.build_prompt(conversation);
        self.client.complete(&prompt).await
    }

    pub async fn run_stream(&self, conversation: &[Message]) -> Result<TextStream, LLMError> {
        let prompt = self.build_prompt(conversation);
        self.client.stream(&prompt).await
    }
}
