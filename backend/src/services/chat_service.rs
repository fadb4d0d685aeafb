//! Chat Service
//!
//! Normalizes a validated request into a prompt and dispatches it to the
//! LLM. Per request: received → validated → language-detected →
//! prompt-assembled → dispatched → completed | fallback-returned |
//! error-returned. Nothing is retried and nothing outlives the request.

use std::sync::Arc;
use thiserror::Error;

use super::language_service::{DetectedLanguage, LanguageService, build_language_instruction};
use super::llm::{Agent, LLMClient, LLMError};
use super::prompt_service::{ERROR_RESPONSE, FALLBACK_RESPONSE, PromptService};
use super::retrieval_service::ContextRetriever;
use super::sse::{self, SseStream};
use crate::models::{ChatCompletionResponse, CompletionRequest, Message};
use crate::utils::ApiError;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("prompt cannot be empty")]
    EmptyPrompt,

    /// The provider could not be reached or answered badly.
    #[error("provider failure: {0}")]
    Provider(#[from] LLMError),

    /// A broken invariant on our side.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyPrompt => ApiError::EmptyPrompt,
            other => ApiError::internal_error(other.to_string()),
        }
    }
}

/// Message list ready for dispatch.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub messages: Vec<Message>,
    pub language: DetectedLanguage,
    pub user_query: String,
    pub context_injected: bool,
}

impl AssembledPrompt {
    /// Split off the first system message as the agent's bound prompt.
    fn split_system(&self) -> Result<(&str, Vec<Message>), ChatError> {
        let idx = self
            .messages
            .iter()
            .position(Message::is_system)
            .ok_or_else(|| ChatError::Internal("assembled prompt has no system message".into()))?;

        let conversation = self
            .messages
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, m)| m.clone())
            .collect();
        Ok((self.messages[idx].content(), conversation))
    }
}

pub struct ChatService {
    client: Arc<dyn LLMClient>,
    retriever: Arc<dyn ContextRetriever>,
    language: LanguageService,
}

impl ChatService {
    pub fn new(client: Arc<dyn LLMClient>, retriever: Arc<dyn ContextRetriever>) -> Self {
        Self { client, retriever, language: LanguageService::new() }
    }

    /// Build the message list sent to the model.
    ///
    /// A caller-supplied system message is kept as-is, without a language
    /// instruction. Retrieval failures are logged and skipped.
    pub async fn assemble(&self, request: &CompletionRequest) -> Result<AssembledPrompt, ChatError> {
        let user_query = request
            .latest_user_content()
            .filter(|c| !c.trim().is_empty())
            .ok_or(ChatError::EmptyPrompt)?
            .to_string();

        let language = self.language.detect(&user_query);
        tracing::debug!(stage = "language-detected", code = language.code());

        let mut messages = request.messages.clone();
        if messages.iter().any(Message::is_system) {
            if !language.is_english() {
                tracing::debug!(
                    "Caller supplied a system message; not adding a {} instruction",
                    language.name()
                );
            }
        } else {
            let instruction = build_language_instruction(&language);
            let system = PromptService::system_prompt_with_instruction(instruction.as_deref());
            messages.insert(0, Message::system(system));
        }

        let mut context_injected = false;
        if request.is_rag_enabled {
            match self.retriever.retrieve(&user_query).await {
                Ok(docs) if !docs.is_empty() => {
                    let context = PromptService::rag_prompt(&user_query, &docs, true);
                    let first_system = messages.iter().position(Message::is_system).unwrap_or(0);
                    messages.insert(first_system + 1, Message::system(context));
                    context_injected = true;
                },
                Ok(_) => tracing::debug!("No RAG context found"),
                Err(e) => tracing::warn!("Error in getting RAG context: {}", e),
            }
        }

        tracing::debug!(
            stage = "prompt-assembled",
            messages = messages.len(),
            context_injected,
            "Prompt assembled"
        );
        Ok(AssembledPrompt { messages, language, user_query, context_injected })
    }

    fn agent_for(
        &self,
        assembled: &AssembledPrompt,
        request: &CompletionRequest,
    ) -> Result<(Agent, Vec<Message>), ChatError> {
        let (system_prompt, conversation) = assembled.split_system()?;
        let agent = Agent::new(self.client.clone(), system_prompt)
            .with_settings(request.temperature, request.max_tokens);
        Ok((agent, conversation))
    }

    /// Completion without fallback; provider errors are returned as-is.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<ChatCompletionResponse, ChatError> {
        let assembled = self.assemble(request).await?;
        let (agent, conversation) = self.agent_for(&assembled, request)?;

        tracing::debug!(stage = "dispatched", model = self.client.model_name());
        let completion = agent.run(&conversation).await?;

        tracing::info!(
            stage = "completed",
            temperature = request.temperature,
            max_tokens = request.max_tokens,
            chars = completion.content.chars().count(),
            "Chat completion response"
        );
        Ok(ChatCompletionResponse::assistant(completion.content, completion.usage))
    }

    /// Blocking completion. Only an empty prompt is an error; any other
    /// failure yields the fallback reply.
    pub async fn get_chat_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<ChatCompletionResponse, ChatError> {
        match self.complete(request).await {
            Ok(response) => Ok(response),
            Err(ChatError::EmptyPrompt) => Err(ChatError::EmptyPrompt),
            Err(ChatError::Provider(e)) => {
                tracing::warn!(stage = "fallback-returned", "Provider error in chat completion: {}", e);
                Ok(ChatCompletionResponse::assistant(FALLBACK_RESPONSE, None))
            },
            Err(ChatError::Internal(e)) => {
                tracing::error!(stage = "fallback-returned", "Internal error in chat completion: {}", e);
                Ok(ChatCompletionResponse::assistant(FALLBACK_RESPONSE, None))
            },
        }
    }

    /// Streaming completion as SSE frames. Only an empty prompt is an error;
    /// failures to open or mid-stream become a single error frame.
    pub async fn get_streaming_chat_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<SseStream, ChatError> {
        let assembled = self.assemble(request).await?;

        let opened = match self.agent_for(&assembled, request) {
            Ok((agent, conversation)) => {
                tracing::debug!(stage = "dispatched", model = self.client.model_name());
                agent.run_stream(&conversation).await.map_err(ChatError::from)
            },
            Err(e) => Err(e),
        };

        match opened {
            Ok(fragments) => Ok(sse::frame_stream(fragments, ERROR_RESPONSE)),
            Err(ChatError::Internal(e)) => {
                tracing::error!(stage = "error-returned", "Internal error in streaming chat completion: {}", e);
                Ok(sse::error_stream(ERROR_RESPONSE))
            },
            Err(e) => {
                tracing::warn!(stage = "error-returned", "Error in streaming chat completion: {}", e);
                Ok(sse::error_stream(ERROR_RESPONSE))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::retrieval_service::{NoopRetriever, RetrievalError};
    use crate::tests::common::{FakeLLMClient, FakeReply};
    use async_trait::async_trait;
    use futures::StreamExt;

    const FRENCH: &str = "Bonjour, pourriez-vous m'expliquer comment fonctionne la \
        photosynthèse chez les plantes vertes et pourquoi elle est importante pour la vie ?";
    const ENGLISH: &str = "Could you explain how photosynthesis works in green plants and \
        why it is so important for life on our planet?";

    struct StaticRetriever(Vec<String>);

    #[async_trait]
    impl ContextRetriever for StaticRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<String>, RetrievalError> {
            Ok(self.0.clone())
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl ContextRetriever for FailingRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<String>, RetrievalError> {
            Err(RetrievalError::Embedding(LLMError::Timeout(5)))
        }
    }

    fn service_with(client: Arc<FakeLLMClient>, retriever: Arc<dyn ContextRetriever>) -> ChatService {
        ChatService::new(client, retriever)
    }

    fn service(client: Arc<FakeLLMClient>) -> ChatService {
        service_with(client, Arc::new(NoopRetriever))
    }

    fn client_messages(prompt: &crate::services::llm::ChatPrompt) -> Vec<(Role, String)> {
        prompt.messages.iter().map(|m| (m.role(), m.content().to_string())).collect()
    }

    fn system_count(messages: &[Message]) -> usize {
        messages.iter().filter(|m| m.is_system()).count()
    }

    // ========================================================================
    // Assembly
    // ========================================================================

    mod assembly_tests {
        use super::*;

        #[tokio::test]
        async fn test_inserts_single_leading_system_message() {
            let svc = service(FakeLLMClient::replying("ok"));
            let req = CompletionRequest::new(vec![
                Message::user("hi"),
                Message::assistant("hello"),
                Message::user(ENGLISH),
            ]);

            let assembled = svc.assemble(&req).await.unwrap();
            assert_eq!(assembled.messages.len(), 4);
            assert_eq!(system_count(&assembled.messages), 1);
            assert!(assembled.messages[0].is_system());
            assert_eq!(&assembled.messages[1..], &req.messages[..]);
        }

        #[tokio::test]
        async fn test_english_gets_no_language_instruction() {
            let svc = service(FakeLLMClient::replying("ok"));
            let req = CompletionRequest::new(vec![Message::user(ENGLISH)]);

            let assembled = svc.assemble(&req).await.unwrap();
            assert!(assembled.language.is_english());
            assert_eq!(
                assembled.messages[0].content(),
                PromptService::default_system_prompt()
            );
        }

        #[tokio::test]
        async fn test_non_english_gets_exactly_one_instruction() {
            let svc = service(FakeLLMClient::replying("ok"));
            let req = CompletionRequest::new(vec![Message::user(FRENCH)]);

            let assembled = svc.assemble(&req).await.unwrap();
            let system = assembled.messages[0].content();
            assert_eq!(system.matches("Respond strictly in").count(), 1);
            assert!(system.starts_with("Respond strictly in French"));
        }

        #[tokio::test]
        async fn test_existing_system_message_left_untouched() {
            let svc = service(FakeLLMClient::replying("ok"));
            let req = CompletionRequest::new(vec![
                Message::system("You are a pirate."),
                Message::user(FRENCH),
            ]);

            let assembled = svc.assemble(&req).await.unwrap();
            assert_eq!(assembled.messages, req.messages);
            assert!(!assembled.language.is_english());
        }

        #[tokio::test]
        async fn test_no_user_message_is_empty_prompt() {
            let svc = service(FakeLLMClient::replying("ok"));
            let req = CompletionRequest::new(vec![
                Message::system("sys"),
                Message::assistant("hello"),
            ]);
            assert!(matches!(svc.assemble(&req).await, Err(ChatError::EmptyPrompt)));
        }

        #[tokio::test]
        async fn test_blank_latest_user_message_is_empty_prompt() {
            let svc = service(FakeLLMClient::replying("ok"));
            let req = CompletionRequest::new(vec![Message::user("real question"), Message::user("   ")]);
            assert!(matches!(svc.assemble(&req).await, Err(ChatError::EmptyPrompt)));
        }

        #[tokio::test]
        async fn test_rag_context_spliced_after_first_system() {
            let retriever = Arc::new(StaticRetriever(vec!["Tokio is an async runtime.".into()]));
            let svc = service_with(FakeLLMClient::replying("ok"), retriever);
            let mut req = CompletionRequest::new(vec![Message::user(ENGLISH)]);
            req.is_rag_enabled = true;

            let assembled = svc.assemble(&req).await.unwrap();
            assert!(assembled.context_injected);
            assert_eq!(assembled.messages.len(), 3);
            assert!(assembled.messages[1].is_system());
            assert!(assembled.messages[1].content().contains("Document 1:\nTokio is an async runtime."));
            assert_eq!(assembled.messages[2].role(), Role::User);
        }

        #[tokio::test]
        async fn test_rag_disabled_skips_retriever() {
            let retriever = Arc::new(StaticRetriever(vec!["unused".into()]));
            let svc = service_with(FakeLLMClient::replying("ok"), retriever);
            let req = CompletionRequest::new(vec![Message::user(ENGLISH)]);

            let assembled = svc.assemble(&req).await.unwrap();
            assert!(!assembled.context_injected);
            assert_eq!(assembled.messages.len(), 2);
        }

        #[tokio::test]
        async fn test_rag_failure_proceeds_without_context() {
            let svc = service_with(FakeLLMClient::replying("ok"), Arc::new(FailingRetriever));
            let mut req = CompletionRequest::new(vec![Message::user(ENGLISH)]);
            req.is_rag_enabled = true;

            let assembled = svc.assemble(&req).await.unwrap();
            assert!(!assembled.context_injected);
            assert_eq!(system_count(&assembled.messages), 1);
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    mod dispatch_tests {
        use super::*;

        #[tokio::test]
        async fn test_blocking_success_wraps_assistant_message() {
            let client = FakeLLMClient::replying("Photosynthesis turns light into sugar.");
            let svc = service(client.clone());
            let mut req = CompletionRequest::new(vec![Message::user(ENGLISH)]);
            req.temperature = 0.2;
            req.max_tokens = 64;

            let resp = svc.get_chat_completion(&req).await.unwrap();
            assert_eq!(resp.message.role(), Role::Assistant);
            assert_eq!(resp.message.content(), "Photosynthesis turns light into sugar.");

            let prompt = client.last_prompt().unwrap();
            assert_eq!(prompt.temperature, 0.2);
            assert_eq!(prompt.max_tokens, 64);
            assert!(prompt.messages[0].is_system());
            assert_eq!(prompt.messages.last().unwrap().content(), ENGLISH);
        }

        #[tokio::test]
        async fn test_blocking_provider_failure_returns_fallback() {
            let svc = service(FakeLLMClient::failing(LLMError::ApiError("HTTP 500".into())));
            let req = CompletionRequest::new(vec![Message::user(ENGLISH)]);

            let resp = svc.get_chat_completion(&req).await.unwrap();
            assert_eq!(resp.message.role(), Role::Assistant);
            assert_eq!(resp.message.content(), FALLBACK_RESPONSE);
            assert!(resp.usage.is_none());
        }

        #[tokio::test]
        async fn test_trailing_system_message_is_dispatched_as_given() {
            let client = FakeLLMClient::replying("Arr.");
            let svc = service(client.clone());
            let req = CompletionRequest::new(vec![
                Message::system("You are a pirate."),
                Message::user("Hello there"),
                Message::system("Answer in one word."),
            ]);

            let resp = svc.get_chat_completion(&req).await.unwrap();
            assert_eq!(resp.message.content(), "Arr.");
            assert_eq!(client.call_count(), 1);

            assert_eq!(
                client_messages(&client.last_prompt().unwrap()),
                vec![
                    (Role::System, "You are a pirate.".to_string()),
                    (Role::User, "Hello there".to_string()),
                    (Role::System, "Answer in one word.".to_string()),
                ]
            );
        }

        #[tokio::test]
        async fn test_complete_surfaces_provider_error() {
            let svc = service(FakeLLMClient::failing(LLMError::Timeout(60)));
            let req = CompletionRequest::new(vec![Message::user(ENGLISH)]);
            assert!(matches!(
                svc.complete(&req).await,
                Err(ChatError::Provider(LLMError::Timeout(60)))
            ));
        }

        #[tokio::test]
        async fn test_blocking_empty_prompt_propagates() {
            let svc = service(FakeLLMClient::replying("ok"));
            let req = CompletionRequest::new(vec![Message::assistant("no user here")]);
            assert!(matches!(
                svc.get_chat_completion(&req).await,
                Err(ChatError::EmptyPrompt)
            ));
        }

        #[tokio::test]
        async fn test_streaming_success_frames() {
            let client = Arc::new(FakeLLMClient::new(FakeReply::Stream(vec![
                Ok("Hello".into()),
                Ok(" world".into()),
            ])));
            let svc = service(client);
            let req = CompletionRequest::new(vec![Message::user(ENGLISH)]);

            let frames: Vec<String> = svc
                .get_streaming_chat_completion(&req)
                .await
                .unwrap()
                .map(|f| f.unwrap())
                .collect()
                .await;

            assert_eq!(
                frames,
                vec![sse::chunk_frame("Hello"), sse::chunk_frame(" world"), sse::stop_frame()]
            );
        }

        #[tokio::test]
        async fn test_streaming_open_failure_single_error_frame() {
            let svc = service(FakeLLMClient::failing(LLMError::RateLimited("slow down".into())));
            let req = CompletionRequest::new(vec![Message::user(ENGLISH)]);

            let frames: Vec<String> = svc
                .get_streaming_chat_completion(&req)
                .await
                .unwrap()
                .map(|f| f.unwrap())
                .collect()
                .await;

            assert_eq!(frames, vec![sse::error_frame(ERROR_RESPONSE)]);
        }

        #[tokio::test]
        async fn test_streaming_empty_prompt_is_error_before_stream() {
            let svc = service(FakeLLMClient::replying("ok"));
            let req = CompletionRequest::new(vec![Message::system("only system")]);
            assert!(matches!(
                svc.get_streaming_chat_completion(&req).await,
                Err(ChatError::EmptyPrompt)
            ));
        }

        #[test]
        fn test_chat_error_maps_to_api_error() {
            assert!(matches!(ApiError::from(ChatError::EmptyPrompt), ApiError::EmptyPrompt));
            assert!(matches!(
                ApiError::from(ChatError::Internal("x".into())),
                ApiError::InternalError(_)
            ));
        }
    }
}
