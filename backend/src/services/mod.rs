pub mod chat_service;
pub mod language_service;
pub mod llm;
pub mod prompt_service;
pub mod retrieval_service;
pub mod sse;

pub use chat_service::{AssembledPrompt, ChatError, ChatService};
pub use language_service::{DetectedLanguage, LanguageService};
pub use llm::{LLMClient, OpenAIClient};
pub use prompt_service::PromptService;
pub use retrieval_service::{ContextRetriever, EmbeddingRetriever, NoopRetriever};
