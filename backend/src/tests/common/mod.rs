// Common test utilities and helpers

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use futures::stream;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use crate::services::llm::{ChatPrompt, Completion, LLMClient, LLMError, TextStream};
use crate::services::{ChatService, ContextRetriever, NoopRetriever};
use crate::{AppState, build_router};

/// What the fake provider does on every call.
#[derive(Debug, Clone)]
pub enum FakeReply {
    Text(String),
    Stream(Vec<Result<String, LLMError>>),
    Fail(LLMError),
}

/// Scripted `LLMClient` that records the prompts it receives.
pub struct FakeLLMClient {
    reply: FakeReply,
    prompts: Mutex<Vec<ChatPrompt>>,
}

impl FakeLLMClient {
    pub fn new(reply: FakeReply) -> Self {
        Self { reply, prompts: Mutex::new(Vec::new()) }
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self::new(FakeReply::Text(text.to_string())))
    }

    pub fn failing(err: LLMError) -> Arc<Self> {
        Arc::new(Self::new(FakeReply::Fail(err)))
    }

    pub fn last_prompt(&self) -> Option<ChatPrompt> {
        self.prompts.lock().unwrap().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn record(&self, prompt: &ChatPrompt) {
        self.prompts.lock().unwrap().push(prompt.clone());
    }
}

#[async_trait]
impl LLMClient for FakeLLMClient {
    async fn complete(&self, prompt: &ChatPrompt) -> Result<Completion, LLMError> {
        self.record(prompt);
        match &self.reply {
            FakeReply::Text(text) => Ok(Completion::text(text.clone())),
            FakeReply::Stream(items) => {
                let text: Result<String, LLMError> = items.iter().cloned().collect();
                text.map(Completion::text)
            },
            FakeReply::Fail(err) => Err(err.clone()),
        }
    }

    async fn stream(&self, prompt: &ChatPrompt) -> Result<TextStream, LLMError> {
        self.record(prompt);
        match &self.reply {
            FakeReply::Text(text) => Ok(Box::pin(stream::iter(vec![Ok(text.clone())]))),
            FakeReply::Stream(items) => Ok(Box::pin(stream::iter(items.clone()))),
            FakeReply::Fail(err) => Err(err.clone()),
        }
    }

    async fn embed(&self, _input: &str) -> Result<Vec<f32>, LLMError> {
        match &self.reply {
            FakeReply::Fail(err) => Err(err.clone()),
            _ => Ok(vec![1.0, 0.0]),
        }
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

/// Router wired to `client`, without retrieval context.
pub fn create_test_app(client: Arc<FakeLLMClient>) -> Router {
    create_test_app_with_retriever(client, Arc::new(NoopRetriever))
}

pub fn create_test_app_with_retriever(
    client: Arc<FakeLLMClient>,
    retriever: Arc<dyn ContextRetriever>,
) -> Router {
    let chat_service = Arc::new(ChatService::new(client, retriever));
    let state = Arc::new(AppState { chat_service });
    build_router(state)
}

pub fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
