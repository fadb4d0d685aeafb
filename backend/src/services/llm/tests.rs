//! OpenAI client tests against a mock provider

use super::*;
use crate::config::LLMConfig;
use crate::models::Message;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> LLMConfig {
    LLMConfig {
        api_base: server.uri(),
        api_key: "test-key".to_string(),
        chat_model: "gpt-test".to_string(),
        embedding_model: "embed-test".to_string(),
        timeout_secs: 1,
    }
}

fn prompt() -> ChatPrompt {
    ChatPrompt {
        messages: vec![Message::system("Be helpful."), Message::user("Hello")],
        temperature: 0.2,
        max_tokens: 64,
    }
}

fn sse_body(events: &[&str]) -> String {
    events.iter().map(|e| format!("data: {}\n\n", e)).collect()
}

#[tokio::test]
async fn test_complete_sends_conversation_and_reads_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-test",
            "stream": false,
            "max_tokens": 64,
            "messages": [
                { "role": "system", "content": "Be helpful." },
                { "role": "user", "content": "Hello" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hi there" } }],
            "usage": { "prompt_tokens": 7, "completion_tokens": 2, "total_tokens": 9 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAIClient::new(&config_for(&server)).unwrap();
    let completion = client.complete(&prompt()).await.unwrap();

    assert_eq!(completion.content, "Hi there");
    assert_eq!(completion.usage.unwrap()["total_tokens"], 9);
}

#[tokio::test]
async fn test_complete_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let client = OpenAIClient::new(&config_for(&server)).unwrap();
    let err = client.complete(&prompt()).await.unwrap_err();
    assert_eq!(err, LLMError::RateLimited("slow down".into()));
}

#[tokio::test]
async fn test_complete_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let client = OpenAIClient::new(&config_for(&server)).unwrap();
    match client.complete(&prompt()).await {
        Err(LLMError::ApiError(msg)) => {
            assert!(msg.starts_with("HTTP 500"));
            assert!(msg.contains("upstream exploded"));
        },
        other => panic!("expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_complete_without_choices_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let client = OpenAIClient::new(&config_for(&server)).unwrap();
    assert!(matches!(client.complete(&prompt()).await, Err(LLMError::ParseError(_))));
}

#[tokio::test]
async fn test_complete_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({ "choices": [] })),
        )
        .mount(&server)
        .await;

    let client = OpenAIClient::new(&config_for(&server)).unwrap();
    assert_eq!(client.complete(&prompt()).await.unwrap_err(), LLMError::Timeout(1));
}

#[tokio::test]
async fn test_stream_yields_deltas_until_done() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
        r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
        r#"{"choices":[{"delta":{"content":"lo"}}]}"#,
        r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
        "[DONE]",
        r#"{"choices":[{"delta":{"content":"after done"}}]}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = OpenAIClient::new(&config_for(&server)).unwrap();
    let fragments: Vec<Result<String, LLMError>> =
        client.stream(&prompt()).await.unwrap().collect().await;

    assert_eq!(fragments, vec![Ok("Hel".to_string()), Ok("lo".to_string())]);
}

#[tokio::test]
async fn test_stream_malformed_event_is_error_item() {
    let server = MockServer::start().await;
    let body = sse_body(&[r#"{"choices":[{"delta":{"content":"ok"}}]}"#, "{broken", "[DONE]"]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = OpenAIClient::new(&config_for(&server)).unwrap();
    let fragments: Vec<Result<String, LLMError>> =
        client.stream(&prompt()).await.unwrap().collect().await;

    assert_eq!(fragments[0], Ok("ok".to_string()));
    assert!(matches!(fragments[1], Err(LLMError::ParseError(_))));
}

#[tokio::test]
async fn test_stream_open_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = OpenAIClient::new(&config_for(&server)).unwrap();
    assert!(matches!(client.stream(&prompt()).await, Err(LLMError::ApiError(_))));
}

#[tokio::test]
async fn test_embed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_partial_json(json!({ "model": "embed-test", "input": "tokio" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "embedding": [0.5, 0.25, 0.125], "index": 0 }]
        })))
        .mount(&server)
        .await;

    let client = OpenAIClient::new(&config_for(&server)).unwrap();
    assert_eq!(client.embed("tokio").await.unwrap(), vec![0.5, 0.25, 0.125]);
}

#[tokio::test]
async fn test_agent_prepends_system_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "temperature": 0.5,
            "max_tokens": 10,
            "messages": [
                { "role": "system", "content": "You are terse." },
                { "role": "user", "content": "Hi" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "Yo." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = std::sync::Arc::new(OpenAIClient::new(&config_for(&server)).unwrap());
    let agent = Agent::new(client, "You are terse.").with_settings(0.5, 10);
    assert_eq!(agent.system_prompt(), "You are terse.");

    let completion = agent.run(&[Message::user("Hi")]).await.unwrap();
    assert_eq!(completion.content, "Yo.");
}
