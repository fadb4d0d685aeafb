use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderValue, header},
    response::Response,
};

use crate::AppState;
use crate::models::{ChatCompletionRequest, ChatCompletionResponse, CompletionRequest};
use crate::utils::{ApiError, ApiResult, ValidatedJson};

fn to_completion_request(payload: ChatCompletionRequest) -> ApiResult<CompletionRequest> {
    payload.into_completion_request().map_err(ApiError::invalid_input)
}

/// Chat completion
#[utoipa::path(
    post,
    path = "/api/v1/chat",
    request_body = ChatCompletionRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatCompletionResponse),
        (status = 400, description = "No user message to answer"),
        (status = 422, description = "Validation error", body = crate::utils::error::ValidationErrorResponse),
    ),
    tag = "Chat"
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<ChatCompletionRequest>,
) -> ApiResult<Json<ChatCompletionResponse>> {
    tracing::debug!(stage = "validated", messages = payload.messages.len(), "Chat request");
    let request = to_completion_request(payload)?;
    let response = state.chat_service.get_chat_completion(&request).await?;
    Ok(Json(response))
}

/// Streaming chat completion as server-sent events
///
/// Each frame is `data: {"chunk": ...}`; the last one carries
/// `finish_reason: "stop"`, or `error` if the provider failed.
#[utoipa::path(
    post,
    path = "/api/v1/chat/stream",
    request_body = ChatCompletionRequest,
    responses(
        (status = 200, description = "SSE stream of reply fragments", content_type = "text/event-stream", body = String),
        (status = 400, description = "No user message to answer"),
        (status = 422, description = "Validation error", body = crate::utils::error::ValidationErrorResponse),
    ),
    tag = "Chat"
)]
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<ChatCompletionRequest>,
) -> ApiResult<Response> {
    tracing::debug!(stage = "validated", messages = payload.messages.len(), "Streaming chat request");
    let request = to_completion_request(payload)?;
    let frames = state.chat_service.get_streaming_chat_completion(&request).await?;

    let mut response = Response::new(Body::from_stream(frames));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
    Ok(response)
}
