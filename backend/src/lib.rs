pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod tests;

use std::any::Any;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::services::ChatService;
use crate::utils::ApiError;

pub struct AppState {
    pub chat_service: Arc<ChatService>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::chat::chat,
        handlers::chat::chat_stream,
        handlers::health::health,
    ),
    components(schemas(
        models::Role,
        models::Message,
        models::ChatMessageInput,
        models::ChatCompletionRequest,
        models::ChatCompletionResponse,
        handlers::health::HealthResponse,
        utils::FieldError,
        utils::error::ValidationErrorResponse,
        utils::error::ApiErrorResponse,
    )),
    tags(
        (name = "Chat", description = "Chat completions"),
        (name = "Health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);
    ApiError::internal_error(detail).into_response()
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/api/v1/chat", post(handlers::chat::chat))
        .route("/api/v1/chat/stream", post(handlers::chat::chat_stream))
        .route("/", get(handlers::health::health));

    Router::new()
        .merge(api_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %uuid::Uuid::new_v4(),
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
