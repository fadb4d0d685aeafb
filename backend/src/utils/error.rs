use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// One offending request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    /// Last path segment, e.g. `role`
    pub field: String,
    /// Full dotted path, e.g. `messages.0.role`
    pub location: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl FieldError {
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let location = location.into();
        let field = location.rsplit('.').next().unwrap_or(&location).to_string();
        Self { field, location, kind: kind.into(), message: message.into() }
    }
}

/// API Error returned by handlers
///
/// Provider failures never reach this type: the chat service turns them
/// into a fallback reply before the handler sees them.
#[derive(Error, Debug)]
pub enum ApiError {
    // Validation errors 4xxx
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("prompt cannot be empty")]
    EmptyPrompt,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // System errors 5xxx
    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::Validation(errors)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn error_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 4001,
            Self::EmptyPrompt => 4002,
            Self::InvalidInput(_) => 4003,
            Self::InternalError(_) => 5001,
            Self::Other(_) => 5002,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::EmptyPrompt | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::InternalError(_) | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidationErrorResponse {
    pub errors: Vec<FieldError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self {
            Self::Validation(errors) => {
                (status, Json(ValidationErrorResponse { errors })).into_response()
            },
            other => {
                if status.is_server_error() {
                    tracing::error!("Request failed: {}", other);
                }
                let body = ApiErrorResponse { code: other.error_code(), message: other.to_string() };
                (status, Json(body)).into_response()
            },
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::internal_error(format!("JSON serialization error: {}", err))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
