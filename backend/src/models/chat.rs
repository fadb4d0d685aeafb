use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: i64 = 1000;

// ============================================================================
// Domain types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// A single chat turn. Fields are read-only once the message exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self::with_timestamp(role, content, Utc::now())
    }

    pub fn with_timestamp(role: Role, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self { role, content: content.into(), created_at }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Validated, strongly typed completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub is_rag_enabled: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS as u32,
            is_rag_enabled: false,
        }
    }

    /// Content of the most recent user message, scanning from the end.
    pub fn latest_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role() == Role::User)
            .map(Message::content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatCompletionResponse {
    pub message: Message,
    #[schema(value_type = Option<Object>)]
    pub usage: Option<serde_json::Value>,
}

impl ChatCompletionResponse {
    pub fn assistant(content: impl Into<String>, usage: Option<serde_json::Value>) -> Self {
        Self { message: Message::assistant(content), usage }
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Inbound message as sent by clients. `role` and `content` stay optional so
/// missing fields are reported one by one.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ChatMessageInput {
    #[validate(required, custom(function = "validate_role"))]
    pub role: Option<String>,
    #[validate(required, length(min = 1, max = 1000))]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    #[validate(length(min = 1), nested)]
    pub messages: Vec<ChatMessageInput>,
    #[serde(default = "default_temperature")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    #[validate(range(min = 1, max = 4294967295i64))]
    pub max_tokens: i64,
    #[serde(default)]
    pub is_rag_enabled: bool,
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> i64 {
    DEFAULT_MAX_TOKENS
}

fn validate_role(role: &str) -> Result<(), ValidationError> {
    if Role::from_str(role).is_ok() {
        return Ok(());
    }
    let mut err = ValidationError::new("invalid_role");
    err.message = Some("role must be one of: system, user, assistant".into());
    Err(err)
}

impl ChatCompletionRequest {
    /// Convert a request that already passed `validate()` into domain types.
    ///
    /// Fields that `validate()` guarantees are re-checked here, so an
    /// unvalidated request yields an error instead of a panic.
    pub fn into_completion_request(self) -> Result<CompletionRequest, String> {
        let mut messages = Vec::with_capacity(self.messages.len());
        for (idx, input) in self.messages.into_iter().enumerate() {
            let role = input
                .role
                .as_deref()
                .ok_or_else(|| format!("messages.{}.role is missing", idx))?
                .parse::<Role>()?;
            let content =
                input.content.ok_or_else(|| format!("messages.{}.content is missing", idx))?;
            let created_at = input.created_at.unwrap_or_else(Utc::now);
            messages.push(Message::with_timestamp(role, content, created_at));
        }

        let max_tokens = u32::try_from(self.max_tokens)
            .map_err(|_| format!("max_tokens out of range: {}", self.max_tokens))?;

        Ok(CompletionRequest {
            messages,
            temperature: self.temperature,
            max_tokens,
            is_rag_enabled: self.is_rag_enabled,
        })
    }
}
