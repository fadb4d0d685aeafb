use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub llm: LLMConfig,
    pub retrieval: RetrievalConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    /// Deployment environment name, e.g. "development" or "production"
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    /// OpenAI-compatible base URL, without the trailing `/chat/completions`
    pub api_base: String,
    pub api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
    /// Provider request timeout in seconds (accepts "60", "60s", "2m")
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Directory of .txt/.md documents indexed at startup. No directory means
    /// retrieval never returns context.
    pub documents_dir: Option<String>,
    pub top_k: usize,
    pub min_score: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TelemetryConfig {
    pub token: Option<String>,
}

impl Config {
    /// Load configuration with environment variable override support
    ///
    /// Loading order:
    /// 1. Load `.env` into the process environment (if present)
    /// 2. Load from the given path, or the first config.toml found
    /// 3. Override with environment variables
    /// 4. Validate the final configuration
    pub fn load(path: Option<&str>) -> Result<Self, anyhow::Error> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::info!("Loaded environment from {}", env_file.display());
        }

        let mut config = match path.map(str::to_string).or_else(Self::find_config_file) {
            Some(config_path) => Self::from_toml(&config_path)?,
            None => {
                tracing::warn!("Configuration file not found, using defaults");
                Config::default()
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_ENV: Application environment name
    /// - OPENAI_API_KEY: Provider API key
    /// - OPENAI_API_BASE: Provider base URL
    /// - CHAT_MODEL: Chat completion model identifier
    /// - EMBEDDING_MODEL: Embedding model identifier
    /// - LOGFIRE_TOKEN: Telemetry token
    /// - APP_SERVER_HOST / APP_SERVER_PORT: Listen address
    /// - APP_LOG_LEVEL: Logging level (e.g., "info,ai_chatbot=debug")
    /// - APP_LLM_TIMEOUT: Provider timeout (accepts "30s", "2m")
    /// - APP_RAG_DOCUMENTS_DIR: Retrieval documents directory
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup("APP_ENV") {
            self.app.environment = env;
            tracing::info!("Override app.environment from env: {}", self.app.environment);
        }

        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = key;
            tracing::info!("Override llm.api_key from env");
        }

        if let Some(base) = lookup("OPENAI_API_BASE") {
            self.llm.api_base = base;
            tracing::info!("Override llm.api_base from env: {}", self.llm.api_base);
        }

        if let Some(model) = lookup("CHAT_MODEL") {
            self.llm.chat_model = model;
            tracing::info!("Override llm.chat_model from env: {}", self.llm.chat_model);
        }

        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.llm.embedding_model = model;
            tracing::info!("Override llm.embedding_model from env: {}", self.llm.embedding_model);
        }

        if let Some(token) = lookup("LOGFIRE_TOKEN") {
            self.telemetry.token = Some(token);
            tracing::info!("Override telemetry.token from env");
        }

        if let Some(host) = lookup("APP_SERVER_HOST") {
            self.server.host = host;
            tracing::info!("Override server.host from env: {}", self.server.host);
        }

        if let Some(port) = lookup("APP_SERVER_PORT") {
            match port.parse() {
                Ok(port) => {
                    self.server.port = port;
                    tracing::info!("Override server.port from env: {}", self.server.port);
                },
                Err(e) => tracing::warn!("Invalid APP_SERVER_PORT '{}': {}", port, e),
            }
        }

        if let Some(level) = lookup("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Some(timeout) = lookup("APP_LLM_TIMEOUT") {
            match parse_duration_to_secs(&timeout) {
                Ok(val) => {
                    self.llm.timeout_secs = val;
                    tracing::info!("Override llm.timeout_secs from env: {}", val);
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_LLM_TIMEOUT '{}': {} (keep {})",
                    timeout,
                    e,
                    self.llm.timeout_secs
                ),
            }
        }

        if let Some(dir) = lookup("APP_RAG_DOCUMENTS_DIR") {
            self.retrieval.documents_dir = Some(dir);
            tracing::info!("Override retrieval.documents_dir from env");
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.llm.api_key.trim().is_empty() {
            anyhow::bail!("LLM API key is required (set OPENAI_API_KEY or llm.api_key)");
        }

        if self.llm.api_base.trim().is_empty() {
            anyhow::bail!("llm.api_base cannot be empty");
        }

        if self.llm.timeout_secs == 0 {
            anyhow::bail!("llm.timeout_secs must be > 0");
        }

        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be > 0");
        }

        if self.telemetry.token.as_deref().is_none_or(|t| t.trim().is_empty()) {
            tracing::warn!("Telemetry token not configured (LOGFIRE_TOKEN); logs stay local");
        }

        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000 }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { name: "AI Chatbot".to_string(), environment: "development".to_string() }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { documents_dir: None, top_k: 3, min_score: 0.75 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,ai_chatbot=debug".to_string(), file: None }
    }
}

// =========================
// Helpers for parsing values
// =========================

fn parse_duration_to_secs(input: &str) -> Result<u64, String> {
    // Accept plain numbers (treated as seconds)
    if let Ok(val) = input.parse::<u64>() {
        return Ok(val);
    }

    let s = input.trim().to_lowercase();
    let (num_str, unit) = s.split_at(s.chars().take_while(|c| c.is_ascii_digit()).count());
    if num_str.is_empty() || unit.is_empty() {
        return Err("missing number or unit".into());
    }
    let n: u64 = num_str.parse().map_err(|_| "invalid number".to_string())?;
    match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Ok(n),
        "m" | "min" | "mins" | "minute" | "minutes" => Ok(n * 60),
        "h" | "hr" | "hour" | "hours" => Ok(n * 60 * 60),
        _ => Err(format!("unsupported unit: {}", unit)),
    }
}

// Accepts numeric seconds or human-friendly strings
fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;
    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = u64;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a number of seconds or a string like '30s', '2m'")
        }
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v)
        }
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if v >= 0 { Ok(v as u64) } else { Err(E::custom("negative not allowed")) }
        }
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(v).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(Visitor)
}
