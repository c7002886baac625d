use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Docchat server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// API key for the OpenAI-compatible inference service. When absent,
    /// embedding and completion calls fail with a service-unavailable error
    /// instead of aborting startup.
    pub openai_api_key: Option<String>,
    /// Base URL of the inference service (defaults to the hosted OpenAI API).
    pub openai_base_url: String,
    /// Embedding model identifier passed to the inference service.
    pub embedding_model: String,
    /// Chat completion model identifier passed to the inference service.
    pub chat_model: String,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Character overlap carried between adjacent chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub retrieval_top_k: usize,
    /// Output ceiling for answer generation, in tokens.
    pub completion_max_tokens: u32,
    /// Sampling temperature for answer generation.
    pub completion_temperature: f32,
    /// Number of trailing conversation turns supplied as context.
    pub history_window: usize,
    /// Optional bearer token required on every request.
    pub api_token: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: usize = 200;
const DEFAULT_TOP_K: usize = 3;
const DEFAULT_MAX_TOKENS: u32 = 500;
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_HISTORY_WINDOW: usize = 6;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            embedding_model: load_env_optional("DOCCHAT_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            chat_model: load_env_optional("DOCCHAT_CHAT_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            chunk_size: parse_env_or("DOCCHAT_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            chunk_overlap: parse_env_or("DOCCHAT_CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?,
            retrieval_top_k: parse_env_or("DOCCHAT_TOP_K", DEFAULT_TOP_K)?,
            completion_max_tokens: parse_env_or("DOCCHAT_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            completion_temperature: parse_env_or("DOCCHAT_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            history_window: parse_env_or("DOCCHAT_HISTORY_WINDOW", DEFAULT_HISTORY_WINDOW)?,
            api_token: load_env_optional("DOCCHAT_API_TOKEN"),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        };

        if config.chunk_size == 0 {
            return Err(ConfigError::InvalidValue("DOCCHAT_CHUNK_SIZE".into()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::InvalidValue("DOCCHAT_CHUNK_OVERLAP".into()));
        }

        Ok(config)
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        base_url = %config.openai_base_url,
        embedding_model = %config.embedding_model,
        chat_model = %config.chat_model,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        top_k = config.retrieval_top_k,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
