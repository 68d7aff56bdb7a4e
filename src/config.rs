use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CLASSIFICATION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SUMMARY_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the document intake service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// API key for the completion and embedding endpoints. Checked lazily, per call.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API (without the trailing endpoint path).
    pub openai_base_url: String,
    /// Model used for document-type classification.
    pub classification_model: String,
    /// Model used for partial and final summaries and for deadline extraction.
    pub summary_model: String,
    /// Model used to answer chat questions.
    pub chat_model: String,
    /// Model (or encoding name) whose tokenizer bounds chunk sizes.
    pub tokenizer_model: String,
    /// Token budget of a single summarization chunk.
    pub summary_chunk_tokens: usize,
    /// Token count above which deadline extraction splits the document.
    pub deadline_split_threshold: usize,
    /// Embedding backend used by the chat index.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of locally hashed vectors.
    pub embedding_dimension: usize,
    /// Chat index window size, in characters.
    pub chat_chunk_size: usize,
    /// Characters shared between neighbouring chat index windows.
    pub chat_chunk_overlap: usize,
    /// Number of index windows handed to the chat model per question.
    pub chat_top_k: usize,
    /// Per-request timeout applied to outbound HTTP calls.
    pub request_timeout_secs: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the chat index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI-compatible embeddings endpoint.
    OpenAI,
    /// Deterministic local hashing, no network access.
    Hashing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            classification_model: DEFAULT_CLASSIFICATION_MODEL.to_string(),
            summary_model: DEFAULT_SUMMARY_MODEL.to_string(),
            chat_model: DEFAULT_SUMMARY_MODEL.to_string(),
            tokenizer_model: DEFAULT_SUMMARY_MODEL.to_string(),
            summary_chunk_tokens: 3000,
            deadline_split_threshold: 10_000,
            embedding_provider: EmbeddingProvider::OpenAI,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: 256,
            chat_chunk_size: 1000,
            chat_chunk_overlap: 150,
            chat_top_k: 4,
            request_timeout_secs: 120,
            server_port: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    ///
    /// Every variable is optional; unset or blank values keep the defaults from [`Config::default`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let summary_model = load_env_or("SUMMARY_MODEL", defaults.summary_model);
        let tokenizer_model = load_env_or("TOKENIZER_MODEL", summary_model.clone());

        let config = Self {
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_or("OPENAI_BASE_URL", defaults.openai_base_url),
            classification_model: load_env_or(
                "CLASSIFICATION_MODEL",
                defaults.classification_model,
            ),
            chat_model: load_env_or("CHAT_MODEL", defaults.chat_model),
            summary_model,
            tokenizer_model,
            summary_chunk_tokens: load_parsed("SUMMARY_CHUNK_TOKENS")?
                .unwrap_or(defaults.summary_chunk_tokens),
            deadline_split_threshold: load_parsed("DEADLINE_SPLIT_THRESHOLD")?
                .unwrap_or(defaults.deadline_split_threshold),
            embedding_provider: load_env_optional("EMBEDDING_PROVIDER")
                .map(|value| {
                    value.parse().map_err(|()| {
                        ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string())
                    })
                })
                .transpose()?
                .unwrap_or(defaults.embedding_provider),
            embedding_model: load_env_or("EMBEDDING_MODEL", defaults.embedding_model),
            embedding_dimension: load_parsed("EMBEDDING_DIMENSION")?
                .unwrap_or(defaults.embedding_dimension),
            chat_chunk_size: load_parsed("CHAT_CHUNK_SIZE")?.unwrap_or(defaults.chat_chunk_size),
            chat_chunk_overlap: load_parsed("CHAT_CHUNK_OVERLAP")?
                .unwrap_or(defaults.chat_chunk_overlap),
            chat_top_k: load_parsed("CHAT_TOP_K")?.unwrap_or(defaults.chat_top_k),
            request_timeout_secs: load_parsed("REQUEST_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout_secs),
            server_port: load_parsed("SERVER_PORT")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject sizes that must be positive.
    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("SUMMARY_CHUNK_TOKENS", self.summary_chunk_tokens),
            ("CHAT_CHUNK_SIZE", self.chat_chunk_size),
            ("EMBEDDING_DIMENSION", self.embedding_dimension),
        ];
        match positive.into_iter().find(|(_, value)| *value == 0) {
            Some((key, _)) => Err(ConfigError::InvalidValue(key.into())),
            None => Ok(()),
        }
    }

    /// Whether a non-empty API key is available for outbound model calls.
    pub fn has_api_key(&self) -> bool {
        self.openai_api_key
            .as_deref()
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: String) -> String {
    load_env_optional(key).unwrap_or(default)
}

fn load_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "hashing" | "local" => Ok(Self::Hashing),
            _ => Err(()),
        }
    }
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
        classification_model = %config.classification_model,
        summary_model = %config.summary_model,
        embedding_provider = ?config.embedding_provider,
        has_api_key = config.has_api_key(),
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
