//! Configuration management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Default inference provider base URL
pub const DEFAULT_API_BASE: &str = "https://api-inference.huggingface.co";
/// Default Chinese to English translation model
pub const DEFAULT_TRANSLATION_MODEL: &str = "Helsinki-NLP/opus-mt-zh-en";
/// Default multilingual sentence-similarity model
pub const DEFAULT_SIMILARITY_MODEL: &str =
    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";
/// Default listening port
pub const DEFAULT_PORT: u16 = 5000;
/// Upper bound for `COLD_START_RETRIES`
pub const MAX_COLD_START_RETRIES: u32 = 10;
/// Longest single backoff between cold-start retries
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Configuration for the proxy
#[derive(Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub api_key: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_translation_model")]
    pub translation_model: String,
    #[serde(default = "default_similarity_model")]
    pub similarity_model: String,
    /// Extra attempts for cold-start errors, 0 keeps a single attempt
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_translation_model() -> String {
    DEFAULT_TRANSLATION_MODEL.to_string()
}

fn default_similarity_model() -> String {
    DEFAULT_SIMILARITY_MODEL.to_string()
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("HUGGING_FACE_API_KEY").unwrap_or_default(),
            port: DEFAULT_PORT,
            api_base: default_api_base(),
            translation_model: default_translation_model(),
            similarity_model: default_similarity_model(),
            max_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
            timeout_ms: None,
        }
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("api_key", &self.masked_key())
            .field("port", &self.port)
            .field("api_base", &self.api_base)
            .field("translation_model", &self.translation_model)
            .field("similarity_model", &self.similarity_model)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Read an optional env var and parse it, falling back to `default`
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", name, e)),
        Err(_) => Ok(default),
    }
}

impl ProxyConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("HUGGING_FACE_API_KEY")
            .map_err(|_| anyhow::anyhow!("HUGGING_FACE_API_KEY environment variable is required"))?;

        let timeout_ms = match std::env::var("REQUEST_TIMEOUT_MS") {
            Ok(raw) => Some(raw.trim().parse::<u64>()?),
            Err(_) => None,
        };

        let config = Self {
            api_key,
            port: env_or("PORT", DEFAULT_PORT)?,
            api_base: env_or("HF_API_BASE", default_api_base())?,
            translation_model: env_or("HF_TRANSLATION_MODEL", default_translation_model())?,
            similarity_model: env_or("HF_SIMILARITY_MODEL", default_similarity_model())?,
            max_retries: env_or("COLD_START_RETRIES", 0)?,
            retry_delay_ms: env_or("RETRY_DELAY_MS", default_retry_delay_ms())?,
            timeout_ms,
        };

        info!("Configuration loaded (api key {})", config.masked_key());
        Ok(config)
    }

    /// Load from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("API key is required"));
        }

        if self.api_base.is_empty() {
            return Err(anyhow::anyhow!("API base URL is required"));
        }

        if self.translation_model.is_empty() || self.similarity_model.is_empty() {
            return Err(anyhow::anyhow!("Model ids must not be empty"));
        }

        if self.max_retries > MAX_COLD_START_RETRIES {
            return Err(anyhow::anyhow!(
                "COLD_START_RETRIES must be at most {}, got {}",
                MAX_COLD_START_RETRIES,
                self.max_retries
            ));
        }

        if self.max_retries > 0 {
            warn!(
                "Cold-start retries enabled: up to {} extra attempts",
                self.max_retries
            );
        }

        Ok(())
    }

    /// Endpoint URL for a provider model
    pub fn model_endpoint(&self, model: &str) -> String {
        format!("{}/models/{}", self.api_base.trim_end_matches('/'), model)
    }

    /// Translation endpoint URL
    pub fn translation_endpoint(&self) -> String {
        self.model_endpoint(&self.translation_model)
    }

    /// Sentence-similarity endpoint URL
    pub fn similarity_endpoint(&self) -> String {
        self.model_endpoint(&self.similarity_model)
    }

    /// API key safe for logs
    pub fn masked_key(&self) -> String {
        let visible: String = self.api_key.chars().take(3).collect();
        if self.api_key.chars().count() <= 6 {
            "***".to_string()
        } else {
            format!("{}***", visible)
        }
    }
}
