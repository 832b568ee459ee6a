//! Backends the client session talks to

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::core::models::{TextPayload, TokenizationResult, TranslationResult};

/// Default tokenize endpoint of a locally running proxy
pub const DEFAULT_TOKENIZE_URL: &str = "http://localhost:5000/api/tokenize";
/// Default translate endpoint of a locally running proxy
pub const DEFAULT_TRANSLATE_URL: &str = "http://localhost:5000/api/translate";

/// Errors seen by the client when calling the proxy
#[derive(Error, Debug)]
pub enum BackendError {
    /// Proxy answered with a non-2xx status
    #[error("HTTP error! Status: {status}")]
    Status {
        status: u16,
    },

    /// Proxy could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// Body did not match the expected result shape
    #[error("Invalid response: {0}")]
    Decode(String),
}

/// Something that can tokenize and translate text on behalf of the session
#[async_trait]
pub trait ProcessorBackend: Send + Sync {
    async fn tokenize(&self, text: &str) -> Result<TokenizationResult, BackendError>;
    async fn translate(&self, text: &str) -> Result<TranslationResult, BackendError>;
}

/// Backend posting to the proxy's HTTP API
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    tokenize_url: String,
    translate_url: String,
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new(DEFAULT_TOKENIZE_URL, DEFAULT_TRANSLATE_URL)
    }
}

impl HttpBackend {
    pub fn new(tokenize_url: impl Into<String>, translate_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            tokenize_url: tokenize_url.into(),
            translate_url: translate_url.into(),
        }
    }

    /// Backend for a proxy at `base`, e.g. `http://localhost:5000`
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self::new(
            format!("{}/api/tokenize", base),
            format!("{}/api/translate", base),
        )
    }

    async fn post<T: DeserializeOwned>(&self, url: &str, text: &str) -> Result<T, BackendError> {
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(&TextPayload::new(text))
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ProcessorBackend for HttpBackend {
    async fn tokenize(&self, text: &str) -> Result<TokenizationResult, BackendError> {
        self.post(&self.tokenize_url, text).await
    }

    async fn translate(&self, text: &str) -> Result<TranslationResult, BackendError> {
        self.post(&self.translate_url, text).await
    }
}
