//! Core data models shared by the server and the client

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use utoipa::ToSchema;

use crate::core::errors::{ProxyError, Result};

/// Message returned for missing or blank input
pub const TEXT_REQUIRED: &str = "Text is required";

/// Request body accepted by both endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TextPayload {
    /// Chinese text to process
    #[serde(default)]
    pub text: Option<String>,
}

impl TextPayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

/// Ensure text is present and not blank, returning it untrimmed
fn require_text(text: Option<String>) -> Result<String> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ProxyError::ValidationError {
            message: TEXT_REQUIRED.to_string(),
        }),
    }
}

/// Validated translation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
}

impl TranslationRequest {
    pub fn try_new(text: Option<String>) -> Result<Self> {
        Ok(Self {
            text: require_text(text)?,
        })
    }
}

/// Validated tokenization request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizationRequest {
    pub text: String,
}

impl TokenizationRequest {
    pub fn try_new(text: Option<String>) -> Result<Self> {
        Ok(Self {
            text: require_text(text)?,
        })
    }
}

/// Translation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TranslationResult {
    /// English translation
    pub translation_text: String,
}

/// Which provider shape a tokenization result was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TokenizationMode {
    /// Provider returned token/id pairs
    TokenIds,
    /// Provider returned sentence-similarity scores
    SimilarityScores,
    /// Unknown shape, passed through untouched
    Raw,
}

impl fmt::Display for TokenizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenizationMode::TokenIds => write!(f, "token_ids"),
            TokenizationMode::SimilarityScores => write!(f, "similarity_scores"),
            TokenizationMode::Raw => write!(f, "raw"),
        }
    }
}

/// Wire form of a tokenization result body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum TokenizationOutput {
    /// Tokens with opaque ids (numbers or vectors)
    Tokens {
        tokens: Vec<String>,
        #[schema(value_type = Vec<Object>)]
        ids: Vec<Value>,
    },
    /// Provider payload passed through as-is
    Raw {
        #[schema(value_type = Object)]
        result: Value,
    },
}

/// Tokenization result with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TokenizationResult {
    #[serde(flatten)]
    pub output: TokenizationOutput,
    pub mode: TokenizationMode,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub success: bool,
}

impl TokenizationResult {
    /// Tokens, if the result carries any
    pub fn tokens(&self) -> Option<&[String]> {
        match &self.output {
            TokenizationOutput::Tokens { tokens, .. } => Some(tokens),
            TokenizationOutput::Raw { .. } => None,
        }
    }
}

/// Error body returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable message
    pub error: String,
    /// Stable error code
    pub code: String,
    /// Provider diagnostics, not for programmatic branching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}
