//! Custom error types for proxy operations

use thiserror::Error;

/// Proxy-related errors
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Input text missing or blank
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
    },

    /// Provider could not be reached
    #[error("Network error: {message}")]
    TransportError {
        message: String,
    },

    /// Provider answered with a non-2xx status
    #[error("Provider error: {status} - {body}")]
    ProviderHttpError {
        status: u16,
        body: String,
    },

    /// Provider answered 2xx with a shape we cannot use
    #[error("Contract violation: {message}")]
    ContractViolation {
        message: String,
    },

    /// Wrapper for anyhow errors
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl ProxyError {
    /// Stable code exposed to API callers
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::ValidationError { .. } => "validation_error",
            ProxyError::TransportError { .. } | ProxyError::HttpError(_) => "transport_error",
            ProxyError::ProviderHttpError { .. } => "provider_http_error",
            ProxyError::ContractViolation { .. } => "contract_violation",
            ProxyError::InternalError(_) => "internal_error",
        }
    }

    /// Raw diagnostic text for the error, as reported by the provider or transport
    pub fn details(&self) -> String {
        match self {
            ProxyError::ProviderHttpError { body, .. } => body.clone(),
            ProxyError::TransportError { message }
            | ProxyError::ContractViolation { message }
            | ProxyError::ValidationError { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the provider is still loading the model
    pub fn is_cold_start(&self) -> bool {
        match self {
            ProxyError::ProviderHttpError { status, body } => {
                *status == 503 || body.to_ascii_lowercase().contains("currently loading")
            }
            _ => false,
        }
    }
}

impl From<anyhow::Error> for ProxyError {
    fn from(err: anyhow::Error) -> Self {
        ProxyError::InternalError(err.to_string())
    }
}

/// Result type for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;
