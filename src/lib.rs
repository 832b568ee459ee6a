//! Hanyu Proxy - Chinese text translation and tokenization relay
//!
//! This library relays Chinese text to Hugging Face translation and
//! sentence-similarity models, normalizes their responses into a stable
//! contract, serves that contract over HTTP, and provides a client session
//! controller for driving the API.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod core;
pub mod server;
pub mod session;
pub mod cli;

// Re-export key types for convenience
pub use crate::core::{
    client::InferenceGateway,
    config::ProxyConfig,
    models::{TokenizationResult, TranslationResult, TextPayload},
    errors::ProxyError,
};

pub use crate::session::{
    backend::{HttpBackend, ProcessorBackend},
    controller::{ActionKind, ClientSession, SessionController},
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
