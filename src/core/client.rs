//! Inference gateway client for the Hugging Face API

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::core::config::{ProxyConfig, MAX_RETRY_DELAY_MS};
use crate::core::errors::{ProxyError, Result};

/// Exponential backoff before retry number `attempt` (1-based), capped
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2_u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_RETRY_DELAY_MS))
}

/// Authenticated client for the translation and sentence-similarity models
#[derive(Debug, Clone)]
pub struct InferenceGateway {
    client: reqwest::Client,
    config: Arc<ProxyConfig>,
}

impl InferenceGateway {
    /// Create a new gateway
    pub fn new(config: ProxyConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder()
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(10);
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Create from environment
    pub fn from_env() -> Result<Self> {
        let config = ProxyConfig::from_env()?;
        Self::new(config)
    }

    /// Configuration in use
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Call the translation model, returning the raw provider response
    pub async fn call_translation(&self, text: &str) -> Result<Value> {
        let body = json!({ "inputs": text });
        self.post_with_retry(&self.config.translation_endpoint(), &body)
            .await
    }

    /// Call the sentence-similarity model, returning the raw provider response
    ///
    /// The provider is asked to wait for the model to load instead of failing
    /// fast on a cold start.
    pub async fn call_similarity(&self, text: &str) -> Result<Value> {
        let body = json!({
            "inputs": {
                "source_sentence": text,
                "sentences": [text]
            },
            "options": {
                "wait_for_model": true
            }
        });
        self.post_with_retry(&self.config.similarity_endpoint(), &body)
            .await
    }

    /// Post, retrying only cold-start errors and only if configured to
    async fn post_with_retry(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let mut attempt = 0;

        loop {
            match self.send_request(endpoint, body).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!("Provider answered after {} cold-start retries", attempt);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_cold_start() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(self.config.retry_delay_ms, attempt);
                    warn!(
                        "Model cold start at {}, retry {} of {} in {:?}",
                        endpoint, attempt, self.config.max_retries, delay
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send actual HTTP request
    async fn send_request(&self, endpoint: &str, body: &Value) -> Result<Value> {
        debug!("POST {}", endpoint);

        let response = self
            .client
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ProxyError::TransportError {
                message: e.to_string(),
            })?;

        let status = response.status();

        if status.is_success() {
            let json: Value = response
                .json()
                .await
                .map_err(|e| ProxyError::ContractViolation {
                    message: format!("Provider body is not JSON: {}", e),
                })?;
            debug!("Provider result: {}", json);
            Ok(json)
        } else {
            let status_code = status.as_u16();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Provider error response ({}): {}", status_code, error_text);

            Err(ProxyError::ProviderHttpError {
                status: status_code,
                body: error_text,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MAX_COLD_START_RETRIES;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer, max_retries: u32) -> InferenceGateway {
        let config = ProxyConfig {
            api_key: "hf_test_key".to_string(),
            api_base: server.uri(),
            max_retries,
            retry_delay_ms: 1,
            ..Default::default()
        };
        InferenceGateway::new(config).unwrap()
    }

    #[test]
    fn test_gateway_requires_key() {
        let config = ProxyConfig {
            api_key: String::new(),
            ..Default::default()
        };
        assert!(InferenceGateway::new(config).is_err());
    }

    #[tokio::test]
    async fn test_translation_sends_bearer_and_inputs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/Helsinki-NLP/opus-mt-zh-en"))
            .and(header("Authorization", "Bearer hf_test_key"))
            .and(body_json(json!({ "inputs": "你好" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{ "translation_text": "Hello" }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let raw = assert_ok!(gateway_for(&server, 0).call_translation("你好").await);
        assert_eq!(raw, json!([{ "translation_text": "Hello" }]));
    }

    #[tokio::test]
    async fn test_similarity_asks_to_wait_for_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/models/sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2",
            ))
            .and(body_json(json!({
                "inputs": { "source_sentence": "你好", "sentences": ["你好"] },
                "options": { "wait_for_model": true }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1.0])))
            .expect(1)
            .mount(&server)
            .await;

        let raw = assert_ok!(gateway_for(&server, 0).call_similarity("你好").await);
        assert_eq!(raw, json!([1.0]));
    }

    #[tokio::test]
    async fn test_non_success_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .expect(1)
            .mount(&server)
            .await;

        let err = assert_err!(gateway_for(&server, 0).call_translation("你好").await);
        match err {
            ProxyError::ProviderHttpError { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "Service Unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_success_is_contract_violation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = assert_err!(gateway_for(&server, 0).call_translation("你好").await);
        assert_eq!(err.code(), "contract_violation");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_transport_error() {
        let config = ProxyConfig {
            api_key: "hf_test_key".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        };
        let gateway = InferenceGateway::new(config).unwrap();

        let err = assert_err!(gateway.call_similarity("你好").await);
        assert_eq!(err.code(), "transport_error");
    }

    #[tokio::test]
    async fn test_cold_start_retry_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(json!({ "error": "Model is currently loading" })),
            )
            .expect(3)
            .mount(&server)
            .await;

        let err = assert_err!(gateway_for(&server, 2).call_similarity("你好").await);
        assert!(err.is_cold_start());
    }

    #[test]
    fn test_backoff_delay_saturates_and_caps() {
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(0, 70), Duration::ZERO);
        assert_eq!(backoff_delay(1000, 70), Duration::from_millis(MAX_RETRY_DELAY_MS));
        assert_eq!(backoff_delay(u64::MAX, 2), Duration::from_millis(MAX_RETRY_DELAY_MS));
    }

    #[test]
    fn test_gateway_rejects_unbounded_retries() {
        let config = ProxyConfig {
            api_key: "hf_test_key".to_string(),
            max_retries: 70,
            retry_delay_ms: 0,
            ..Default::default()
        };
        assert!(InferenceGateway::new(config).is_err());
    }

    #[tokio::test]
    async fn test_persistent_cold_start_at_retry_limit_returns_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(json!({ "error": "Model is currently loading" })),
            )
            .expect(u64::from(MAX_COLD_START_RETRIES) + 1)
            .mount(&server)
            .await;

        let config = ProxyConfig {
            api_key: "hf_test_key".to_string(),
            api_base: server.uri(),
            max_retries: MAX_COLD_START_RETRIES,
            retry_delay_ms: 0,
            ..Default::default()
        };
        let gateway = InferenceGateway::new(config).unwrap();

        let err = assert_err!(gateway.call_similarity("你好").await);
        assert_eq!(err.code(), "provider_http_error");
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad input"))
            .expect(1)
            .mount(&server)
            .await;

        assert_err!(gateway_for(&server, 3).call_translation("你好").await);
    }
}
