//! HTTP API server implementation

use axum::{
    extract::{rejection::JsonRejection, Json, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use utoipa::OpenApi;

use crate::core::client::InferenceGateway;
use crate::core::errors::{ProxyError, Result};
use crate::core::models::{
    ErrorBody, HealthResponse, TextPayload, TokenizationMode, TokenizationOutput,
    TokenizationRequest, TokenizationResult, TranslationRequest, TranslationResult, TEXT_REQUIRED,
};
use crate::core::normalizer::{normalize_tokenization, normalize_translation};

/// Application state
#[derive(Clone)]
pub struct AppState {
    gateway: Arc<InferenceGateway>,
}

impl AppState {
    pub fn new(gateway: InferenceGateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }
}

/// The two operations the API exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Translate,
    Tokenize,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Translate => write!(f, "translate"),
            Operation::Tokenize => write!(f, "tokenize"),
        }
    }
}

/// Lifecycle of a single API request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestStage {
    Received,
    Validated,
    Dispatched,
    Normalized,
    Responded,
    Rejected,
    Failed,
}

/// Error mapped onto an HTTP response
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiFailure {
    fn rejected(err: &ProxyError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: TEXT_REQUIRED.to_string(),
                code: err.code().to_string(),
                details: None,
            },
        }
    }

    /// 500 with a generic message; the raw cause stays in the server log
    /// except on the tokenize path, where it is attached as `details`
    fn failed(operation: Operation, err: &ProxyError) -> Self {
        let (message, details) = match (operation, err) {
            (Operation::Translate, _) => ("Failed to Translate Text", None),
            (Operation::Tokenize, ProxyError::ProviderHttpError { .. }) => {
                ("Sentence transformer error", Some(err.details()))
            }
            (Operation::Tokenize, _) => ("Tokenization error", Some(err.details())),
        };

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                error: message.to_string(),
                code: err.code().to_string(),
                details,
            },
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Validate, dispatch to the provider, normalize
async fn process<V, D, Fut, N, T>(
    operation: Operation,
    payload: std::result::Result<Json<TextPayload>, JsonRejection>,
    validate: V,
    dispatch: D,
    normalize: N,
) -> std::result::Result<Json<T>, ApiFailure>
where
    V: FnOnce(Option<String>) -> Result<String>,
    D: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<(String, serde_json::Value)>>,
    N: FnOnce(&str, serde_json::Value) -> Result<T>,
{
    debug!("{} {:?}", operation, RequestStage::Received);

    let text = match payload {
        Ok(Json(body)) => body.text,
        Err(rejection) => {
            warn!("{} body rejected: {}", operation, rejection);
            None
        }
    };

    let text = validate(text).map_err(|e| {
        debug!("{} {:?}", operation, RequestStage::Rejected);
        ApiFailure::rejected(&e)
    })?;
    debug!("{} {:?}", operation, RequestStage::Validated);

    let pending = dispatch(text);
    debug!("{} {:?}", operation, RequestStage::Dispatched);
    let (text, raw) = pending.await.map_err(|e| {
        error!("{} error: {} ({})", operation, e, e.code());
        debug!("{} {:?}", operation, RequestStage::Failed);
        ApiFailure::failed(operation, &e)
    })?;

    let result = normalize(&text, raw).map_err(|e| {
        error!("{} error: {} ({})", operation, e, e.code());
        debug!("{} {:?}", operation, RequestStage::Failed);
        ApiFailure::failed(operation, &e)
    })?;
    debug!("{} {:?}", operation, RequestStage::Normalized);

    let response = Json(result);
    debug!("{} {:?}", operation, RequestStage::Responded);
    Ok(response)
}

/// Health check handler
#[utoipa::path(get, path = "/", responses((status = 200, body = HealthResponse)))]
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Translate Chinese text to English
#[utoipa::path(
    post,
    path = "/api/translate",
    request_body = TextPayload,
    responses(
        (status = 200, body = TranslationResult),
        (status = 400, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
async fn translate(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<TextPayload>, JsonRejection>,
) -> std::result::Result<Json<TranslationResult>, ApiFailure> {
    process(
        Operation::Translate,
        payload,
        |text| TranslationRequest::try_new(text).map(|r| r.text),
        |text| async move {
            let raw = state.gateway.call_translation(&text).await;
            raw.map(|raw| (text, raw))
        },
        |_, raw| {
            let result = normalize_translation(&raw)?;
            info!("Translation result: {}", result.translation_text);
            Ok(result)
        },
    )
    .await
}

/// Tokenize Chinese text through the sentence-similarity model
#[utoipa::path(
    post,
    path = "/api/tokenize",
    request_body = TextPayload,
    responses(
        (status = 200, body = TokenizationResult),
        (status = 400, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
async fn tokenize(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<TextPayload>, JsonRejection>,
) -> std::result::Result<Json<TokenizationResult>, ApiFailure> {
    let model = state.gateway.config().similarity_model.clone();

    process(
        Operation::Tokenize,
        payload,
        |text| TokenizationRequest::try_new(text).map(|r| r.text),
        |text| async move {
            let raw = state.gateway.call_similarity(&text).await;
            raw.map(|raw| (text, raw))
        },
        |text, raw| {
            let result = normalize_tokenization(text, &model, raw)?;
            info!("Tokenization result ({})", result.mode);
            Ok(result)
        },
    )
    .await
}

/// OpenAPI document for the proxy
#[derive(OpenApi)]
#[openapi(
    paths(health_check, translate, tokenize),
    components(schemas(
        TextPayload,
        TranslationResult,
        TokenizationResult,
        TokenizationOutput,
        TokenizationMode,
        ErrorBody,
        HealthResponse
    ))
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Open CORS policy: any origin, preflights answered directly
async fn allow_any_origin(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    response
}

/// Build the router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/api/openapi.json", get(openapi_json))
        .route("/api/translate", post(translate))
        .route("/api/tokenize", post(tokenize))
        .layer(middleware::from_fn(allow_any_origin))
        .with_state(Arc::new(state))
}

/// Run the HTTP server
pub async fn run_server(host: String, port: u16, gateway: InferenceGateway) -> anyhow::Result<()> {
    let app = build_router(AppState::new(gateway));

    // Bind address
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("Server is running on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
