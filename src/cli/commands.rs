//! CLI command definitions and handlers

use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::core::client::InferenceGateway;
use crate::core::config::ProxyConfig;
use crate::core::models::TokenizationOutput;
use crate::session::backend::HttpBackend;
use crate::session::controller::{ActionKind, ClientSession, SessionController};

/// Proxy address the client commands talk to by default
const DEFAULT_BACKEND: &str = "http://localhost:5000";

/// Commands for the Chinese text proxy
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP API server
    Serve {
        /// Bind address (default: 0.0.0.0)
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Listen port (default: PORT env var, then 5000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Translate Chinese text to English through a running proxy
    Translate {
        /// Chinese text
        text: String,

        /// Proxy base URL
        #[arg(short, long, default_value = DEFAULT_BACKEND)]
        backend: String,
    },

    /// Tokenize Chinese text through a running proxy
    Tokenize {
        /// Chinese text
        text: String,

        /// Proxy base URL
        #[arg(short, long, default_value = DEFAULT_BACKEND)]
        backend: String,
    },

    /// Tokenize and translate at the same time
    Process {
        /// Chinese text
        text: String,

        /// Proxy base URL
        #[arg(short, long, default_value = DEFAULT_BACKEND)]
        backend: String,
    },
}

/// Handle server command
pub async fn handle_serve(host: String, port: Option<u16>) -> anyhow::Result<()> {
    use crate::server::api::run_server;

    let config = ProxyConfig::from_env()?;
    let port = port.unwrap_or(config.port);
    let gateway = InferenceGateway::new(config)?;

    info!("Starting HTTP server on {}:{}", host, port);
    println!("🚀 Server starting on http://{}:{}", host, port);
    println!("📄 OpenAPI document: http://{}:{}/api/openapi.json", host, port);

    run_server(host, port, gateway).await?;

    Ok(())
}

/// Run `action` with a spinner showing while it is loading
async fn with_spinner<F: Future>(action: F) -> F::Output {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Processing...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let output = action.await;
    pb.finish_and_clear();
    output
}

fn controller_for(backend: &str, text: String) -> SessionController {
    let controller = SessionController::new(Arc::new(HttpBackend::with_base(backend)));
    controller.set_input(text);
    controller
}

/// Handle the client commands
pub async fn handle_client(action: ClientAction, text: String, backend: String) -> anyhow::Result<()> {
    let controller = controller_for(&backend, text);

    match action {
        ClientAction::Tokenize => {
            with_spinner(controller.tokenize()).await;
        }
        ClientAction::Translate => {
            with_spinner(controller.translate()).await;
        }
        ClientAction::Both => {
            with_spinner(async { tokio::join!(controller.tokenize(), controller.translate()) })
                .await;
        }
    }

    let session = controller.snapshot();
    render(&session)?;

    if session.errors().is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} action(s) failed", session.errors().len())
    }
}

/// Which client actions a command runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAction {
    Tokenize,
    Translate,
    Both,
}

/// Print the session the way the result cards show it
fn render(session: &ClientSession) -> anyhow::Result<()> {
    for (kind, message) in session.errors() {
        eprintln!("❌ [{}] {}", kind, message);
    }

    if let Some(result) = &session.tokenization_result {
        println!("\n📝 Tokenization Result ({})", result.mode);
        match &result.output {
            TokenizationOutput::Tokens { tokens, ids } => {
                println!("Tokens:\n{}", serde_json::to_string_pretty(tokens)?);
                println!("Token IDs:\n{}", serde_json::to_string_pretty(ids)?);
            }
            TokenizationOutput::Raw { result } => {
                println!("Result:\n{}", serde_json::to_string_pretty(result)?);
            }
        }
    }

    if let Some(result) = &session.translation_result {
        println!("\n✅ English Translation:\n{}", result.translation_text);
    }

    if let Some(at) = [ActionKind::Tokenize, ActionKind::Translate]
        .into_iter()
        .filter_map(|kind| session.action(kind).completed_at)
        .max()
    {
        info!("Last action completed at {}", at.to_rfc3339());
    }

    Ok(())
}
