//! Main entry point for the Chinese text proxy CLI

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hanyu_proxy::cli::commands::{self, ClientAction, Commands};

/// Chinese text proxy - translation and tokenization through Hugging Face
#[derive(Parser, Debug)]
#[command(name = "hanyu-proxy", version, about, long_about = None)]
struct Args {
    /// Hugging Face API key (optional, defaults to HUGGING_FACE_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hanyu_proxy={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Override config with CLI args if provided
    if let Some(api_key) = args.api_key {
        std::env::set_var("HUGGING_FACE_API_KEY", api_key);
    }

    // Execute command
    match args.command {
        Some(Commands::Serve { host, port }) => {
            commands::handle_serve(host, port).await?;
        }
        Some(Commands::Translate { text, backend }) => {
            commands::handle_client(ClientAction::Translate, text, backend).await?;
        }
        Some(Commands::Tokenize { text, backend }) => {
            commands::handle_client(ClientAction::Tokenize, text, backend).await?;
        }
        Some(Commands::Process { text, backend }) => {
            commands::handle_client(ClientAction::Both, text, backend).await?;
        }
        None => {
            println!("Please specify a command. Use --help for more information.");
        }
    }

    Ok(())
}
