use anyhow::{Context, Result};
use clap::Parser;
use std::net::Ipv4Addr;
use std::sync::Arc;
use student_api::{api, config, logging, store::StudentStore, summary::OllamaSummaryClient};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "student-api", about = "Student records API with streamed profile summaries")]
struct Cli {
    /// Port to listen on (overrides `SERVER_PORT`).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config();
    logging::init_tracing();
    tracing::debug!(
        server_port = config.server_port,
        ollama_url = %config.ollama_url,
        model = %config.generation.model,
        timeout_secs = config.generation.timeout.as_secs(),
        "Loaded configuration"
    );

    let summarizer = OllamaSummaryClient::from_config(config)
        .context("failed to construct HTTP client for the generation service")?;
    let app = api::create_router(Arc::new(StudentStore::new()), Arc::new(summarizer));

    let port = cli.port.unwrap_or(config.server_port);
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    tracing::info!(
        ollama_url = %config.ollama_url,
        model = %config.generation.model,
        "Listening on http://0.0.0.0:{}",
        port
    );

    axum::serve(listener, app)
        .await
        .context("HTTP server terminated unexpectedly")
}
