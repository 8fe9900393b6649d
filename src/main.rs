use anyhow::{Context, Result};
use askdoc::{
    api::{self, AppState},
    config, logging,
    notification::SmtpMailer,
    summarization::GeminiClient,
};
use clap::Parser;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

/// AskDoc: summarize documents with Gemini and email the result.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Port to listen on (overrides `PORT`).
    #[arg(long)]
    port: Option<u16>,
    /// Directory for staged uploads (overrides `UPLOAD_DIR`).
    #[arg(long)]
    upload_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = config::load_config().context("failed to load configuration")?;
    logging::init_tracing();
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(upload_dir) = cli.upload_dir {
        config.upload_dir = upload_dir;
    }

    let summarizer = GeminiClient::new(
        config.gemini_base_url.clone(),
        config.google_api_key.clone(),
    )
    .context("failed to build Gemini client")?;
    let app = api::create_router(AppState {
        summarizer: Arc::new(summarizer),
        mailer: Arc::new(SmtpMailer::new(config.smtp.clone())),
        upload_dir: config.upload_dir.clone(),
    });

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "AskDoc running at http://localhost:{}", config.port);
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated unexpectedly")?;
    Ok(())
}
