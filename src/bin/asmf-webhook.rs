// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! asmf webhook server
//!
//! Receives GitHub pull request webhooks and posts Ollama reviews.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use asmf::config::AppConfig;
use asmf::review::OllamaReviewer;
use asmf::{AsmfError, Result};

#[derive(Parser, Debug)]
#[command(name = "asmf-webhook")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "GitHub webhook server for automated PR reviews")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("asmf webhook server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(&args.config)?;
    if let Some(host) = args.host {
        config.webhook.host = host;
    }
    if let Some(port) = args.port {
        config.webhook.port = port;
    }

    if config.webhook.github_token.is_none() {
        error!("GITHUB_TOKEN environment variable is required");
        return Err(AsmfError::Config("GITHUB_TOKEN environment variable is required".to_string()));
    }

    let reviewer = OllamaReviewer::from_config(&config)?;
    info!("Review model: {}", reviewer.model());

    asmf::web::start_server(&config, Arc::new(reviewer)).await
}
