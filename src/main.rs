mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use range_httpd::config::DEFAULT_LOG_FILTER;
use range_httpd::FileServer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let config = cli.into_config(cwd);
    tracing::debug!(?config, "starting");

    FileServer::new(config).serve().await?;
    Ok(())
}
