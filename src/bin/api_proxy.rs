use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use expense_enricher::{AppState, EnricherConfig, telemetry, web};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Weather-by-city and GitHub profile lookups over HTTP",
    long_about = None
)]
struct Cli {
    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = EnricherConfig::load_from_path(cli.config)?;
    telemetry::init_tracing(&config.logging);

    let state = AppState::from_config(&config)?;
    let host = cli.host.unwrap_or_else(|| config.proxy.host.clone());
    let port = cli.port.unwrap_or(config.proxy.port);

    web::run(state, &host, port).await
}
