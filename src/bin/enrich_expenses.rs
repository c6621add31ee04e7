use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use expense_enricher::{
    EnricherConfig, EnrichmentPipeline, ExchangeRateClient, OpenMeteoClient, http, records,
    telemetry,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Enrich expense records with coordinates, current weather and a USD conversion",
    long_about = None
)]
struct Cli {
    /// Input CSV with city, country_code, local_currency and amount columns
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output CSV path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seconds to wait after each record
    #[arg(long)]
    sleep: Option<f64>,

    /// exchangerate.host access key; overrides config and FX_API_KEY
    #[arg(long)]
    fx_key: Option<String>,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = EnricherConfig::load_from_path(cli.config)?;
    telemetry::init_tracing(&config.logging);

    if let Some(input) = cli.input {
        config.batch.input = input;
    }
    if let Some(output) = cli.output {
        config.batch.output = output;
    }
    if let Some(sleep) = cli.sleep {
        config.batch.delay_seconds = sleep;
    }
    if let Some(key) = cli.fx_key.filter(|k| !k.trim().is_empty()) {
        config.batch.fx_api_key = Some(key);
    }
    let pacing_delay = config
        .batch
        .pacing_delay()
        .context("Invalid --sleep value")?;
    if config.batch.fx_api_key.is_none() {
        warn!("No FX access key configured; conversions may be rejected upstream");
    }

    let expenses = records::read_expenses(&config.batch.input)
        .with_context(|| format!("Failed to read expenses from {}", config.batch.input.display()))?;
    info!("Loaded {} expenses", expenses.len());

    let client = http::build_client(config.http.timeout(), config.http.max_retries)?;
    let open_meteo = OpenMeteoClient::new(client.clone(), &config.endpoints);
    let exchange = ExchangeRateClient::new(client, &config.endpoints, config.batch.fx_api_key.clone());

    let pipeline = EnrichmentPipeline::new(open_meteo.clone(), open_meteo, exchange)
        .with_pacing_delay(pacing_delay);
    let report = pipeline.run(&expenses).await;

    records::write_enriched(&config.batch.output, &report.records).with_context(|| {
        format!("Failed to write enriched data to {}", config.batch.output.display())
    })?;
    println!("Enriched data written to {}", config.batch.output.display());

    Ok(())
}
