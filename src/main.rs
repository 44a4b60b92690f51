use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use row_pipeline::{
    cache::{DistributedCache, InMemoryCache},
    config::Config,
    ingest::Ingestor,
    rules::RuleSet,
};

const READ_BUFFER_SIZE: usize = 1024 * 1024;

#[derive(Parser)]
#[command(name = "row-pipeline")]
#[command(version = "0.1.0")]
#[command(about = "Validates large delimited files row by row and stores the results")]
#[command(long_about = None)]
struct Cli {
    /// Input file to validate
    #[arg(default_value = "data/accepted_2007_to_2018Q4.csv")]
    input: String,

    /// Configuration file path [default: $CONFIG_FILE or config.toml]
    #[arg(short, long)]
    config: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Maximum rows validated at once (overrides config file)
    #[arg(short, long, value_name = "N")]
    pool_size: Option<usize>,

    /// Write a JSON snapshot of the store to this path when done
    #[arg(long, value_name = "PATH")]
    dump: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("row_pipeline={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting row-pipeline v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load_from_file(path)?;
            info!("Configuration loaded from: {}", path);
            config
        }
        None => Config::load()?,
    };

    if let Some(pool_size) = cli.pool_size {
        config.pipeline.validator_pool_size = pool_size;
        config.validate()?;
    }

    let rules = RuleSet::from_names(&config.rules.enabled)?;
    info!("Active rules: {:?}", rules.names());

    let file = File::open(&cli.input)
        .await
        .with_context(|| format!("failed to open input file {}", cli.input))?;
    info!("Processing file: {}", cli.input);

    let cache = Arc::new(InMemoryCache::new());
    let mut ingestor = Ingestor::new(&config, cache.clone(), rules);
    let run = ingestor
        .run(BufReader::with_capacity(READ_BUFFER_SIZE, file))
        .await;
    // drain whatever was submitted even when reading stopped early
    let summary = ingestor.shutdown().await;
    run.with_context(|| format!("failed while reading {}", cli.input))?;

    info!(
        "Total rows: {} ({} valid, {} invalid) in {:?}",
        summary.rows_read, summary.rows_valid, summary.rows_invalid, summary.elapsed
    );
    if let Some(avg) = summary.avg_interval_ms {
        info!(
            "Average time per {} rows: {}ms",
            config.pipeline.progress_interval, avg
        );
    }

    if let Some(path) = cli.dump {
        let snapshot = cache.snapshot().await;
        let contents = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("failed to write store snapshot to {}", path))?;
        info!("Store snapshot written to: {} ({} keys)", path, snapshot.len());
    }

    cache.close().await;
    Ok(())
}
