use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use facility_geocoder::{init_tracing, run_batch, AppConfig, RunOptions};

/// Geocode the facility dataset, resuming from the last checkpoint.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Raw facility CSV
    #[arg(long)]
    input: Option<PathBuf>,

    /// Geocoded CSV, rewritten after every record
    #[arg(long)]
    output: Option<PathBuf>,

    /// Query cache JSON
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Checkpoint JSON
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Fall back to city centroids when no query resolves
    #[arg(long)]
    city_fallback: bool,

    /// Ignore any existing checkpoint
    #[arg(long)]
    restart: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = AppConfig::from_env();
    if let Some(input) = args.input {
        config.input_file = input;
    }
    if let Some(output) = args.output {
        config.output_file = output;
    }
    if let Some(cache) = args.cache {
        config.cache_file = cache;
    }
    if let Some(checkpoint) = args.checkpoint {
        config.checkpoint_file = checkpoint;
    }
    config.city_fallback_enabled |= args.city_fallback;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current record");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let summary = run_batch(
        &config,
        RunOptions {
            restart: args.restart,
        },
        cancel,
    )
    .await
    .context("geocoding run failed")?;

    info!(
        total = summary.total,
        resolved = summary.resolved,
        city_level = summary.city_level,
        failed = summary.failed,
        skipped = summary.skipped,
        interrupted = summary.interrupted,
        "done"
    );
    Ok(())
}
