pub mod cache;
pub mod checkpoint;
pub mod config;
pub mod correct;
pub mod dataset;
pub mod driver;
pub mod errors;
pub mod fallback;
pub mod journal;
pub mod normalize;
pub mod persist;
pub mod provider;
pub mod query;
pub mod reference;
pub mod resolver;
pub mod retry;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use cache::{cache_key, CacheEntry, GeocodeCache, JsonFileCache, MemoryCache};
pub use checkpoint::{resume_offset, CheckpointStore, FileCheckpoint, MemoryCheckpoint};
pub use config::{AppConfig, PublicAppConfig};
pub use correct::{correct_streets, match_city, similarity};
pub use dataset::{
    load_working_dataset, CsvFileSink, Dataset, DatasetSink, FacilityRecord, GeocodeStatus,
};
pub use driver::{BatchDriver, BatchSummary};
pub use errors::{AppError, AppResult};
pub use fallback::{CityCentroidFallback, FallbackStrategy};
pub use journal::{JournalEvent, RunJournal};
pub use normalize::normalize_address;
pub use provider::{GeocodeHit, GeocodeProvider, NominatimClient, ProviderError};
pub use query::{build_queries, QueryPlan};
pub use resolver::{BoundingBox, GeocodeResolver, Resolution, ResolutionSource};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,facility_geocoder=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Discard any checkpoint and start over from the input file.
    pub restart: bool,
}

/// Wires file-backed stores and the HTTP provider from `config` and runs
/// one batch.
pub async fn run_batch(
    config: &AppConfig,
    options: RunOptions,
    cancel: Arc<AtomicBool>,
) -> AppResult<BatchSummary> {
    let provider = Arc::new(NominatimClient::new(config)?);
    run_batch_with(config, options, cancel, provider, Arc::new(TokioSleeper)).await
}

/// Same as [`run_batch`] with the provider and sleeper supplied by the caller.
pub async fn run_batch_with(
    config: &AppConfig,
    options: RunOptions,
    cancel: Arc<AtomicBool>,
    provider: Arc<dyn GeocodeProvider>,
    sleeper: Arc<dyn Sleeper>,
) -> AppResult<BatchSummary> {
    info!(config = ?config.public_profile(), "geocoding configuration");

    let checkpoint = Arc::new(FileCheckpoint::new(&config.checkpoint_file));
    if options.restart && checkpoint.exists() {
        warn!(path = %checkpoint.path().display(), "restart requested; discarding checkpoint");
        checkpoint.clear()?;
    }
    let resuming = checkpoint.load()?.is_some();
    let mut dataset = load_working_dataset(&config.input_file, &config.output_file, resuming)?;

    let cache = Arc::new(JsonFileCache::open(&config.cache_file)?);
    let resolver = GeocodeResolver::new(provider, cache, sleeper.clone())
        .with_policy(config.retry_policy())
        .with_bounds(config.bounds)
        .with_query_delay(config.query_delay());

    let mut driver = BatchDriver::new(
        resolver,
        checkpoint,
        Arc::new(CsvFileSink::new(&config.output_file)),
        sleeper,
    )
    .with_journal(RunJournal::open(config)?)
    .with_country(config.country.clone())
    .with_record_delay(config.record_delay())
    .with_cancel_flag(cancel);
    if config.city_fallback_enabled {
        driver = driver.with_fallback(Arc::new(CityCentroidFallback::new()));
    }

    driver.run(&mut dataset).await
}
