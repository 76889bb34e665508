use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::checkpoint::{resume_offset, CheckpointStore};
use crate::dataset::{Dataset, DatasetSink, FacilityRecord, GeocodeStatus};
use crate::errors::AppResult;
use crate::fallback::FallbackStrategy;
use crate::journal::{JournalEvent, RunJournal};
use crate::query::build_queries;
use crate::resolver::{GeocodeResolver, Resolution, ResolutionSource};
use crate::retry::Sleeper;

const DEFAULT_RECORD_DELAY: Duration = Duration::from_millis(1_500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchPhase {
    Resuming,
    Processing,
    Persisting,
    Done,
}

/// Counts for one invocation of [`BatchDriver::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub start_index: usize,
    pub resolved: usize,
    pub city_level: usize,
    pub failed: usize,
    /// Already resolved before this run.
    pub skipped: usize,
    pub cache_hits: usize,
    pub provider_calls: u64,
    pub interrupted: bool,
}

/// Walks the dataset in order, resolving every record that still lacks
/// coordinates. Output is rewritten after each record and only then is
/// the checkpoint advanced.
///
/// One driver per output file: nothing guards against two processes
/// sharing the same cache, output or checkpoint.
pub struct BatchDriver {
    resolver: GeocodeResolver,
    checkpoint: Arc<dyn CheckpointStore>,
    sink: Arc<dyn DatasetSink>,
    sleeper: Arc<dyn Sleeper>,
    journal: RunJournal,
    fallback: Option<Arc<dyn FallbackStrategy>>,
    country: String,
    record_delay: Duration,
    cancel: Arc<AtomicBool>,
}

impl BatchDriver {
    pub fn new(
        resolver: GeocodeResolver,
        checkpoint: Arc<dyn CheckpointStore>,
        sink: Arc<dyn DatasetSink>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            resolver,
            checkpoint,
            sink,
            sleeper,
            journal: RunJournal::disabled(),
            fallback: None,
            country: "Zimbabwe".to_string(),
            record_delay: DEFAULT_RECORD_DELAY,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_journal(mut self, journal: RunJournal) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackStrategy>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    pub fn with_record_delay(mut self, delay: Duration) -> Self {
        self.record_delay = delay;
        self
    }

    /// Flag checked between records; once set the run stops with the
    /// checkpoint left in place.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(&self, dataset: &mut Dataset) -> AppResult<BatchSummary> {
        let start_index = resume_offset(self.checkpoint.load()?);
        let mut summary = BatchSummary {
            total: dataset.len(),
            start_index,
            ..BatchSummary::default()
        };
        log_phase(BatchPhase::Resuming);
        info!(start_index, total = summary.total, "starting geocoding run");
        self.journal.record(&JournalEvent::RunStarted {
            total: summary.total,
            start_index,
        })?;

        // Every checkpoint saved below must point at a persisted output.
        self.sink.write(dataset)?;

        log_phase(BatchPhase::Processing);
        let calls_before = self.resolver.provider_calls();
        for index in start_index..dataset.len() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(index, "run interrupted; checkpoint kept for resume");
                summary.interrupted = true;
                break;
            }
            self.process_record(index, dataset, &mut summary).await?;
        }
        summary.provider_calls = self.resolver.provider_calls() - calls_before;

        if !summary.interrupted {
            log_phase(BatchPhase::Persisting);
            self.sink.write(dataset)?;
            self.checkpoint.clear()?;
        }

        log_phase(BatchPhase::Done);
        info!(
            resolved = summary.resolved,
            city_level = summary.city_level,
            failed = summary.failed,
            skipped = summary.skipped,
            cache_hits = summary.cache_hits,
            provider_calls = summary.provider_calls,
            cache_entries = self.resolver.cache().len(),
            interrupted = summary.interrupted,
            "geocoding run finished"
        );
        self.journal.record(&JournalEvent::RunCompleted {
            summary: summary.clone(),
        })?;
        Ok(summary)
    }

    async fn process_record(
        &self,
        index: usize,
        dataset: &mut Dataset,
        summary: &mut BatchSummary,
    ) -> AppResult<()> {
        let Some(record) = dataset.record(index) else {
            return Ok(());
        };

        if record.is_resolved() {
            debug!(index, facility = record.name.as_str(), "already resolved; skipping");
            summary.skipped += 1;
            return self.checkpoint.save(index);
        }

        info!(index, total = summary.total, facility = record.name.as_str(), "geocoding record");
        let plan = build_queries(
            &record.name,
            record.address.as_deref(),
            &record.city,
            &self.country,
        );
        let resolution = self.resolver.resolve(&plan.candidates).await?;
        let facility = record.name.clone();

        let event = match resolution {
            Resolution::Resolved {
                latitude,
                longitude,
                query,
                source,
            } => {
                summary.resolved += 1;
                if source == ResolutionSource::Cache {
                    summary.cache_hits += 1;
                }
                info!(
                    index,
                    query = query.as_str(),
                    lat = latitude,
                    lon = longitude,
                    "record resolved"
                );
                JournalEvent::RecordResolved {
                    index,
                    facility,
                    query,
                    latitude,
                    longitude,
                    source,
                }
            }
            Resolution::Failed => match self.locate_city(&plan.city) {
                Some((latitude, longitude)) => {
                    summary.city_level += 1;
                    info!(
                        index,
                        city = plan.city.as_str(),
                        lat = latitude,
                        lon = longitude,
                        "using city centroid"
                    );
                    JournalEvent::RecordCityLevel {
                        index,
                        facility,
                        city: plan.city.clone(),
                        latitude,
                        longitude,
                    }
                }
                None => {
                    summary.failed += 1;
                    warn!(index, facility = facility.as_str(), "no query resolved");
                    JournalEvent::RecordFailed { index, facility }
                }
            },
        };

        if let Some(record) = dataset.record_mut(index) {
            apply_outcome(record, &event);
        }
        self.sink.write(dataset)?;
        self.checkpoint.save(index)?;
        self.journal.record(&event)?;

        self.sleeper.sleep(self.record_delay).await;
        Ok(())
    }

    fn locate_city(&self, city: &str) -> Option<(f64, f64)> {
        self.fallback.as_ref().and_then(|fallback| fallback.locate(city))
    }
}

fn apply_outcome(record: &mut FacilityRecord, event: &JournalEvent) {
    match event {
        JournalEvent::RecordResolved {
            query,
            latitude,
            longitude,
            ..
        } => {
            record.set_coordinates(*latitude, *longitude);
            record.matched_query = Some(query.clone());
            record.status = Some(GeocodeStatus::Resolved);
        }
        JournalEvent::RecordCityLevel {
            latitude,
            longitude,
            ..
        } => {
            record.set_coordinates(*latitude, *longitude);
            record.matched_query = None;
            record.status = Some(GeocodeStatus::CityLevel);
        }
        JournalEvent::RecordFailed { .. } => {
            record.matched_query = None;
            record.status = Some(GeocodeStatus::Failed);
        }
        JournalEvent::RunStarted { .. } | JournalEvent::RunCompleted { .. } => {}
    }
}

fn log_phase(phase: BatchPhase) {
    debug!(?phase, "batch phase");
}
