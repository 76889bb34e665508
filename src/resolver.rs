use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, CacheEntry, GeocodeCache};
use crate::errors::AppResult;
use crate::provider::{GeocodeHit, GeocodeProvider};
use crate::retry::{RetryDecision, RetryPolicy, Sleeper};

const DEFAULT_QUERY_DELAY: Duration = Duration::from_secs(1);

/// Plausibility window for accepted coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for BoundingBox {
    // Zimbabwe, roughly.
    fn default() -> Self {
        Self {
            min_lat: -22.5,
            max_lat: -15.0,
            min_lon: 25.0,
            max_lon: 34.0,
        }
    }
}

impl BoundingBox {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lon..=self.max_lon).contains(&longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Cache,
    Provider,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved {
        latitude: f64,
        longitude: f64,
        query: String,
        source: ResolutionSource,
    },
    /// Every candidate was exhausted without a plausible coordinate.
    Failed,
}

/// Walks candidate queries against the cache and the provider.
pub struct GeocodeResolver {
    provider: Arc<dyn GeocodeProvider>,
    cache: Arc<dyn GeocodeCache>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    bounds: BoundingBox,
    query_delay: Duration,
    provider_calls: AtomicU64,
}

impl GeocodeResolver {
    pub fn new(
        provider: Arc<dyn GeocodeProvider>,
        cache: Arc<dyn GeocodeCache>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            provider,
            cache,
            sleeper,
            policy: RetryPolicy::default(),
            bounds: BoundingBox::default(),
            query_delay: DEFAULT_QUERY_DELAY,
            provider_calls: AtomicU64::new(0),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    /// Provider requests issued so far, retries included.
    pub fn provider_calls(&self) -> u64 {
        self.provider_calls.load(Ordering::Relaxed)
    }

    pub fn cache(&self) -> &dyn GeocodeCache {
        self.cache.as_ref()
    }

    /// Returns the first plausible coordinate across `candidates`.
    ///
    /// Provider failures never end the search early: timeouts, service
    /// errors, rejections, empty answers and out-of-bounds answers all move
    /// on to the next candidate. Only a failed cache write is an error.
    pub async fn resolve(&self, candidates: &[String]) -> AppResult<Resolution> {
        for query in candidates {
            let key = cache_key(query);
            if key.is_empty() {
                continue;
            }

            if let Some(entry) = self.cache.get(&key) {
                info!(query = query.as_str(), "cache hit");
                return Ok(Resolution::Resolved {
                    latitude: entry.latitude,
                    longitude: entry.longitude,
                    query: query.clone(),
                    source: ResolutionSource::Cache,
                });
            }

            let accepted = self.query_provider(query, &key).await?;
            self.sleeper.sleep(self.query_delay).await;

            if let Some(hit) = accepted {
                return Ok(Resolution::Resolved {
                    latitude: hit.latitude,
                    longitude: hit.longitude,
                    query: query.clone(),
                    source: ResolutionSource::Provider,
                });
            }
        }

        Ok(Resolution::Failed)
    }

    async fn query_provider(&self, query: &str, key: &str) -> AppResult<Option<GeocodeHit>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.provider_calls.fetch_add(1, Ordering::Relaxed);

            let err = match self.provider.geocode(query).await {
                Ok(Some(hit)) => return self.accept(query, key, hit),
                Ok(None) => {
                    debug!(query, "no match");
                    return Ok(None);
                }
                Err(err) => err,
            };

            match self.policy.classify(&err) {
                RetryDecision::Retry => {
                    let wait = self.policy.backoff(attempt);
                    warn!(query, attempt, ?wait, "geocoder timed out; backing off");
                    self.sleeper.sleep(wait).await;
                    if !self.policy.can_retry(attempt) {
                        warn!(
                            query,
                            attempts = attempt,
                            "giving up on query after repeated timeouts"
                        );
                        return Ok(None);
                    }
                }
                RetryDecision::AbandonCandidate => {
                    warn!(query, error = %err, "geocoder service error; skipping query");
                    self.sleeper.sleep(self.policy.service_cooldown).await;
                    return Ok(None);
                }
            }
        }
    }

    fn accept(&self, query: &str, key: &str, hit: GeocodeHit) -> AppResult<Option<GeocodeHit>> {
        if !self.bounds.contains(hit.latitude, hit.longitude) {
            info!(
                query,
                lat = hit.latitude,
                lon = hit.longitude,
                display = hit.display_name.as_deref().unwrap_or_default(),
                "result outside bounding box; discarded"
            );
            return Ok(None);
        }

        self.cache.put(
            key,
            CacheEntry {
                latitude: hit.latitude,
                longitude: hit.longitude,
                display_name: hit.display_name.clone(),
            },
        )?;
        Ok(Some(hit))
    }
}
