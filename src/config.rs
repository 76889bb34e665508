use std::path::PathBuf;
use std::time::Duration;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

use crate::resolver::BoundingBox;
use crate::retry::RetryPolicy;

const DEFAULT_JOURNAL_MAX_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_JOURNAL_MAX_FILES: usize = 5;
const MIN_QUERY_DELAY_MS: u64 = 1_000;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub cache_file: PathBuf,
    pub checkpoint_file: PathBuf,
    pub journal_file: PathBuf,
    pub geocoder_endpoint: String,
    pub geocoder_user_agent: String,
    pub geocoder_api_key: Option<SecretString>,
    pub geocoder_timeout_secs: u64,
    pub country: String,
    pub country_code: String,
    pub max_attempts: u32,
    pub backoff_step_ms: u64,
    pub service_cooldown_ms: u64,
    pub query_delay_ms: u64,
    pub record_delay_ms: u64,
    pub bounds: BoundingBox,
    pub city_fallback_enabled: bool,
    pub journal_enabled: bool,
    pub journal_max_bytes: u64,
    pub journal_max_files: usize,
}

/// Loggable view of the configuration; never carries the API key.
#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub input_file: String,
    pub output_file: String,
    pub cache_file: String,
    pub checkpoint_file: String,
    pub geocoder_endpoint: String,
    pub country: String,
    pub max_attempts: u32,
    pub query_delay_ms: u64,
    pub record_delay_ms: u64,
    pub bounds: BoundingBox,
    pub city_fallback_enabled: bool,
    pub has_geocoder_api_key: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            input_file: parse_path("GEOCODE_INPUT_FILE", "data/facilities_raw.csv"),
            output_file: parse_path("GEOCODE_OUTPUT_FILE", "data/facilities_geocoded.csv"),
            cache_file: parse_path("GEOCODE_CACHE_FILE", "data/geocode_cache.json"),
            checkpoint_file: parse_path("GEOCODE_CHECKPOINT_FILE", "data/geocode_checkpoint.json"),
            journal_file: parse_path("GEOCODE_JOURNAL_FILE", "data/geocode-events.jsonl"),
            geocoder_endpoint: env::var("GEOCODER_ENDPOINT")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org/search".to_string()),
            geocoder_user_agent: env::var("GEOCODER_USER_AGENT").unwrap_or_else(|_| {
                "hpa_geographic_mapping (contact: admin@hpa.local)".to_string()
            }),
            geocoder_api_key: env::var("GEOCODER_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
            geocoder_timeout_secs: parse_u64("GEOCODER_TIMEOUT_SECS", 15).max(1),
            country: env::var("GEOCODE_COUNTRY").unwrap_or_else(|_| "Zimbabwe".to_string()),
            country_code: env::var("GEOCODE_COUNTRY_CODE").unwrap_or_else(|_| "zw".to_string()),
            max_attempts: parse_u32("GEOCODE_MAX_ATTEMPTS", 3).max(1),
            backoff_step_ms: parse_u64("GEOCODE_BACKOFF_STEP_MS", 3_000),
            service_cooldown_ms: parse_u64("GEOCODE_SERVICE_COOLDOWN_MS", 5_000),
            query_delay_ms: parse_u64("GEOCODE_QUERY_DELAY_MS", MIN_QUERY_DELAY_MS)
                .max(MIN_QUERY_DELAY_MS),
            record_delay_ms: parse_u64("GEOCODE_RECORD_DELAY_MS", 1_500),
            bounds: BoundingBox {
                min_lat: parse_f64("GEOCODE_MIN_LAT", -22.5),
                max_lat: parse_f64("GEOCODE_MAX_LAT", -15.0),
                min_lon: parse_f64("GEOCODE_MIN_LON", 25.0),
                max_lon: parse_f64("GEOCODE_MAX_LON", 34.0),
            },
            city_fallback_enabled: parse_bool("GEOCODE_CITY_FALLBACK", false),
            journal_enabled: parse_bool("JOURNAL_ENABLED", true),
            journal_max_bytes: parse_u64("JOURNAL_MAX_BYTES", DEFAULT_JOURNAL_MAX_BYTES),
            journal_max_files: parse_usize("JOURNAL_MAX_FILES", DEFAULT_JOURNAL_MAX_FILES).max(1),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_step: Duration::from_millis(self.backoff_step_ms),
            service_cooldown: Duration::from_millis(self.service_cooldown_ms),
        }
    }

    pub fn query_delay(&self) -> Duration {
        Duration::from_millis(self.query_delay_ms)
    }

    pub fn record_delay(&self) -> Duration {
        Duration::from_millis(self.record_delay_ms)
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            input_file: self.input_file.display().to_string(),
            output_file: self.output_file.display().to_string(),
            cache_file: self.cache_file.display().to_string(),
            checkpoint_file: self.checkpoint_file.display().to_string(),
            geocoder_endpoint: self.geocoder_endpoint.clone(),
            country: self.country.clone(),
            max_attempts: self.max_attempts,
            query_delay_ms: self.query_delay_ms,
            record_delay_ms: self.record_delay_ms,
            bounds: self.bounds,
            city_fallback_enabled: self.city_fallback_enabled,
            has_geocoder_api_key: self.geocoder_api_key.is_some(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_path(key: &str, default: &str) -> PathBuf {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn parse_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}
