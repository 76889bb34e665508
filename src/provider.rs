use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::trace;

use crate::config::AppConfig;
use crate::errors::AppResult;

/// A single coordinate returned by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: Option<String>,
}

/// Failure modes a provider must keep apart. "No match" is not an error; it
/// is `Ok(None)`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("geocoding request timed out")]
    TimedOut,
    #[error("geocoding service error: {0}")]
    Service(String),
    #[error("geocoding request rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Option<GeocodeHit>, ProviderError>;
}

/// Client for a Nominatim-compatible `/search` endpoint.
pub struct NominatimClient {
    http: reqwest::Client,
    endpoint: String,
    country_code: String,
    api_key: Option<SecretString>,
}

impl NominatimClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.geocoder_user_agent.as_str())
            .timeout(Duration::from_secs(config.geocoder_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.geocoder_endpoint.clone(),
            country_code: config.country_code.clone(),
            api_key: config.geocoder_api_key.clone(),
        })
    }
}

#[derive(Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

#[async_trait]
impl GeocodeProvider for NominatimClient {
    async fn geocode(&self, query: &str) -> Result<Option<GeocodeHit>, ProviderError> {
        let mut request = self.http.get(&self.endpoint).query(&[
            ("q", query),
            ("format", "jsonv2"),
            ("limit", "1"),
        ]);
        if !self.country_code.trim().is_empty() {
            request = request.query(&[("countrycodes", self.country_code.as_str())]);
        }
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.expose_secret())]);
        }

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProviderError::Rejected(status.to_string()));
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                return Err(ProviderError::TimedOut);
            }
            _ if !status.is_success() => {
                return Err(ProviderError::Service(status.to_string()));
            }
            _ => {}
        }

        let results: Vec<SearchResult> = response.json().await.map_err(classify_transport)?;
        let Some(first) = results.into_iter().next() else {
            trace!(query, "provider returned no candidates");
            return Ok(None);
        };

        let latitude = parse_coordinate(&first.lat)?;
        let longitude = parse_coordinate(&first.lon)?;
        Ok(Some(GeocodeHit {
            latitude,
            longitude,
            display_name: first.display_name,
        }))
    }
}

fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::TimedOut
    } else {
        ProviderError::Service(err.to_string())
    }
}

fn parse_coordinate(value: &str) -> Result<f64, ProviderError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProviderError::Service(format!("malformed coordinate: {value}")))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};

    use parking_lot::Mutex;

    use super::*;

    type Scripted = Result<Option<GeocodeHit>, ProviderError>;

    /// Replays canned responses per query; unscripted queries find nothing.
    #[derive(Default)]
    pub struct ScriptedProvider {
        responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(self, query: &str, result: Scripted) -> Self {
            self.responses
                .lock()
                .entry(query.to_string())
                .or_default()
                .push_back(result);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    pub fn hit(latitude: f64, longitude: f64) -> Scripted {
        Ok(Some(GeocodeHit {
            latitude,
            longitude,
            display_name: None,
        }))
    }

    #[async_trait]
    impl GeocodeProvider for ScriptedProvider {
        async fn geocode(&self, query: &str) -> Result<Option<GeocodeHit>, ProviderError> {
            self.calls.lock().push(query.to_string());
            self.responses
                .lock()
                .get_mut(query)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Ok(None))
        }
    }
}
