//! Periodic data collection: provider forecasts and METAR observations.
//!
//! The caller owns the cadence (hourly observations, six-hourly forecasts);
//! one invocation walks every configured provider/city combination
//! sequentially. A failure for one combination is logged and skipped, the
//! next scheduled run provides at-least-once delivery. No retries or
//! backoff here.

use crate::classifier::{classify_cloud_cover, classify_metar_text, estimate_precipitation_mm};
use crate::config::{render_url, CityConfig, Config, ProviderConfig};
use crate::model::{ActualObservation, WeatherCategory};
use crate::parser::ParserRegistry;
use crate::storage::Storage;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const RECEIPT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Synchronous-looking HTTP boundary; the surrounding client owns timeouts.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Default)]
pub struct ReqwestFetcher {
    http: Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<String> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {url}"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {url}"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "Request to {url} failed with status {status}: {}",
                truncate_body(&body),
            ));
        }

        Ok(body)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// City name to provider-assigned location key. Populated lazily, never
/// evicted; bounded by the number of configured cities. Passed in explicitly
/// so tests can inject a fresh instance.
#[derive(Debug, Default)]
pub struct LocationKeyCache {
    keys: Mutex<HashMap<String, String>>,
}

impl LocationKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, city: &str) -> Option<String> {
        self.lock().get(city).cloned()
    }

    pub fn insert(&self, city: String, key: String) {
        self.lock().insert(city, key);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.keys.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// One METAR report as served by the aviation-weather API.
#[derive(Debug, Deserialize)]
struct MetarReport {
    #[serde(rename = "icaoId")]
    icao_id: String,
    #[serde(rename = "receiptTime")]
    receipt_time: String,
    temp: Option<f64>,
    #[serde(rename = "wxString", default)]
    wx_string: Option<String>,
    #[serde(rename = "rawOb", default)]
    raw_ob: Option<String>,
}

/// Fetches raw payloads and feeds them through the parsers into storage.
pub struct DataCollector<'a, S: Storage> {
    config: Config,
    registry: ParserRegistry,
    fetcher: Arc<dyn HttpFetch>,
    storage: &'a S,
    location_keys: Arc<LocationKeyCache>,
}

impl<'a, S: Storage> DataCollector<'a, S> {
    pub fn new(
        config: Config,
        registry: ParserRegistry,
        fetcher: Arc<dyn HttpFetch>,
        storage: &'a S,
        location_keys: Arc<LocationKeyCache>,
    ) -> Self {
        Self {
            config,
            registry,
            fetcher,
            storage,
            location_keys,
        }
    }

    /// Fetch and persist forecasts for every provider/city combination.
    ///
    /// Returns the number of forecast records saved. A failed combination
    /// is logged and skipped; only storage failures abort the run.
    pub async fn collect_forecasts(&self) -> Result<usize> {
        tracing::info!("Fetching weather forecasts...");
        let mut saved = 0;

        for provider in &self.config.providers {
            tracing::info!("Processing provider: {}", provider.name);

            let Some(parser) = self.registry.get(&provider.name) else {
                tracing::warn!("No parser configured for provider: {}", provider.name);
                continue;
            };

            for city in &self.config.cities {
                let url = match self.forecast_url(provider, city).await {
                    Ok(url) => url,
                    Err(e) => {
                        tracing::error!(
                            "Could not build forecast URL for {} from {}: {e}",
                            city.name,
                            provider.name
                        );
                        continue;
                    }
                };

                tracing::info!("Fetching forecast for {} from {}", city.name, provider.name);

                let payload = match self.fetcher.get(&url).await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::error!(
                            "Error fetching forecast for {} from {}: {e}",
                            city.name,
                            provider.name
                        );
                        continue;
                    }
                };

                let fetch_timestamp = Utc::now();
                let forecasts = parser.parse(&city.name, &payload, fetch_timestamp);

                if forecasts.is_empty() {
                    tracing::warn!(
                        "No forecast data parsed for {} from {}",
                        city.name,
                        provider.name
                    );
                    continue;
                }

                let count = forecasts.len();
                self.storage.save_forecasts(forecasts)?;
                tracing::info!(
                    "Saved {count} forecast entries for {} from {}",
                    city.name,
                    provider.name
                );
                saved += count;
            }
        }

        tracing::info!("Forecast fetching completed");
        Ok(saved)
    }

    /// Fetch and persist one round of METAR observations for all cities.
    ///
    /// Returns the number of observations saved. Stations that cannot be
    /// mapped back to a configured city, and malformed reports, are logged
    /// and skipped.
    pub async fn collect_observations(&self) -> Result<usize> {
        tracing::info!("Fetching actual weather...");

        let Some(source) = &self.config.observation_source else {
            tracing::warn!("No observation source configured; nothing to fetch");
            return Ok(0);
        };

        let icao_codes: Vec<&str> = self
            .config
            .cities
            .iter()
            .map(|c| c.icao_code.as_str())
            .collect();
        if icao_codes.is_empty() {
            tracing::warn!("No cities configured; nothing to fetch");
            return Ok(0);
        }

        let mut extra = HashMap::new();
        extra.insert("icao_codes", icao_codes.join(","));
        let url = render_url(&source.url, None, None, &extra)?;

        let body = self.fetcher.get(&url).await?;

        let reports: Vec<Value> =
            serde_json::from_str(&body).context("Failed to parse METAR response as a JSON array")?;

        let mut observations = Vec::new();

        for report in reports {
            let report: MetarReport = match serde_json::from_value(report) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Skipping malformed METAR report: {e}");
                    continue;
                }
            };

            let Some(city) = self.config.city_by_icao(&report.icao_id) else {
                tracing::warn!("City not found for ICAO code: {}", report.icao_id);
                continue;
            };

            let measurement_timestamp =
                match NaiveDateTime::parse_from_str(&report.receipt_time, RECEIPT_TIME_FORMAT) {
                    Ok(dt) => dt.and_utc(),
                    Err(e) => {
                        tracing::warn!(
                            "Bad receiptTime '{}' for {}: {e}",
                            report.receipt_time,
                            report.icao_id
                        );
                        continue;
                    }
                };

            let wx_string = report.wx_string.as_deref().unwrap_or("");
            let mut weather = classify_metar_text(wx_string);
            if weather == WeatherCategory::Clear {
                weather = classify_cloud_cover(report.raw_ob.as_deref().unwrap_or(""));
            }
            let precipitation = estimate_precipitation_mm(wx_string);

            tracing::info!(
                "Collected actual weather for {}: {:?}°C, {weather:?}",
                city.name,
                report.temp
            );

            observations.push(ActualObservation {
                city: city.name.clone(),
                measurement_timestamp,
                actual_temperature: report.temp,
                actual_precipitation: Some(precipitation),
                weather: Some(weather),
            });
        }

        let count = observations.len();
        self.storage.save_observations(observations)?;
        tracing::info!("Saved {count} actual weather observations");
        Ok(count)
    }

    /// Build the forecast URL for one provider/city pair, resolving the
    /// location key first for two-step providers.
    async fn forecast_url(&self, provider: &ProviderConfig, city: &CityConfig) -> Result<String> {
        let mut extra = HashMap::new();

        if provider.location_url.is_some() {
            let key = self.location_key(provider, city).await?;
            extra.insert("locationKey", key);
        }

        Ok(render_url(&provider.url, Some(city), Some(provider), &extra)?)
    }

    /// Resolve a provider-assigned location key for a city, consulting the
    /// shared cache first.
    async fn location_key(&self, provider: &ProviderConfig, city: &CityConfig) -> Result<String> {
        if let Some(key) = self.location_keys.get(&city.name) {
            tracing::info!("Found location key for {} in cache.", city.name);
            return Ok(key);
        }

        let template = provider
            .location_url
            .as_ref()
            .ok_or_else(|| anyhow!("Provider {} has no location URL", provider.name))?;
        let url = render_url(template, Some(city), Some(provider), &HashMap::new())?;

        let body = self.fetcher.get(&url).await?;
        let response: Value =
            serde_json::from_str(&body).context("Failed to parse location response JSON")?;

        // The response is usually an array; take the first result's "Key".
        // Sometimes it is a bare object.
        let key = response
            .get(0)
            .and_then(|first| first.get("Key"))
            .or_else(|| response.get("Key"))
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Location response did not contain a 'Key' field"))?
            .to_string();

        tracing::info!("Location key for {} is {key}", city.name);
        self.location_keys.insert(city.name.clone(), key.clone());
        Ok(key)
    }
}
