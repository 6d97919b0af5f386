//! YR.NO (met.no locationforecast) parser.
//!
//! The payload is a time-series of instant samples. Samples are grouped by
//! UTC calendar date; every instantaneous temperature feeds the day's
//! min/max, while the day's representative weather comes from the
//! 12-hour-summary symbols observed at hour 0 (midnight) and hour 12 (noon),
//! picking the more severe of the two. Days without any temperature sample
//! are dropped.

use super::{ForecastParser, ProviderId};
use crate::model::{ForecastRecord, WeatherCategory};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Symbol severity ranking from calm conditions through escalating
/// precipitation and thunder combinations. Higher index is worse.
const SEVERITY_RANKING: [&str; 40] = [
    "clearsky",
    "fair",
    "partlycloudy",
    "cloudy",
    "fog",
    "lightrain",
    "rain",
    "heavyrain",
    "lightsnow",
    "snow",
    "heavysnow",
    "sleet",
    "heavysleet",
    "lightsleetshowers",
    "sleetshowers",
    "heavysleetshowers",
    "lightrainshowers",
    "rainshowers",
    "heavyrainshowers",
    "lightsnowshowers",
    "snowshowers",
    "heavysnowshowers",
    "lightrainshowersandthunder",
    "rainshowersandthunder",
    "heavyrainshowersandthunder",
    "lightsleetshowersandthunder",
    "sleetshowersandthunder",
    "heavysleetshowersandthunder",
    "lightsnowshowersandthunder",
    "snowshowersandthunder",
    "heavysnowshowersandthunder",
    "lightrainandthunder",
    "rainandthunder",
    "heavyrainandthunder",
    "lightsleetandthunder",
    "sleetandthunder",
    "heavysleetandthunder",
    "lightsnowandthunder",
    "snowandthunder",
    "heavysnowandthunder",
];

#[derive(Debug, Deserialize)]
struct YrSample {
    time: String,
    data: YrData,
}

#[derive(Debug, Deserialize)]
struct YrData {
    instant: YrInstant,
    #[serde(default)]
    next_12_hours: Option<YrNext12Hours>,
}

#[derive(Debug, Deserialize)]
struct YrInstant {
    details: YrInstantDetails,
}

#[derive(Debug, Deserialize)]
struct YrInstantDetails {
    air_temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct YrNext12Hours {
    #[serde(default)]
    summary: Option<YrSummary>,
}

#[derive(Debug, Deserialize)]
struct YrSummary {
    symbol_code: Option<String>,
}

#[derive(Debug, Default)]
struct DailySamples {
    temperatures: Vec<f64>,
    midnight_symbol: Option<String>,
    noon_symbol: Option<String>,
}

impl DailySamples {
    /// The more severe of the midnight and noon symbols, or whichever is
    /// present when the other is missing.
    fn representative_symbol(&self) -> Option<&str> {
        match (self.midnight_symbol.as_deref(), self.noon_symbol.as_deref()) {
            (None, None) => None,
            (Some(m), None) => Some(m),
            (None, Some(n)) => Some(n),
            (Some(m), Some(n)) => Some(worse_symbol(m, n)),
        }
    }
}

#[derive(Debug)]
pub struct YrNoParser;

impl ForecastParser for YrNoParser {
    fn provider_name(&self) -> &'static str {
        ProviderId::YrNo.as_str()
    }

    fn parse(
        &self,
        city: &str,
        raw_payload: &str,
        fetch_timestamp: DateTime<Utc>,
    ) -> Vec<ForecastRecord> {
        tracing::info!("Parsing YR.NO forecast for {city}");

        let root: Value = match serde_json::from_str(raw_payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Error parsing YR.NO response for {city}: {e}");
                return Vec::new();
            }
        };

        let Some(timeseries) = root
            .pointer("/properties/timeseries")
            .and_then(Value::as_array)
        else {
            tracing::error!(
                "Invalid YR.NO response format: missing 'properties.timeseries' array"
            );
            return Vec::new();
        };

        let mut daily: BTreeMap<NaiveDate, DailySamples> = BTreeMap::new();

        for entry in timeseries {
            let sample: YrSample = match serde_json::from_value(entry.clone()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("Error processing timeseries entry: {e}");
                    continue;
                }
            };

            let timestamp = match DateTime::parse_from_rfc3339(&sample.time) {
                Ok(ts) => ts,
                Err(e) => {
                    tracing::warn!("Bad timestamp '{}' in YR.NO entry: {e}", sample.time);
                    continue;
                }
            };

            let date = timestamp.with_timezone(&Utc).date_naive();
            let day = daily.entry(date).or_default();

            if let Some(temperature) = sample.data.instant.details.air_temperature {
                day.temperatures.push(temperature);
            }

            let symbol = sample
                .data
                .next_12_hours
                .and_then(|n| n.summary)
                .and_then(|s| s.symbol_code);
            if let Some(symbol) = symbol {
                // Hour 0 carries the midnight weather, hour 12 the noon
                // weather; other hours' 12-hour summaries are ignored.
                match timestamp.hour() {
                    0 => day.midnight_symbol = Some(normalize_symbol(&symbol)),
                    12 => day.noon_symbol = Some(normalize_symbol(&symbol)),
                    _ => {}
                }
            }
        }

        let mut forecasts = Vec::new();

        for (date, day) in daily {
            // Days without temperature samples are dropped entirely.
            if day.temperatures.is_empty() {
                continue;
            }

            let min_temp = day.temperatures.iter().copied().fold(f64::INFINITY, f64::min);
            let max_temp = day
                .temperatures
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);

            forecasts.push(ForecastRecord {
                id: None,
                provider_name: self.provider_name().to_string(),
                city: city.to_string(),
                fetch_timestamp,
                target_date: date,
                predicted_min_temp: Some(min_temp),
                predicted_max_temp: Some(max_temp),
                predicted_weather: Some(map_symbol(day.representative_symbol())),
            });
        }

        tracing::info!(
            "Successfully parsed {} daily forecasts for {city} from YR.NO",
            forecasts.len()
        );
        forecasts
    }
}

/// Strip the `_day`/`_night`/`_polartwilight` variant suffixes.
fn normalize_symbol(symbol: &str) -> String {
    symbol
        .replace("_day", "")
        .replace("_night", "")
        .replace("_polartwilight", "")
}

/// The more severe of two normalized symbols. Symbols absent from the
/// ranking table are given mid-table severity.
fn worse_symbol<'a>(first: &'a str, second: &'a str) -> &'a str {
    let rank = |symbol: &str| {
        SEVERITY_RANKING
            .iter()
            .position(|s| *s == symbol)
            .unwrap_or(SEVERITY_RANKING.len() / 2)
    };

    if rank(first) >= rank(second) { first } else { second }
}

/// Maps a normalized symbol code to a canonical category by keyword
/// containment, in fixed priority order.
fn map_symbol(symbol: Option<&str>) -> WeatherCategory {
    let Some(symbol) = symbol else {
        return WeatherCategory::Clear;
    };

    let symbol = normalize_symbol(&symbol.to_lowercase());

    if symbol.contains("thunder") {
        return WeatherCategory::Thunderstorm;
    }
    if symbol.contains("sleet") || symbol.contains("snow") {
        return WeatherCategory::Snow;
    }
    if symbol.contains("rain") || symbol.contains("shower") {
        return WeatherCategory::Rain;
    }
    if symbol.contains("fog") {
        return WeatherCategory::FogMist;
    }
    if symbol.contains("cloudy") && !symbol.contains("partlycloudy") {
        return WeatherCategory::Clouds;
    }
    if symbol.contains("partlycloudy") || symbol.contains("fair") {
        return WeatherCategory::PartialClouds;
    }
    if symbol.contains("clearsky") {
        return WeatherCategory::Clear;
    }

    tracing::warn!("Unknown weather symbol code: {symbol}");
    WeatherCategory::Clear
}
