//! OpenWeatherMap 5-day / 3-hour forecast parser.
//!
//! The payload is a list of 3-hour slices; slices are grouped by UTC calendar
//! date and folded into one record per day: running min/max over every
//! slice's `temp_min`/`temp_max`, and the most frequent mapped category as
//! the day's weather.

use super::{ForecastParser, ProviderId};
use crate::model::{ForecastRecord, WeatherCategory};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct OwmSlice {
    dt: i64,
    #[serde(default)]
    main: Option<OwmMain>,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp_min: Option<f64>,
    temp_max: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    #[serde(default = "default_condition_id")]
    id: i64,
    #[serde(default)]
    main: String,
}

fn default_condition_id() -> i64 {
    800
}

/// Folds 3-hour slices into one day's forecast.
#[derive(Debug, Default)]
struct DailyAggregate {
    min_temp: Option<f64>,
    max_temp: Option<f64>,
    // Insertion-ordered so ties resolve deterministically.
    weather_counts: Vec<(WeatherCategory, u32)>,
}

impl DailyAggregate {
    fn add_min_temp(&mut self, temp: f64) {
        self.min_temp = Some(self.min_temp.map_or(temp, |t| t.min(temp)));
    }

    fn add_max_temp(&mut self, temp: f64) {
        self.max_temp = Some(self.max_temp.map_or(temp, |t| t.max(temp)));
    }

    fn add_weather(&mut self, weather: WeatherCategory) {
        if let Some(entry) = self.weather_counts.iter_mut().find(|(w, _)| *w == weather) {
            entry.1 += 1;
        } else {
            self.weather_counts.push((weather, 1));
        }
    }

    /// Most frequent category across the day's slices; earliest-seen wins
    /// ties. `Clear` when no slice carried a condition.
    fn most_frequent_weather(&self) -> WeatherCategory {
        let mut best: Option<(WeatherCategory, u32)> = None;
        for &(weather, count) in &self.weather_counts {
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((weather, count));
            }
        }
        best.map_or(WeatherCategory::Clear, |(weather, _)| weather)
    }
}

#[derive(Debug)]
pub struct OpenWeatherMapParser;

impl ForecastParser for OpenWeatherMapParser {
    fn provider_name(&self) -> &'static str {
        ProviderId::OpenWeatherMap.as_str()
    }

    fn parse(
        &self,
        city: &str,
        raw_payload: &str,
        fetch_timestamp: DateTime<Utc>,
    ) -> Vec<ForecastRecord> {
        tracing::info!("Parsing OpenWeatherMap forecast for {city}");

        let root: Value = match serde_json::from_str(raw_payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Error parsing OpenWeatherMap response for {city}: {e}");
                return Vec::new();
            }
        };

        let Some(list) = root.get("list").and_then(Value::as_array) else {
            tracing::error!("Invalid OpenWeatherMap response format: missing 'list' array");
            return Vec::new();
        };

        let mut daily: BTreeMap<NaiveDate, DailyAggregate> = BTreeMap::new();

        for entry in list {
            let slice: OwmSlice = match serde_json::from_value(entry.clone()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("Error parsing forecast entry: {e}");
                    continue;
                }
            };

            let Some(target_date) =
                DateTime::<Utc>::from_timestamp(slice.dt, 0).map(|dt| dt.date_naive())
            else {
                tracing::warn!("Out-of-range dt {} in OpenWeatherMap slice", slice.dt);
                continue;
            };

            let aggregate = daily.entry(target_date).or_default();

            if let Some(main) = &slice.main {
                if let Some(temp_min) = main.temp_min {
                    aggregate.add_min_temp(temp_min);
                }
                if let Some(temp_max) = main.temp_max {
                    aggregate.add_max_temp(temp_max);
                }
            }

            if let Some(condition) = slice.weather.first() {
                aggregate.add_weather(map_condition(&condition.main, condition.id));
            }
        }

        let records: Vec<ForecastRecord> = daily
            .into_iter()
            .map(|(date, aggregate)| ForecastRecord {
                id: None,
                provider_name: self.provider_name().to_string(),
                city: city.to_string(),
                fetch_timestamp,
                target_date: date,
                predicted_min_temp: aggregate.min_temp,
                predicted_max_temp: aggregate.max_temp,
                predicted_weather: Some(aggregate.most_frequent_weather()),
            })
            .collect();

        tracing::info!(
            "Successfully parsed {} daily forecasts for {city} from OpenWeatherMap",
            records.len()
        );
        records
    }
}

/// Maps an OpenWeatherMap condition (coarse type name plus category id) to a
/// canonical category. Cloud sub-codes 801/802 are partial cover, 803/804
/// full cover; other cloud ids default to partial.
fn map_condition(main: &str, id: i64) -> WeatherCategory {
    match main {
        "Thunderstorm" => WeatherCategory::Thunderstorm,
        "Drizzle" | "Rain" => WeatherCategory::Rain,
        "Snow" => WeatherCategory::Snow,
        // Mist, fog, haze and friends.
        "Atmosphere" => WeatherCategory::FogMist,
        "Clear" => WeatherCategory::Clear,
        "Clouds" => match id {
            801 | 802 => WeatherCategory::PartialClouds,
            803 | 804 => WeatherCategory::Clouds,
            _ => WeatherCategory::PartialClouds,
        },
        _ => WeatherCategory::Clear,
    }
}
