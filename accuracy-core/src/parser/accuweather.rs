//! AccuWeather daily-forecast parser.

use super::{ForecastParser, ProviderId};
use crate::model::{ForecastRecord, WeatherCategory};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct AwDailyForecast {
    #[serde(rename = "EpochDate")]
    epoch_date: i64,
    #[serde(rename = "Temperature")]
    temperature: AwTemperature,
    #[serde(rename = "Day")]
    day: AwDay,
}

#[derive(Debug, Deserialize)]
struct AwTemperature {
    #[serde(rename = "Minimum")]
    minimum: AwValue,
    #[serde(rename = "Maximum")]
    maximum: AwValue,
}

#[derive(Debug, Deserialize)]
struct AwValue {
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Debug, Deserialize)]
struct AwDay {
    #[serde(rename = "IconPhrase")]
    icon_phrase: String,
}

#[derive(Debug)]
pub struct AccuWeatherParser;

impl ForecastParser for AccuWeatherParser {
    fn provider_name(&self) -> &'static str {
        ProviderId::AccuWeather.as_str()
    }

    fn parse(
        &self,
        city: &str,
        raw_payload: &str,
        fetch_timestamp: DateTime<Utc>,
    ) -> Vec<ForecastRecord> {
        tracing::info!("Parsing AccuWeather forecast for {city}");

        let root: Value = match serde_json::from_str(raw_payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Error parsing AccuWeather JSON response for {city}: {e}");
                return Vec::new();
            }
        };

        let Some(daily) = root.get("DailyForecasts").and_then(Value::as_array) else {
            tracing::error!("Invalid AccuWeather response format: missing 'DailyForecasts' array");
            return Vec::new();
        };

        let mut forecasts = Vec::new();

        for entry in daily {
            let parsed: AwDailyForecast = match serde_json::from_value(entry.clone()) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("Error parsing a daily forecast entry for AccuWeather: {e}");
                    continue;
                }
            };

            // The epoch date is bucketed to a UTC calendar date on purpose,
            // with no local-time adjustment.
            let Some(target_date) = DateTime::<Utc>::from_timestamp(parsed.epoch_date, 0)
                .map(|dt| dt.date_naive())
            else {
                tracing::warn!(
                    "Out-of-range EpochDate {} in AccuWeather entry",
                    parsed.epoch_date
                );
                continue;
            };

            forecasts.push(ForecastRecord {
                id: None,
                provider_name: self.provider_name().to_string(),
                city: city.to_string(),
                fetch_timestamp,
                target_date,
                predicted_min_temp: Some(parsed.temperature.minimum.value),
                predicted_max_temp: Some(parsed.temperature.maximum.value),
                predicted_weather: Some(map_icon_phrase(&parsed.day.icon_phrase)),
            });
        }

        tracing::info!(
            "Successfully parsed {} forecast entries for {city} from AccuWeather",
            forecasts.len()
        );
        forecasts
    }
}

/// Maps AccuWeather's `IconPhrase` to a canonical category by keyword search
/// in fixed priority order.
fn map_icon_phrase(icon_phrase: &str) -> WeatherCategory {
    let phrase = icon_phrase.to_lowercase();

    if phrase.contains("thunderstorm") {
        return WeatherCategory::Thunderstorm;
    }
    if phrase.contains("snow") || phrase.contains("sleet") || phrase.contains("flurries") {
        return WeatherCategory::Snow;
    }
    if phrase.contains("rain") || phrase.contains("showers") {
        return WeatherCategory::Rain;
    }
    if phrase.contains("fog") || phrase.contains("hazy") {
        return WeatherCategory::FogMist;
    }
    if phrase.contains("cloudy") || phrase.contains("overcast") {
        return WeatherCategory::Clouds;
    }
    if phrase.contains("partly sunny")
        || phrase.contains("intermittent clouds")
        || phrase.contains("mostly cloudy")
    {
        return WeatherCategory::PartialClouds;
    }
    if phrase.contains("sunny") || phrase.contains("clear") {
        return WeatherCategory::Clear;
    }

    WeatherCategory::Clear
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> &'static str {
        r#"{
            "DailyForecasts": [
                {
                    "EpochDate": 1754006400,
                    "Temperature": {
                        "Minimum": { "Value": 17.2, "Unit": "C" },
                        "Maximum": { "Value": 29.4, "Unit": "C" }
                    },
                    "Day": { "IconPhrase": "Thunderstorms" }
                },
                {
                    "EpochDate": 1754092800,
                    "Temperature": {
                        "Minimum": { "Value": 16.0, "Unit": "C" },
                        "Maximum": { "Value": 27.8, "Unit": "C" }
                    },
                    "Day": { "IconPhrase": "Mostly sunny" }
                }
            ]
        }"#
    }

    #[test]
    fn parses_daily_entries() {
        let parser = AccuWeatherParser;
        let records = parser.parse("Sarajevo", sample_payload(), Utc::now());

        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.provider_name, "AccuWeather");
        assert_eq!(first.city, "Sarajevo");
        // 1754006400 = 2025-08-01T00:00:00Z
        assert_eq!(first.target_date.to_string(), "2025-08-01");
        assert_eq!(first.predicted_min_temp, Some(17.2));
        assert_eq!(first.predicted_max_temp, Some(29.4));
        assert_eq!(first.predicted_weather, Some(WeatherCategory::Thunderstorm));

        assert_eq!(records[1].predicted_weather, Some(WeatherCategory::Clear));
    }

    #[test]
    fn malformed_entry_is_skipped_without_aborting_batch() {
        let payload = r#"{
            "DailyForecasts": [
                { "EpochDate": "not a number" },
                {
                    "EpochDate": 1754092800,
                    "Temperature": {
                        "Minimum": { "Value": 10.0 },
                        "Maximum": { "Value": 20.0 }
                    },
                    "Day": { "IconPhrase": "Rain" }
                }
            ]
        }"#;

        let records = AccuWeatherParser.parse("Sarajevo", payload, Utc::now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].predicted_weather, Some(WeatherCategory::Rain));
    }

    #[test]
    fn missing_array_yields_empty() {
        assert!(AccuWeatherParser.parse("Sarajevo", "{}", Utc::now()).is_empty());
        assert!(AccuWeatherParser.parse("Sarajevo", "not json", Utc::now()).is_empty());
    }

    #[test]
    fn icon_phrase_priority_order() {
        assert_eq!(map_icon_phrase("Rain and snow"), WeatherCategory::Snow);
        assert_eq!(map_icon_phrase("Showers"), WeatherCategory::Rain);
        assert_eq!(map_icon_phrase("Hazy sunshine"), WeatherCategory::FogMist);
        // "Mostly cloudy" hits the "cloudy" test before the partial bucket.
        assert_eq!(map_icon_phrase("Mostly cloudy"), WeatherCategory::Clouds);
        assert_eq!(map_icon_phrase("Partly sunny"), WeatherCategory::PartialClouds);
        // "t-storms" is not the "thunderstorm" keyword; the partial bucket wins.
        assert_eq!(
            map_icon_phrase("Partly sunny w/ t-storms"),
            WeatherCategory::PartialClouds
        );
        assert_eq!(map_icon_phrase("Sunny"), WeatherCategory::Clear);
        assert_eq!(map_icon_phrase("Dreary"), WeatherCategory::Clear);
    }
}
