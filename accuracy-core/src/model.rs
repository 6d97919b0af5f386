use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Canonical weather category every provider's native condition maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherCategory {
    Rain,
    Snow,
    Thunderstorm,
    Clouds,
    PartialClouds,
    Clear,
    FogMist,
}

impl WeatherCategory {
    /// Whether this category counts as precipitation for scoring purposes.
    pub fn is_precipitation(self) -> bool {
        matches!(
            self,
            WeatherCategory::Rain | WeatherCategory::Snow | WeatherCategory::Thunderstorm
        )
    }
}

/// Confusion-matrix outcome of a precipitation prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrecipitationScore {
    TruePositive,
    TrueNegative,
    FalsePositive,
    FalseNegative,
}

impl PrecipitationScore {
    pub fn is_correct(self) -> bool {
        matches!(
            self,
            PrecipitationScore::TruePositive | PrecipitationScore::TrueNegative
        )
    }
}

/// One provider's prediction for one city/day, fetched at one instant.
///
/// `id` is assigned by the storage layer on insert; parser output carries
/// `None`. Records are immutable once parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRecord {
    #[serde(default)]
    pub id: Option<i64>,
    pub provider_name: String,
    pub city: String,
    pub fetch_timestamp: DateTime<Utc>,
    pub target_date: NaiveDate,
    pub predicted_min_temp: Option<f64>,
    pub predicted_max_temp: Option<f64>,
    pub predicted_weather: Option<WeatherCategory>,
}

/// One ground-truth measurement for a city at an instant (UTC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActualObservation {
    pub city: String,
    pub measurement_timestamp: DateTime<Utc>,
    pub actual_temperature: Option<f64>,
    pub actual_precipitation: Option<f64>,
    pub weather: Option<WeatherCategory>,
}

/// Per-city daily aggregate of actual observations. In-memory only.
///
/// `min_temp`/`max_temp` are NaN when the day had no temperature samples.
#[derive(Debug, Clone, Copy)]
pub struct DailyActualWeather {
    pub min_temp: f64,
    pub max_temp: f64,
    pub had_precipitation: bool,
}

/// Result of comparing one forecast to one day of actual weather.
///
/// Uniqueness key: (provider_name, city, target_date, forecast_horizon).
/// All scores for a target date are replaced atomically by each analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyScore {
    pub provider_name: String,
    pub city: String,
    pub target_date: NaiveDate,
    /// Whole hours between fetch time and the start of the target date's
    /// local day in the reference timezone.
    pub forecast_horizon: i64,
    /// Signed predicted minus actual; 0.0 when either side is unavailable.
    pub min_temp_deviation: f64,
    pub max_temp_deviation: f64,
    pub precipitation_score: Option<PrecipitationScore>,
}

/// Aggregated per-provider ranking entry, derived at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderScoreSummary {
    pub provider_name: String,
    pub overall_score: f64,
    pub average_temp_deviation: f64,
    pub precipitation_accuracy: f64,
}

/// Distinct filter values available for a city's scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterOptions {
    pub horizons: Vec<i64>,
    pub dates: Vec<NaiveDate>,
}
