//! Forecast accuracy analysis for one target date.
//!
//! A run walks a fixed sequence: completeness check, actual-weather
//! aggregation, forecast grouping and dedup, horizon computation, scoring,
//! and an idempotent delete-then-insert replacement of that date's scores.
//! An incomplete day produces zero scores and writes nothing.

use crate::model::{
    AccuracyScore, ActualObservation, DailyActualWeather, ForecastRecord, PrecipitationScore,
    WeatherCategory,
};
use crate::storage::Storage;
use crate::time::{forecast_horizon_hours, local_day_bounds};
use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;

/// Scores every stored forecast for a target date against that day's actual
/// observations.
pub struct AccuracyAnalyzer<'a, S: Storage> {
    storage: &'a S,
}

impl<'a, S: Storage> AccuracyAnalyzer<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Analyze forecast accuracy for `date` (a reference-timezone local day).
    ///
    /// Returns the number of scores written. Returns 0 without touching
    /// stored scores when the day's actual data is incomplete. Storage
    /// errors abort the whole run.
    pub fn analyze_accuracy_for_date(&self, date: NaiveDate) -> Result<usize> {
        tracing::info!("Starting accuracy analysis for date: {date}");

        if !self.is_actual_data_complete(date)? {
            tracing::warn!("Actual weather data is not complete for date: {date}. Skipping analysis.");
            return Ok(0);
        }

        let actual_by_city = self.actual_weather_by_city(date)?;
        if actual_by_city.is_empty() {
            tracing::warn!("No actual weather data found for date: {date}. Skipping analysis.");
            return Ok(0);
        }

        // Replace any prior scores for this date so re-runs are idempotent.
        self.storage.delete_scores_for_date(date)?;

        let forecasts = self.storage.forecasts_for_date(date)?;
        tracing::info!("Found {} forecasts for date: {date}", forecasts.len());

        let grouped = group_forecasts(forecasts);

        let mut scores: HashMap<(String, String, i64), AccuracyScore> = HashMap::new();

        for ((provider_name, city, fetch_timestamp), forecast) in grouped {
            let Some(actual) = actual_by_city.get(&city) else {
                tracing::warn!("No actual weather data for city: {city}. Skipping accuracy analysis.");
                continue;
            };

            let horizon = forecast_horizon_hours(fetch_timestamp, date);
            // Forecasts fetched after the day began are not scored.
            if horizon < 0 {
                continue;
            }

            let score = score_forecast(&forecast, *actual, horizon);
            scores.insert((provider_name, city, horizon), score);
        }

        let scores: Vec<AccuracyScore> = scores.into_values().collect();
        let count = scores.len();
        self.storage.save_scores(scores)?;

        tracing::info!("Generated and saved {count} accuracy scores for date: {date}");
        Ok(count)
    }

    /// A day is complete when every city with forecasts for it has at least
    /// one observation in the final hour of the local day.
    fn is_actual_data_complete(&self, date: NaiveDate) -> Result<bool> {
        let (start, end) = local_day_bounds(date);
        tracing::debug!("Checking data completeness between {start} and {end} UTC");

        let mut cities: Vec<String> = self
            .storage
            .forecasts_for_date(date)?
            .into_iter()
            .map(|f| f.city)
            .collect();
        cities.sort();
        cities.dedup();

        if cities.is_empty() {
            tracing::info!("No forecast data found for any city on date: {date}");
            return Ok(false);
        }

        let mut complete = true;
        for city in cities {
            let last_hour_start = end - Duration::hours(1);
            let last_hour = self
                .storage
                .observations_for_city_in_range(&city, last_hour_start, end)?;

            if last_hour.is_empty() {
                tracing::info!(
                    "Missing actual weather data for city {city} on date {date} in the last hour"
                );
                complete = false;
            }
        }

        Ok(complete)
    }

    fn actual_weather_by_city(&self, date: NaiveDate) -> Result<HashMap<String, DailyActualWeather>> {
        let (start, end) = local_day_bounds(date);
        tracing::debug!("Getting actual weather between {start} and {end} UTC");

        let observations = self.storage.observations_in_range(start, end)?;

        let mut by_city: HashMap<String, Vec<ActualObservation>> = HashMap::new();
        for observation in observations {
            by_city.entry(observation.city.clone()).or_default().push(observation);
        }

        Ok(by_city
            .into_iter()
            .map(|(city, observations)| (city, aggregate_daily(&observations)))
            .collect())
    }
}

/// Derive a day's actual weather from its observations. Min/max are NaN
/// when no observation carries a temperature.
fn aggregate_daily(observations: &[ActualObservation]) -> DailyActualWeather {
    let temperatures: Vec<f64> = observations
        .iter()
        .filter_map(|o| o.actual_temperature)
        .collect();

    let min_temp = temperatures.iter().copied().fold(f64::NAN, f64::min);
    let max_temp = temperatures.iter().copied().fold(f64::NAN, f64::max);

    let had_precipitation = observations
        .iter()
        .any(|o| o.actual_precipitation.is_some_and(|p| p > 0.0));

    DailyActualWeather {
        min_temp,
        max_temp,
        had_precipitation,
    }
}

type ForecastKey = (String, String, DateTime<Utc>);

/// Group forecasts by (provider, city, fetch timestamp). Colliding records
/// keep the one with the higher storage identity, which protects against
/// duplicate ingestion runs covering the same fetch window.
fn group_forecasts(forecasts: Vec<ForecastRecord>) -> HashMap<ForecastKey, ForecastRecord> {
    let mut grouped: HashMap<ForecastKey, ForecastRecord> = HashMap::new();

    for forecast in forecasts {
        let key = (
            forecast.provider_name.clone(),
            forecast.city.clone(),
            forecast.fetch_timestamp,
        );
        match grouped.get(&key) {
            Some(existing) if existing.id >= forecast.id => {}
            _ => {
                grouped.insert(key, forecast);
            }
        }
    }

    grouped
}

fn score_forecast(
    forecast: &ForecastRecord,
    actual: DailyActualWeather,
    horizon: i64,
) -> AccuracyScore {
    let min_temp_deviation = match forecast.predicted_min_temp {
        Some(predicted) if !actual.min_temp.is_nan() => predicted - actual.min_temp,
        _ => 0.0,
    };
    let max_temp_deviation = match forecast.predicted_max_temp {
        Some(predicted) if !actual.max_temp.is_nan() => predicted - actual.max_temp,
        _ => 0.0,
    };

    let precipitation_score =
        precipitation_score(forecast.predicted_weather, actual.had_precipitation);

    AccuracyScore {
        provider_name: forecast.provider_name.clone(),
        city: forecast.city.clone(),
        target_date: forecast.target_date,
        forecast_horizon: horizon,
        min_temp_deviation,
        max_temp_deviation,
        precipitation_score: Some(precipitation_score),
    }
}

/// Standard confusion-matrix classification. A forecast predicts
/// precipitation iff its weather category is rain, snow or thunderstorm; a
/// missing category predicts none.
fn precipitation_score(
    predicted_weather: Option<WeatherCategory>,
    had_precipitation: bool,
) -> PrecipitationScore {
    let predicted = predicted_weather.is_some_and(WeatherCategory::is_precipitation);

    match (predicted, had_precipitation) {
        (true, true) => PrecipitationScore::TruePositive,
        (true, false) => PrecipitationScore::FalsePositive,
        (false, true) => PrecipitationScore::FalseNegative,
        (false, false) => PrecipitationScore::TrueNegative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn forecast(
        provider: &str,
        city: &str,
        fetch: DateTime<Utc>,
        target: NaiveDate,
        min: f64,
        max: f64,
        weather: WeatherCategory,
    ) -> ForecastRecord {
        ForecastRecord {
            id: None,
            provider_name: provider.to_string(),
            city: city.to_string(),
            fetch_timestamp: fetch,
            target_date: target,
            predicted_min_temp: Some(min),
            predicted_max_temp: Some(max),
            predicted_weather: Some(weather),
        }
    }

    fn observation(
        city: &str,
        ts: DateTime<Utc>,
        temperature: Option<f64>,
        precipitation: Option<f64>,
    ) -> ActualObservation {
        ActualObservation {
            city: city.to_string(),
            measurement_timestamp: ts,
            actual_temperature: temperature,
            actual_precipitation: precipitation,
            weather: None,
        }
    }

    /// Hourly observations covering the whole local day (UTC+2 in August),
    /// including the final hour needed by the completeness check.
    fn seed_full_day(storage: &MemoryStorage, city: &str, temp: f64, precipitation: Option<f64>) {
        let mut observations = Vec::new();
        // Local day 2025-08-03 runs 2025-08-02T22:00Z .. 2025-08-03T22:00Z.
        let start = Utc.with_ymd_and_hms(2025, 8, 2, 22, 0, 0).unwrap();
        for hour in 0..24 {
            observations.push(observation(
                city,
                start + Duration::hours(hour),
                Some(temp + hour as f64 * 0.1),
                precipitation,
            ));
        }
        storage.save_observations(observations).unwrap();
    }

    const TARGET: (i32, u32, u32) = (2025, 8, 3);

    #[test]
    fn incomplete_day_produces_no_scores_and_no_writes() {
        let storage = MemoryStorage::new();
        let target = date(TARGET.0, TARGET.1, TARGET.2);
        let fetch = Utc.with_ymd_and_hms(2025, 8, 1, 18, 0, 0).unwrap();

        storage
            .save_forecasts(vec![forecast(
                "AccuWeather",
                "Sarajevo",
                fetch,
                target,
                10.0,
                20.0,
                WeatherCategory::Clear,
            )])
            .unwrap();

        // One observation early in the day, none in the final hour.
        storage
            .save_observations(vec![observation(
                "Sarajevo",
                Utc.with_ymd_and_hms(2025, 8, 3, 6, 0, 0).unwrap(),
                Some(15.0),
                None,
            )])
            .unwrap();

        // Pre-existing score for the date must survive a skipped run.
        storage
            .save_scores(vec![AccuracyScore {
                provider_name: "AccuWeather".to_string(),
                city: "Sarajevo".to_string(),
                target_date: target,
                forecast_horizon: 48,
                min_temp_deviation: 0.5,
                max_temp_deviation: 0.5,
                precipitation_score: Some(PrecipitationScore::TrueNegative),
            }])
            .unwrap();

        let analyzer = AccuracyAnalyzer::new(&storage);
        assert_eq!(analyzer.analyze_accuracy_for_date(target).unwrap(), 0);
        assert_eq!(storage.all_scores().len(), 1);
    }

    #[test]
    fn no_forecasts_means_incomplete() {
        let storage = MemoryStorage::new();
        seed_full_day(&storage, "Sarajevo", 15.0, None);

        let analyzer = AccuracyAnalyzer::new(&storage);
        let target = date(TARGET.0, TARGET.1, TARGET.2);
        assert_eq!(analyzer.analyze_accuracy_for_date(target).unwrap(), 0);
    }

    #[test]
    fn scores_signed_deviations_against_day_min_max() {
        let storage = MemoryStorage::new();
        let target = date(TARGET.0, TARGET.1, TARGET.2);
        // Temps run 15.0 .. 17.3 across the day.
        seed_full_day(&storage, "Sarajevo", 15.0, None);

        let fetch = Utc.with_ymd_and_hms(2025, 8, 1, 18, 0, 0).unwrap();
        storage
            .save_forecasts(vec![forecast(
                "AccuWeather",
                "Sarajevo",
                fetch,
                target,
                14.0,
                20.0,
                WeatherCategory::Rain,
            )])
            .unwrap();

        let analyzer = AccuracyAnalyzer::new(&storage);
        assert_eq!(analyzer.analyze_accuracy_for_date(target).unwrap(), 1);

        let scores = storage.all_scores();
        let score = &scores[0];
        assert_eq!(score.forecast_horizon, 28);
        assert!((score.min_temp_deviation - (14.0 - 15.0)).abs() < 1e-9);
        assert!((score.max_temp_deviation - (20.0 - 17.3)).abs() < 1e-9);
        // Rain predicted, dry day observed.
        assert_eq!(
            score.precipitation_score,
            Some(PrecipitationScore::FalsePositive)
        );
    }

    #[test]
    fn rerunning_analysis_is_idempotent() {
        let storage = MemoryStorage::new();
        let target = date(TARGET.0, TARGET.1, TARGET.2);
        seed_full_day(&storage, "Sarajevo", 15.0, Some(1.2));

        let fetch = Utc.with_ymd_and_hms(2025, 8, 1, 18, 0, 0).unwrap();
        storage
            .save_forecasts(vec![
                forecast(
                    "AccuWeather",
                    "Sarajevo",
                    fetch,
                    target,
                    14.0,
                    20.0,
                    WeatherCategory::Rain,
                ),
                forecast(
                    "YR.NO",
                    "Sarajevo",
                    fetch,
                    target,
                    13.0,
                    19.0,
                    WeatherCategory::Clear,
                ),
            ])
            .unwrap();

        let analyzer = AccuracyAnalyzer::new(&storage);
        let first = analyzer.analyze_accuracy_for_date(target).unwrap();
        let mut first_scores = storage.all_scores();

        let second = analyzer.analyze_accuracy_for_date(target).unwrap();
        let mut second_scores = storage.all_scores();

        assert_eq!(first, 2);
        assert_eq!(second, 2);

        let key = |s: &AccuracyScore| (s.provider_name.clone(), s.city.clone(), s.forecast_horizon);
        first_scores.sort_by_key(&key);
        second_scores.sort_by_key(&key);
        for (a, b) in first_scores.iter().zip(&second_scores) {
            assert_eq!(key(a), key(b));
            assert_eq!(a.min_temp_deviation, b.min_temp_deviation);
            assert_eq!(a.max_temp_deviation, b.max_temp_deviation);
            assert_eq!(a.precipitation_score, b.precipitation_score);
        }
    }

    #[test]
    fn negative_horizon_forecasts_are_excluded() {
        let storage = MemoryStorage::new();
        let target = date(TARGET.0, TARGET.1, TARGET.2);
        seed_full_day(&storage, "Sarajevo", 15.0, None);

        // Fetched six hours after the local day began.
        let late_fetch = Utc.with_ymd_and_hms(2025, 8, 3, 4, 0, 0).unwrap();
        storage
            .save_forecasts(vec![forecast(
                "AccuWeather",
                "Sarajevo",
                late_fetch,
                target,
                14.0,
                20.0,
                WeatherCategory::Clear,
            )])
            .unwrap();

        let analyzer = AccuracyAnalyzer::new(&storage);
        assert_eq!(analyzer.analyze_accuracy_for_date(target).unwrap(), 0);
    }

    #[test]
    fn duplicate_fetch_window_keeps_highest_id() {
        let storage = MemoryStorage::new();
        let target = date(TARGET.0, TARGET.1, TARGET.2);
        seed_full_day(&storage, "Sarajevo", 15.0, None);

        let fetch = Utc.with_ymd_and_hms(2025, 8, 1, 18, 0, 0).unwrap();
        // Same (provider, city, fetch_timestamp); the second insert gets the
        // higher id and must win.
        storage
            .save_forecasts(vec![forecast(
                "AccuWeather",
                "Sarajevo",
                fetch,
                target,
                10.0,
                18.0,
                WeatherCategory::Clear,
            )])
            .unwrap();
        storage
            .save_forecasts(vec![forecast(
                "AccuWeather",
                "Sarajevo",
                fetch,
                target,
                12.0,
                21.0,
                WeatherCategory::Clear,
            )])
            .unwrap();

        let analyzer = AccuracyAnalyzer::new(&storage);
        assert_eq!(analyzer.analyze_accuracy_for_date(target).unwrap(), 1);

        let score = &storage.all_scores()[0];
        // min deviation from the second record: 12.0 - 15.0.
        assert!((score.min_temp_deviation - (12.0 - 15.0)).abs() < 1e-9);
    }

    #[test]
    fn multiple_cities_are_scored_independently() {
        let storage = MemoryStorage::new();
        let target = date(TARGET.0, TARGET.1, TARGET.2);
        seed_full_day(&storage, "Sarajevo", 15.0, None);
        seed_full_day(&storage, "Mostar", 20.0, None);

        let fetch = Utc.with_ymd_and_hms(2025, 8, 1, 18, 0, 0).unwrap();
        storage
            .save_forecasts(vec![
                forecast(
                    "AccuWeather",
                    "Sarajevo",
                    fetch,
                    target,
                    14.0,
                    20.0,
                    WeatherCategory::Clear,
                ),
                forecast(
                    "AccuWeather",
                    "Mostar",
                    fetch,
                    target,
                    18.0,
                    30.0,
                    WeatherCategory::Clear,
                ),
            ])
            .unwrap();

        let analyzer = AccuracyAnalyzer::new(&storage);
        assert_eq!(analyzer.analyze_accuracy_for_date(target).unwrap(), 2);
    }

    #[test]
    fn missing_temperature_data_zeroes_deviations() {
        let storage = MemoryStorage::new();
        let target = date(TARGET.0, TARGET.1, TARGET.2);

        // Observations exist (satisfying completeness) but carry no
        // temperatures, so min/max are NaN.
        let start = Utc.with_ymd_and_hms(2025, 8, 2, 22, 0, 0).unwrap();
        let mut observations = Vec::new();
        for hour in 0..24 {
            observations.push(observation(
                "Sarajevo",
                start + Duration::hours(hour),
                None,
                Some(0.5),
            ));
        }
        storage.save_observations(observations).unwrap();

        let fetch = Utc.with_ymd_and_hms(2025, 8, 1, 18, 0, 0).unwrap();
        storage
            .save_forecasts(vec![forecast(
                "AccuWeather",
                "Sarajevo",
                fetch,
                target,
                14.0,
                20.0,
                WeatherCategory::Snow,
            )])
            .unwrap();

        let analyzer = AccuracyAnalyzer::new(&storage);
        assert_eq!(analyzer.analyze_accuracy_for_date(target).unwrap(), 1);

        let score = &storage.all_scores()[0];
        assert_eq!(score.min_temp_deviation, 0.0);
        assert_eq!(score.max_temp_deviation, 0.0);
        // Snow counts as predicted precipitation; rain fell.
        assert_eq!(
            score.precipitation_score,
            Some(PrecipitationScore::TruePositive)
        );
    }

    #[test]
    fn confusion_matrix_cases() {
        let tp = precipitation_score(Some(WeatherCategory::Rain), true);
        let fp = precipitation_score(Some(WeatherCategory::Rain), false);
        let fn_ = precipitation_score(Some(WeatherCategory::Clear), true);
        let tn = precipitation_score(Some(WeatherCategory::Clear), false);
        let none = precipitation_score(None, true);

        assert_eq!(tp, PrecipitationScore::TruePositive);
        assert_eq!(fp, PrecipitationScore::FalsePositive);
        assert_eq!(fn_, PrecipitationScore::FalseNegative);
        assert_eq!(tn, PrecipitationScore::TrueNegative);
        // Missing prediction counts as "no precipitation predicted".
        assert_eq!(none, PrecipitationScore::FalseNegative);
    }
}
