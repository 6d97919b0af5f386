//! Storage boundary for the pipeline.
//!
//! The database engine lives elsewhere; this trait is the seam the analyzer,
//! aggregator and collector talk through. [`MemoryStorage`] is a complete
//! in-process implementation used by tests and the fixture-driven CLI
//! commands.

use crate::model::{AccuracyScore, ActualObservation, ForecastRecord};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Mutex;

pub trait Storage: Send + Sync {
    /// Persist parsed forecasts, assigning identities to new records.
    fn save_forecasts(&self, records: Vec<ForecastRecord>) -> Result<()>;

    fn forecasts_for_date(&self, date: NaiveDate) -> Result<Vec<ForecastRecord>>;

    fn save_observations(&self, observations: Vec<ActualObservation>) -> Result<()>;

    /// Observations with `start <= measurement_timestamp < end`, all cities.
    fn observations_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActualObservation>>;

    fn observations_for_city_in_range(
        &self,
        city: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActualObservation>>;

    fn delete_scores_for_date(&self, date: NaiveDate) -> Result<()>;

    fn save_scores(&self, scores: Vec<AccuracyScore>) -> Result<()>;

    fn scores_by_city_and_date(&self, city: &str, date: NaiveDate) -> Result<Vec<AccuracyScore>>;

    fn scores_by_city_and_date_after(
        &self,
        city: &str,
        date: NaiveDate,
    ) -> Result<Vec<AccuracyScore>>;

    fn scores_by_city_horizon_and_date_after(
        &self,
        city: &str,
        horizon: i64,
        date: NaiveDate,
    ) -> Result<Vec<AccuracyScore>>;

    /// Distinct (horizon, target_date) pairs recorded for a city.
    fn distinct_horizons_and_dates_for_city(&self, city: &str)
    -> Result<Vec<(i64, NaiveDate)>>;
}

#[derive(Debug, Default)]
struct MemoryState {
    next_forecast_id: i64,
    forecasts: Vec<ForecastRecord>,
    observations: Vec<ActualObservation>,
    scores: Vec<AccuracyScore>,
}

/// Mutex-guarded in-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock means a panicked writer; the data is plain values,
        // so continuing with it is safe.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// All persisted scores, in insertion order.
    pub fn all_scores(&self) -> Vec<AccuracyScore> {
        self.lock().scores.clone()
    }

    /// All persisted observations, in insertion order.
    pub fn all_observations(&self) -> Vec<ActualObservation> {
        self.lock().observations.clone()
    }

    /// All persisted forecasts, in insertion order.
    pub fn all_forecasts(&self) -> Vec<ForecastRecord> {
        self.lock().forecasts.clone()
    }
}

impl Storage for MemoryStorage {
    fn save_forecasts(&self, records: Vec<ForecastRecord>) -> Result<()> {
        let mut state = self.lock();
        for mut record in records {
            if record.id.is_none() {
                state.next_forecast_id += 1;
                record.id = Some(state.next_forecast_id);
            }
            state.forecasts.push(record);
        }
        Ok(())
    }

    fn forecasts_for_date(&self, date: NaiveDate) -> Result<Vec<ForecastRecord>> {
        Ok(self
            .lock()
            .forecasts
            .iter()
            .filter(|f| f.target_date == date)
            .cloned()
            .collect())
    }

    fn save_observations(&self, observations: Vec<ActualObservation>) -> Result<()> {
        self.lock().observations.extend(observations);
        Ok(())
    }

    fn observations_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActualObservation>> {
        Ok(self
            .lock()
            .observations
            .iter()
            .filter(|o| o.measurement_timestamp >= start && o.measurement_timestamp < end)
            .cloned()
            .collect())
    }

    fn observations_for_city_in_range(
        &self,
        city: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActualObservation>> {
        Ok(self
            .lock()
            .observations
            .iter()
            .filter(|o| {
                o.city == city && o.measurement_timestamp >= start && o.measurement_timestamp < end
            })
            .cloned()
            .collect())
    }

    fn delete_scores_for_date(&self, date: NaiveDate) -> Result<()> {
        self.lock().scores.retain(|s| s.target_date != date);
        Ok(())
    }

    fn save_scores(&self, scores: Vec<AccuracyScore>) -> Result<()> {
        self.lock().scores.extend(scores);
        Ok(())
    }

    fn scores_by_city_and_date(&self, city: &str, date: NaiveDate) -> Result<Vec<AccuracyScore>> {
        Ok(self
            .lock()
            .scores
            .iter()
            .filter(|s| s.city == city && s.target_date == date)
            .cloned()
            .collect())
    }

    fn scores_by_city_and_date_after(
        &self,
        city: &str,
        date: NaiveDate,
    ) -> Result<Vec<AccuracyScore>> {
        Ok(self
            .lock()
            .scores
            .iter()
            .filter(|s| s.city == city && s.target_date > date)
            .cloned()
            .collect())
    }

    fn scores_by_city_horizon_and_date_after(
        &self,
        city: &str,
        horizon: i64,
        date: NaiveDate,
    ) -> Result<Vec<AccuracyScore>> {
        Ok(self
            .lock()
            .scores
            .iter()
            .filter(|s| s.city == city && s.forecast_horizon == horizon && s.target_date > date)
            .cloned()
            .collect())
    }

    fn distinct_horizons_and_dates_for_city(
        &self,
        city: &str,
    ) -> Result<Vec<(i64, NaiveDate)>> {
        let mut pairs: Vec<(i64, NaiveDate)> = self
            .lock()
            .scores
            .iter()
            .filter(|s| s.city == city)
            .map(|s| (s.forecast_horizon, s.target_date))
            .collect();
        pairs.sort();
        pairs.dedup();
        Ok(pairs)
    }
}
