//! Query-time aggregation of stored accuracy scores into provider rankings.

use crate::model::{AccuracyScore, FilterOptions, ProviderScoreSummary};
use crate::storage::Storage;
use crate::time::today_local;
use anyhow::Result;
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

/// Produces ranked per-provider summaries and flat detail listings over a
/// filtered slice of stored scores.
pub struct RankingAggregator<'a, S: Storage> {
    storage: &'a S,
}

impl<'a, S: Storage> RankingAggregator<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Per-provider aggregates, ranked by overall score descending.
    ///
    /// `overall = (100 - avg_temp_deviation * 10) + precip_accuracy * 10`,
    /// deliberately unclamped.
    pub fn ranked_summary(
        &self,
        city: &str,
        days: i64,
        horizon: Option<i64>,
        target_date: Option<NaiveDate>,
    ) -> Result<Vec<ProviderScoreSummary>> {
        let scores = self.fetch_scores(city, days, horizon, target_date)?;

        let mut by_provider: HashMap<String, Vec<AccuracyScore>> = HashMap::new();
        for score in scores {
            by_provider.entry(score.provider_name.clone()).or_default().push(score);
        }

        let mut summaries: Vec<ProviderScoreSummary> = by_provider
            .into_iter()
            .map(|(provider_name, scores)| summarize(provider_name, &scores))
            .collect();

        summaries.sort_by(|a, b| {
            b.overall_score
                .partial_cmp(&a.overall_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(summaries)
    }

    /// Filtered scores sorted by target date descending, then horizon
    /// ascending.
    pub fn detailed_scores(
        &self,
        city: &str,
        days: i64,
        horizon: Option<i64>,
        target_date: Option<NaiveDate>,
    ) -> Result<Vec<AccuracyScore>> {
        let mut scores = self.fetch_scores(city, days, horizon, target_date)?;
        scores.sort_by(|a, b| {
            b.target_date
                .cmp(&a.target_date)
                .then(a.forecast_horizon.cmp(&b.forecast_horizon))
        });
        Ok(scores)
    }

    /// Distinct horizons (ascending) and dates (descending) with scores for
    /// a city, for populating query filters.
    pub fn available_filters(&self, city: &str) -> Result<FilterOptions> {
        let pairs = self.storage.distinct_horizons_and_dates_for_city(city)?;

        let mut horizons: Vec<i64> = pairs.iter().map(|(h, _)| *h).collect();
        horizons.sort_unstable();
        horizons.dedup();

        let mut dates: Vec<NaiveDate> = pairs.iter().map(|(_, d)| *d).collect();
        dates.sort_unstable();
        dates.dedup();
        dates.reverse();

        Ok(FilterOptions { horizons, dates })
    }

    /// Selection precedence: exact target date overrides everything; an
    /// horizon filter applies within the trailing window; otherwise the
    /// whole trailing window is returned.
    fn fetch_scores(
        &self,
        city: &str,
        days: i64,
        horizon: Option<i64>,
        target_date: Option<NaiveDate>,
    ) -> Result<Vec<AccuracyScore>> {
        if let Some(date) = target_date {
            return self.storage.scores_by_city_and_date(city, date);
        }

        let start_date = today_local() - Duration::days(days);
        if let Some(horizon) = horizon {
            return self
                .storage
                .scores_by_city_horizon_and_date_after(city, horizon, start_date);
        }
        self.storage.scores_by_city_and_date_after(city, start_date)
    }
}

fn summarize(provider_name: String, scores: &[AccuracyScore]) -> ProviderScoreSummary {
    let average_temp_deviation = if scores.is_empty() {
        0.0
    } else {
        scores
            .iter()
            .map(|s| (s.min_temp_deviation.abs() + s.max_temp_deviation.abs()) / 2.0)
            .sum::<f64>()
            / scores.len() as f64
    };

    let total_precipitation_scores = scores
        .iter()
        .filter(|s| s.precipitation_score.is_some())
        .count();
    let correct_precipitation_scores = scores
        .iter()
        .filter(|s| s.precipitation_score.is_some_and(|p| p.is_correct()))
        .count();

    let precipitation_accuracy = if total_precipitation_scores == 0 {
        0.0
    } else {
        correct_precipitation_scores as f64 / total_precipitation_scores as f64
    };

    let overall_score = (100.0 - average_temp_deviation * 10.0) + precipitation_accuracy * 10.0;

    ProviderScoreSummary {
        provider_name,
        overall_score,
        average_temp_deviation,
        precipitation_accuracy,
    }
}
