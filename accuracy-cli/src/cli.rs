use accuracy_core::{
    AccuracyAnalyzer, AccuracyScore, ActualObservation, Config, DataCollector, ForecastRecord,
    LocationKeyCache, MemoryStorage, ParserRegistry, RankingAggregator, ReqwestFetcher, Storage,
    classifier,
};
use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "accuracy", version, about = "Forecast accuracy pipeline CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify a METAR present-weather code.
    Classify {
        /// Weather code, e.g. "-TSRA".
        code: String,

        /// Full raw report for the cloud-cover fallback.
        #[arg(long)]
        raw_report: Option<String>,
    },

    /// Parse a provider payload file into canonical forecast records.
    Parse {
        /// Provider name, e.g. "AccuWeather", "OpenWeatherMap" or "YR.NO".
        provider: String,

        /// City the payload was fetched for.
        city: String,

        /// Path to the raw JSON payload.
        payload: PathBuf,
    },

    /// Run accuracy analysis for one date over JSON fixtures.
    Analyze {
        /// Target date, e.g. 2025-08-03.
        date: NaiveDate,

        /// JSON array of forecast records.
        #[arg(long)]
        forecasts: PathBuf,

        /// JSON array of actual observations.
        #[arg(long)]
        observations: PathBuf,
    },

    /// Rank providers from a JSON file of accuracy scores.
    Rank {
        /// City to rank providers for.
        city: String,

        /// JSON array of accuracy scores.
        #[arg(long)]
        scores: PathBuf,

        /// Trailing window in days.
        #[arg(long, default_value_t = 30)]
        days: i64,

        /// Optional exact forecast horizon in hours.
        #[arg(long)]
        horizon: Option<i64>,

        /// Optional exact target date; overrides the window and horizon.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Fetch live data using the configured providers.
    Fetch {
        /// Path to a TOML config; defaults to the platform config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Fetch METAR observations instead of forecasts.
        #[arg(long)]
        observations: bool,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Classify { code, raw_report } => {
                let mut category = classifier::classify_metar_text(&code);
                if category == accuracy_core::WeatherCategory::Clear {
                    if let Some(raw) = &raw_report {
                        category = classifier::classify_cloud_cover(raw);
                    }
                }
                let precipitation = classifier::estimate_precipitation_mm(&code);
                println!("{category:?} (~{precipitation} mm)");
            }

            Command::Parse {
                provider,
                city,
                payload,
            } => {
                let registry = ParserRegistry::with_all_providers();
                let parser = registry.get(&provider).ok_or_else(|| {
                    anyhow!("No parser registered for provider '{provider}'")
                })?;

                let raw = read_file(&payload)?;
                let records = parser.parse(&city, &raw, Utc::now());

                println!("{}", serde_json::to_string_pretty(&records)?);
                eprintln!("Parsed {} forecast record(s).", records.len());
            }

            Command::Analyze {
                date,
                forecasts,
                observations,
            } => {
                let forecasts: Vec<ForecastRecord> = read_json(&forecasts)?;
                let observations: Vec<ActualObservation> = read_json(&observations)?;

                let storage = MemoryStorage::new();
                storage.save_forecasts(forecasts)?;
                storage.save_observations(observations)?;

                let analyzer = AccuracyAnalyzer::new(&storage);
                let count = analyzer.analyze_accuracy_for_date(date)?;

                println!("{}", serde_json::to_string_pretty(&storage.all_scores())?);
                eprintln!("Generated {count} accuracy score(s) for {date}.");
            }

            Command::Rank {
                city,
                scores,
                days,
                horizon,
                date,
            } => {
                let scores: Vec<AccuracyScore> = read_json(&scores)?;

                let storage = MemoryStorage::new();
                storage.save_scores(scores)?;

                let aggregator = RankingAggregator::new(&storage);
                let summary = aggregator.ranked_summary(&city, days, horizon, date)?;
                let details = aggregator.detailed_scores(&city, days, horizon, date)?;

                println!("{}", serde_json::to_string_pretty(&summary)?);
                eprintln!("{} score(s) in the detail view:", details.len());
                eprintln!("{}", serde_json::to_string_pretty(&details)?);
            }

            Command::Fetch {
                config,
                observations,
            } => {
                let config = match config {
                    Some(path) => Config::load_from(&path)?,
                    None => Config::load()?,
                };

                let storage = MemoryStorage::new();
                let collector = DataCollector::new(
                    config,
                    ParserRegistry::with_all_providers(),
                    Arc::new(ReqwestFetcher::new()),
                    &storage,
                    Arc::new(LocationKeyCache::new()),
                );

                if observations {
                    let count = collector.collect_observations().await?;
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&storage.all_observations())?
                    );
                    eprintln!("Collected {count} observation(s).");
                } else {
                    let count = collector.collect_forecasts().await?;
                    println!("{}", serde_json::to_string_pretty(&storage.all_forecasts())?);
                    eprintln!("Collected {count} forecast record(s).");
                }
            }
        }

        Ok(())
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = read_file(path)?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse JSON file: {}", path.display()))
}
