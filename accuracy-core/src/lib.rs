//! Core library for the weather forecast accuracy pipeline.
//!
//! This crate defines:
//! - Provider-specific parsers normalizing heterogeneous forecast payloads
//!   into canonical per-day records
//! - A METAR-text classifier deriving weather category and precipitation
//!   estimates from raw aviation weather strings
//! - The accuracy analysis joining forecasts against actual daily
//!   observations and the query-time provider ranking
//! - Configuration, ingestion and the storage boundary they run against
//!
//! It is used by `accuracy-cli`, but can also be reused by other binaries or
//! services.

pub mod analysis;
pub mod classifier;
pub mod config;
pub mod ingest;
pub mod model;
pub mod parser;
pub mod ranking;
pub mod storage;
pub mod time;

pub use analysis::AccuracyAnalyzer;
pub use config::{CityConfig, Config, ConfigError, ObservationSourceConfig, ProviderConfig};
pub use ingest::{DataCollector, HttpFetch, LocationKeyCache, ReqwestFetcher};
pub use model::{
    AccuracyScore, ActualObservation, FilterOptions, ForecastRecord, PrecipitationScore,
    ProviderScoreSummary, WeatherCategory,
};
pub use parser::{ForecastParser, ParserRegistry, ProviderId};
pub use ranking::RankingAggregator;
pub use storage::{MemoryStorage, Storage};
