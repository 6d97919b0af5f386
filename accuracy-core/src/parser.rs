//! Provider-specific forecast parsing.
//!
//! Each provider ships a differently shaped payload; a [`ForecastParser`]
//! variant converts one payload into canonical per-day [`ForecastRecord`]s.
//! Parsers never fail the whole batch: a malformed sub-entry is logged and
//! skipped, a malformed payload yields an empty list. Adding a provider is
//! one new variant plus a registry entry.

use crate::model::ForecastRecord;
use crate::parser::{
    accuweather::AccuWeatherParser, openweathermap::OpenWeatherMapParser, yrno::YrNoParser,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt::Debug;

pub mod accuweather;
pub mod openweathermap;
pub mod yrno;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    AccuWeather,
    OpenWeatherMap,
    YrNo,
}

impl ProviderId {
    /// Stable identity key used by the registry and downstream grouping.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::AccuWeather => "AccuWeather",
            ProviderId::OpenWeatherMap => "OpenWeatherMap",
            ProviderId::YrNo => "YR.NO",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::AccuWeather,
            ProviderId::OpenWeatherMap,
            ProviderId::YrNo,
        ]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "AccuWeather" => Ok(ProviderId::AccuWeather),
            "OpenWeatherMap" => Ok(ProviderId::OpenWeatherMap),
            "YR.NO" => Ok(ProviderId::YrNo),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: AccuWeather, OpenWeatherMap, YR.NO."
            )),
        }
    }
}

/// Converts one provider's raw forecast payload into canonical records.
pub trait ForecastParser: Send + Sync + Debug {
    /// Stable provider name, matching [`ProviderId::as_str`].
    fn provider_name(&self) -> &'static str;

    /// Parse one raw payload for one city.
    ///
    /// Returns an empty list on malformed input; unparseable sub-entries are
    /// logged and skipped without aborting the rest of the payload.
    fn parse(
        &self,
        city: &str,
        raw_payload: &str,
        fetch_timestamp: DateTime<Utc>,
    ) -> Vec<ForecastRecord>;
}

/// Looks up the right [`ForecastParser`] by provider name.
#[derive(Debug, Default)]
pub struct ParserRegistry {
    parsers: HashMap<&'static str, Box<dyn ForecastParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Registry with all known provider parsers registered.
    pub fn with_all_providers() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(AccuWeatherParser));
        registry.register(Box::new(OpenWeatherMapParser));
        registry.register(Box::new(YrNoParser));
        registry
    }

    pub fn register(&mut self, parser: Box<dyn ForecastParser>) {
        self.parsers.insert(parser.provider_name(), parser);
    }

    pub fn get(&self, provider_name: &str) -> Option<&dyn ForecastParser> {
        self.parsers.get(provider_name).map(|parser| parser.as_ref())
    }

    pub fn contains(&self, provider_name: &str) -> bool {
        self.parsers.contains_key(provider_name)
    }
}
