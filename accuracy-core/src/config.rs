//! On-disk configuration: cities, providers and their URL templates.
//!
//! Templates contain `{placeholder}` tokens substituted from city fields,
//! provider fields and the environment. An unresolvable placeholder aborts
//! only the request being built, never the whole collection run.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not determine platform config directory")]
    NoConfigDir,

    #[error("Parameter '{name}' not found in config or environment for URL: {template}")]
    MissingPlaceholder { name: String, template: String },
}

/// A city to collect forecasts and observations for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// METAR station identifier, e.g. "LQSA".
    pub icao_code: String,
}

/// One forecast provider's endpoints and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Must match a registered parser name, e.g. "AccuWeather".
    pub name: String,
    /// Forecast URL template.
    pub url: String,
    /// Two-step providers resolve a location key through this template first.
    pub location_url: Option<String>,
    /// Fallback API key; the `<PROVIDER>_API_KEY` environment variable is
    /// preferred.
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Environment variable consulted for this provider's API key, e.g.
    /// `ACCUWEATHER_API_KEY` or `YR_NO_API_KEY`.
    pub fn api_key_env_var(&self) -> String {
        let mut var: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        var.push_str("_API_KEY");
        var
    }

    fn api_key(&self) -> Option<String> {
        match std::env::var(self.api_key_env_var()) {
            Ok(key) if !key.is_empty() => Some(key),
            _ => {
                if self.api_key.is_some() {
                    tracing::warn!(
                        "Environment variable {} not set. Falling back to configured key.",
                        self.api_key_env_var()
                    );
                }
                self.api_key.clone()
            }
        }
    }
}

/// Source of actual METAR observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationSourceConfig {
    /// URL template with an `{icao_codes}` placeholder for the
    /// comma-joined station list.
    pub url: String,
}

/// Top-level configuration stored on disk as TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub cities: Vec<CityConfig>,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    pub observation_source: Option<ObservationSourceConfig>,
}

impl Config {
    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load config from the platform config directory, or return an empty
    /// default if no file exists yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        let dirs =
            ProjectDirs::from("ba", "weather-accuracy", "accuracy").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn city(&self, name: &str) -> Option<&CityConfig> {
        self.cities.iter().find(|c| c.name == name)
    }

    pub fn city_by_icao(&self, icao_code: &str) -> Option<&CityConfig> {
        self.cities.iter().find(|c| c.icao_code == icao_code)
    }
}

/// Substitute every `{placeholder}` in `template`.
///
/// Lookup order: the `extra` map (request-scoped values like a resolved
/// location key or the joined ICAO list), then city fields, then provider
/// fields. `{apiKey}` prefers the provider's environment variable over the
/// configured fallback. Any unresolved placeholder fails the whole render.
pub fn render_url(
    template: &str,
    city: Option<&CityConfig>,
    provider: Option<&ProviderConfig>,
    extra: &HashMap<&str, String>,
) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let (before, after_open) = rest.split_at(open);
        result.push_str(before);

        let Some(close) = after_open.find('}') else {
            // Unbalanced brace; keep the tail verbatim.
            result.push_str(after_open);
            rest = "";
            break;
        };

        let name = &after_open[1..close];
        let value = lookup_placeholder(name, city, provider, extra).ok_or_else(|| {
            ConfigError::MissingPlaceholder {
                name: name.to_string(),
                template: template.to_string(),
            }
        })?;
        result.push_str(&value);

        rest = &after_open[close + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

fn lookup_placeholder(
    name: &str,
    city: Option<&CityConfig>,
    provider: Option<&ProviderConfig>,
    extra: &HashMap<&str, String>,
) -> Option<String> {
    if let Some(value) = extra.get(name) {
        return Some(value.clone());
    }

    if name == "apiKey" {
        return provider.and_then(ProviderConfig::api_key);
    }

    if let Some(city) = city {
        match name {
            "name" => return Some(city.name.clone()),
            "latitude" => return Some(city.latitude.to_string()),
            "longitude" => return Some(city.longitude.to_string()),
            "icao_code" => return Some(city.icao_code.clone()),
            _ => {}
        }
    }

    if let Some(provider) = provider {
        match name {
            "url" => return Some(provider.url.clone()),
            "locationUrl" => return provider.location_url.clone(),
            _ => {}
        }
    }

    None
}
