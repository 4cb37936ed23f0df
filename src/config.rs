//! Process-wide configuration.
//!
//! Layering: built-in defaults → JSON file → environment → CLI flags.
//! Read-only once the orchestrator is built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv { key: &'static str, value: String },
}

/// City/state/postal-code triple appended to queries to bias providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeRegion {
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl Default for HomeRegion {
    fn default() -> Self {
        Self {
            city: "Kochi".into(),
            state: "Kerala".into(),
            postal_code: "682025".into(),
        }
    }
}

/// API keys for the upstream providers. A missing key removes that provider
/// from the resolver chain.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCredentials {
    pub google_maps_api_key: Option<String>,
    pub serpapi_key: Option<String>,
    pub opencage_api_key: Option<String>,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(key: &Option<String>) -> &'static str {
            if key.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("ProviderCredentials")
            .field("google_maps_api_key", &mask(&self.google_maps_api_key))
            .field("serpapi_key", &mask(&self.serpapi_key))
            .field("opencage_api_key", &mask(&self.opencage_api_key))
            .finish()
    }
}

/// Regional bias passed to the search providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchBias {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u8,
    /// CLDR region code for Google Places (e.g. "IN").
    pub region_code: String,
    pub language_code: String,
    /// ISO country filter for OpenCage (lowercase, e.g. "in").
    pub country_code: String,
}

impl Default for SearchBias {
    fn default() -> Self {
        Self {
            latitude: 9.931233,
            longitude: 76.267304,
            zoom: 15,
            region_code: "IN".into(),
            language_code: "en".into(),
            country_code: "in".into(),
        }
    }
}

/// A literal postal-code substitution for a known miscoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalCorrection {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub home_region: HomeRegion,
    pub credentials: ProviderCredentials,
    pub per_call_timeout_secs: u64,
    pub search_bias: SearchBias,
    /// Address parts dropped before geocoding because they degrade precision.
    pub noisy_tokens: Vec<String>,
    pub postal_corrections: Vec<PostalCorrection>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home_region: HomeRegion::default(),
            credentials: ProviderCredentials::default(),
            per_call_timeout_secs: 10,
            search_bias: SearchBias::default(),
            noisy_tokens: vec!["India".into(), "Ernakulam".into()],
            postal_corrections: vec![PostalCorrection {
                from: "371302".into(),
                to: "682025".into(),
            }],
        }
    }
}

impl Config {
    /// Load defaults, then the config file (explicit path, or the default
    /// path when it exists), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `<config_dir>/reel-locator/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("reel-locator").join("config.json"))
    }

    /// Overlay environment variables. `lookup` is injectable for tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("GOOGLE_MAPS_API_KEY") {
            self.credentials.google_maps_api_key = Some(v);
        }
        if let Some(v) = non_empty("SERPAPI_KEY") {
            self.credentials.serpapi_key = Some(v);
        }
        if let Some(v) = non_empty("OPENCAGE_API_KEY") {
            self.credentials.opencage_api_key = Some(v);
        }
        if let Some(v) = non_empty("REEL_LOCATOR_HOME_CITY") {
            self.home_region.city = v;
        }
        if let Some(v) = non_empty("REEL_LOCATOR_HOME_STATE") {
            self.home_region.state = v;
        }
        if let Some(v) = non_empty("REEL_LOCATOR_HOME_POSTAL_CODE") {
            self.home_region.postal_code = v;
        }
        if let Some(v) = non_empty("REEL_LOCATOR_TIMEOUT_SECS") {
            self.per_call_timeout_secs = match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: "REEL_LOCATOR_TIMEOUT_SECS",
                        value: v,
                    })
                }
            };
        }
        Ok(())
    }

    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_secs(self.per_call_timeout_secs.max(1))
    }
}
