//! Last-resort geocoding: OpenCage, then Google Geocoding.
//!
//! Geocoders only return coordinates; the orchestrator synthesizes the map
//! link from them.

use serde::Deserialize;
use tracing::{debug, info};

use super::resolver::{log_provider_error, PlaceResolver};
use super::types::{Coordinates, ProviderError, ResolvedPlace, SourceTag};
use crate::config::HomeRegion;

const OPENCAGE_URL: &str = "https://api.opencagedata.com/geocode/v1/json";
const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

pub trait Geocoder: Send + Sync {
    fn provider(&self) -> &'static str;

    fn geocode(&self, address: &str) -> Result<Coordinates, ProviderError>;
}

// ─── OpenCage ───────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct OpenCageGeometry {
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct OpenCageResult {
    geometry: Option<OpenCageGeometry>,
}

#[derive(Deserialize, Debug)]
struct OpenCageStatus {
    code: u16,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize, Debug)]
struct OpenCageResponse {
    #[serde(default)]
    results: Vec<OpenCageResult>,
    status: Option<OpenCageStatus>,
}

fn coordinates_from_opencage(payload: serde_json::Value) -> Result<Coordinates, ProviderError> {
    let response: OpenCageResponse =
        serde_json::from_value(payload).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    if let Some(status) = response.status.filter(|s| s.code != 200) {
        return Err(match status.code {
            401 | 403 => ProviderError::Credentials(status.message),
            code => ProviderError::Status(code),
        });
    }
    let first = response.results.into_iter().next().ok_or(ProviderError::NoResults)?;
    let geometry = first.geometry.ok_or(ProviderError::MissingCoordinates)?;
    Coordinates::new(geometry.lat, geometry.lng).ok_or(ProviderError::MissingCoordinates)
}

pub struct OpenCage {
    agent: ureq::Agent,
    api_key: String,
    country_code: String,
}

impl OpenCage {
    pub fn new(agent: ureq::Agent, api_key: impl Into<String>, country_code: impl Into<String>) -> Self {
        Self {
            agent,
            api_key: api_key.into(),
            country_code: country_code.into(),
        }
    }
}

impl Geocoder for OpenCage {
    fn provider(&self) -> &'static str {
        "opencage"
    }

    fn geocode(&self, address: &str) -> Result<Coordinates, ProviderError> {
        let payload: serde_json::Value = self
            .agent
            .get(OPENCAGE_URL)
            .query("q", address)
            .query("key", &self.api_key)
            .query("limit", "1")
            .query("countrycode", &self.country_code)
            .call()?
            .into_json()?;
        debug!(%payload, "OpenCage response");
        coordinates_from_opencage(payload)
    }
}

// ─── Google Geocoding ───────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct GoogleLocation {
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct GoogleGeometry {
    location: Option<GoogleLocation>,
}

#[derive(Deserialize, Debug)]
struct GoogleGeocodeResult {
    geometry: Option<GoogleGeometry>,
}

#[derive(Deserialize, Debug)]
struct GoogleGeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleGeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

fn coordinates_from_google(payload: serde_json::Value) -> Result<Coordinates, ProviderError> {
    let response: GoogleGeocodeResponse =
        serde_json::from_value(payload).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    let message = || response.error_message.clone().unwrap_or_else(|| response.status.clone());
    match response.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => return Err(ProviderError::NoResults),
        "REQUEST_DENIED" => return Err(ProviderError::Credentials(message())),
        _ => return Err(ProviderError::Rejected(message())),
    }
    let location = response
        .results
        .into_iter()
        .next()
        .ok_or(ProviderError::NoResults)?
        .geometry
        .and_then(|g| g.location)
        .ok_or(ProviderError::MissingCoordinates)?;
    Coordinates::new(location.lat, location.lng).ok_or(ProviderError::MissingCoordinates)
}

pub struct GoogleGeocoder {
    agent: ureq::Agent,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(agent: ureq::Agent, api_key: impl Into<String>) -> Self {
        Self { agent, api_key: api_key.into() }
    }
}

impl Geocoder for GoogleGeocoder {
    fn provider(&self) -> &'static str {
        "google_geocoding"
    }

    fn geocode(&self, address: &str) -> Result<Coordinates, ProviderError> {
        let payload: serde_json::Value = self
            .agent
            .get(GOOGLE_GEOCODE_URL)
            .query("address", address)
            .query("key", &self.api_key)
            .call()?
            .into_json()?;
        debug!(%payload, "Google Geocoding response");
        coordinates_from_google(payload)
    }
}

// ─── Chain step ─────────────────────────────────────────────────

/// Final resolver step. Tries each geocoder in order on a refined query.
pub struct GeocodingResolver {
    geocoders: Vec<Box<dyn Geocoder>>,
    region: HomeRegion,
    noisy_tokens: Vec<String>,
}

impl GeocodingResolver {
    pub fn new(geocoders: Vec<Box<dyn Geocoder>>, region: HomeRegion, noisy_tokens: Vec<String>) -> Self {
        Self { geocoders, region, noisy_tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.geocoders.is_empty()
    }

    /// Drop noisy comma-separated parts, then re-qualify with the home region.
    pub fn refine(&self, query: &str) -> String {
        let kept: Vec<&str> = query
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .filter(|part| !self.noisy_tokens.iter().any(|t| t.eq_ignore_ascii_case(part)))
            .collect();
        self.region.qualify(&kept.join(", "))
    }
}

impl PlaceResolver for GeocodingResolver {
    fn provider(&self) -> &'static str {
        "geocoding"
    }

    fn lookup(&self, query: &str, _business_name: Option<&str>) -> Result<ResolvedPlace, ProviderError> {
        let refined = self.refine(query);
        info!(query = %refined, "geocoding fallback");

        let mut last_error = ProviderError::NoResults;
        for geocoder in &self.geocoders {
            match geocoder.geocode(&refined) {
                Ok(at) => {
                    info!(provider = geocoder.provider(), lat = at.lat, lon = at.lon, "geocoded");
                    return Ok(ResolvedPlace {
                        name: query.to_string(),
                        address: query.to_string(),
                        coordinates: Some(at),
                        maps_url: None,
                        source: SourceTag::GeocodingFallback,
                    });
                }
                Err(e) => {
                    log_provider_error(geocoder.provider(), &e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
