//! Core types for the resolution pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which provider and path produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceTag {
    #[serde(rename = "google_maps_api_place_id")]
    DirectId,
    #[serde(rename = "google_maps_api_error")]
    DirectIdError,
    #[serde(rename = "google_maps_api")]
    PlacesText,
    #[serde(rename = "serpapi_places")]
    SerpApiPlace,
    #[serde(rename = "serpapi_local")]
    SerpApiLocal,
    #[serde(rename = "geocoding_fallback")]
    GeocodingFallback,
    #[serde(rename = "no_location_found")]
    NoLocationFound,
    #[serde(rename = "coordinates_not_found")]
    CoordinatesNotFound,
    #[serde(rename = "extraction_failed")]
    ExtractionFailed,
    #[serde(rename = "validation_error")]
    ValidationError,
    #[serde(rename = "request_error")]
    RequestError,
    #[serde(rename = "processing_error")]
    ProcessingError,
    #[serde(rename = "server_error")]
    ServerError,
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectId => "google_maps_api_place_id",
            Self::DirectIdError => "google_maps_api_error",
            Self::PlacesText => "google_maps_api",
            Self::SerpApiPlace => "serpapi_places",
            Self::SerpApiLocal => "serpapi_local",
            Self::GeocodingFallback => "geocoding_fallback",
            Self::NoLocationFound => "no_location_found",
            Self::CoordinatesNotFound => "coordinates_not_found",
            Self::ExtractionFailed => "extraction_failed",
            Self::ValidationError => "validation_error",
            Self::RequestError => "request_error",
            Self::ProcessingError => "processing_error",
            Self::ServerError => "server_error",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// `None` unless both parts are present, finite and in range.
    pub fn new(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        let (lat, lon) = (lat?, lon?);
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }
}

/// A place as returned by one step of the resolver chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlace {
    pub name: String,
    pub address: String,
    pub coordinates: Option<Coordinates>,
    pub maps_url: Option<String>,
    pub source: SourceTag,
}

impl ResolvedPlace {
    pub fn has_coordinates(&self) -> bool {
        self.coordinates.is_some()
    }

    pub fn lat(&self) -> Option<f64> {
        self.coordinates.map(|c| c.lat)
    }

    pub fn lon(&self) -> Option<f64> {
        self.coordinates.map(|c| c.lon)
    }
}

/// A single provider's failure. Always recovered by advancing the chain.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unreachable: {0}")]
    Transport(String),

    #[error("provider rejected credentials: {0}")]
    Credentials(String),

    #[error("provider returned HTTP {0}")]
    Status(u16),

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider reported an error: {0}")]
    Rejected(String),

    #[error("no results")]
    NoResults,

    #[error("result has no coordinates")]
    MissingCoordinates,
}

impl ProviderError {
    /// Stable class used in structured logs.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Credentials(_) => "credentials",
            Self::Status(_) => "status",
            Self::Malformed(_) => "malformed",
            Self::Rejected(_) => "rejected",
            Self::NoResults => "no_results",
            Self::MissingCoordinates => "missing_coordinates",
        }
    }

    /// Non-2xx status without a usable body.
    pub fn from_status(code: u16) -> Self {
        match code {
            401 | 403 => Self::Credentials(format!("HTTP {}", code)),
            code => Self::Status(code),
        }
    }

    /// Needs an operator rather than a retry on a later request.
    pub fn is_fatal_config(&self) -> bool {
        matches!(self, Self::Credentials(_))
    }
}

impl From<ureq::Error> for ProviderError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, _) => Self::from_status(code),
            ureq::Error::Transport(t) => Self::Transport(t.to_string()),
        }
    }
}

impl From<std::io::Error> for ProviderError {
    // ureq surfaces body decode failures as io errors
    fn from(e: std::io::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Terminal outcomes of a request that did not produce coordinates.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("{0}")]
    Validation(String),

    #[error("could not extract description from the post")]
    ExtractionFailed,

    #[error("no location information found in the description")]
    NoLocationFound,

    #[error("location identified but coordinates not found: {query}")]
    CoordinatesNotFound { query: String },

    #[error("place lookup by id failed")]
    DirectIdFailed { maps_url: Option<String> },

    #[error("processing failed: {0}")]
    Internal(String),
}

impl LocateError {
    pub fn source_tag(&self) -> SourceTag {
        match self {
            Self::Validation(_) => SourceTag::ValidationError,
            Self::ExtractionFailed => SourceTag::ExtractionFailed,
            Self::NoLocationFound => SourceTag::NoLocationFound,
            Self::CoordinatesNotFound { .. } => SourceTag::CoordinatesNotFound,
            Self::DirectIdFailed { .. } => SourceTag::DirectIdError,
            Self::Internal(_) => SourceTag::ProcessingError,
        }
    }
}
