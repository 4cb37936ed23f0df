use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::location::{LocateError, ResolvedPlace, SourceTag};

/// Body of every `/get_location` answer, success or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResponse {
    pub location_text: String,
    pub error: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub maps_url: Option<String>,
    pub source: SourceTag,
    pub address: Option<String>,
}

impl LocationResponse {
    fn failure(location_text: impl Into<String>, error: impl Into<String>, source: SourceTag) -> Self {
        Self {
            location_text: location_text.into(),
            error: Some(error.into()),
            lat: None,
            lon: None,
            maps_url: None,
            source,
            address: None,
        }
    }

    pub fn found(place: &ResolvedPlace) -> Self {
        let location_text = match place.source {
            SourceTag::GeocodingFallback => format!("Found via geocoding: {}", place.address),
            _ => format!("Found: {}", place.name),
        };
        Self {
            location_text,
            error: None,
            lat: place.lat(),
            lon: place.lon(),
            maps_url: place.maps_url.clone(),
            source: place.source,
            address: Some(place.address.clone()),
        }
    }

    pub fn failed(err: &LocateError) -> Self {
        let source = err.source_tag();
        match err {
            LocateError::Validation(msg) => Self::failure("Invalid URL format", msg.as_str(), source),
            LocateError::ExtractionFailed => Self::failure(
                "Could not extract description from Instagram reel",
                "Instagram may be restricting access or the reel has no description. Try a different reel.",
                source,
            ),
            LocateError::NoLocationFound => Self::failure(
                "No location information found in reel description",
                "The reel description doesn't contain recognizable location information",
                source,
            ),
            LocateError::CoordinatesNotFound { query } => Self {
                address: Some(query.clone()),
                ..Self::failure(
                    format!("Location identified but coordinates not found: {}", query),
                    "Could not determine precise coordinates for this location",
                    source,
                )
            },
            LocateError::DirectIdFailed { maps_url } => Self {
                maps_url: maps_url.clone(),
                ..Self::failure("Could not resolve the place link", "Place lookup by id failed", source)
            },
            LocateError::Internal(msg) => Self::failure(
                "Error processing Instagram reel",
                format!("Processing failed: {}", msg),
                source,
            ),
        }
    }

    pub fn request_error(detail: impl Into<String>) -> Self {
        Self::failure("Invalid request format", detail, SourceTag::RequestError)
    }

    pub fn server_error() -> Self {
        Self::failure(
            "Internal server error",
            "An unexpected error occurred. Please try again.",
            SourceTag::ServerError,
        )
    }

    pub fn status(&self) -> StatusCode {
        match self.source {
            SourceTag::ValidationError | SourceTag::RequestError => StatusCode::BAD_REQUEST,
            SourceTag::ExtractionFailed
            | SourceTag::NoLocationFound
            | SourceTag::CoordinatesNotFound
            | SourceTag::DirectIdError => StatusCode::UNPROCESSABLE_ENTITY,
            SourceTag::ProcessingError | SourceTag::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            SourceTag::DirectId
            | SourceTag::PlacesText
            | SourceTag::SerpApiPlace
            | SourceTag::SerpApiLocal
            | SourceTag::GeocodingFallback => StatusCode::OK,
        }
    }
}
