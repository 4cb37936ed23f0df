//! Place-search providers: Google Places (details by id, text search) and
//! SerpApi's Google Maps engine.
//!
//! Each provider turns its own payload into a `ResolvedPlace`. Payload
//! mapping is kept in plain functions so it can be tested without a network.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::maps_url;
use super::resolver::{PlaceIdResolver, PlaceResolver};
use super::types::{Coordinates, ProviderError, ResolvedPlace, SourceTag};
use crate::config::SearchBias;

const PLACES_BASE: &str = "https://places.googleapis.com/v1";
const PLACE_DETAILS_FIELDS: &str = "displayName,formattedAddress,location,googleMapsUri";
const TEXT_SEARCH_FIELDS: &str =
    "places.displayName,places.formattedAddress,places.location,places.googleMapsUri,places.id";
const SERPAPI_SEARCH: &str = "https://serpapi.com/search.json";
const USER_AGENT: &str = concat!("ReelLocator/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP agent; every call inherits the per-call timeout.
pub fn http_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Response JSON, including error bodies sent with a non-2xx status.
fn json_or_error_body(
    response: Result<ureq::Response, ureq::Error>,
) -> Result<serde_json::Value, ProviderError> {
    match response {
        Ok(r) => Ok(r.into_json()?),
        Err(ureq::Error::Status(code, r)) => match r.into_json::<serde_json::Value>() {
            Ok(body) if body.get("error").is_some() => Ok(body),
            _ => Err(ProviderError::from_status(code)),
        },
        Err(e) => Err(e.into()),
    }
}

/// `places/<id>` with the id as one escaped path segment.
fn place_details_url(place_id: &str) -> String {
    let mut url = Url::parse(PLACES_BASE).expect("static base URL");
    url.path_segments_mut()
        .expect("http URL has path segments")
        .push("places")
        .push(place_id);
    url.to_string()
}

/// `"<business>, <query>"` when a business name is known.
pub fn compose_query(query: &str, business_name: Option<&str>) -> String {
    match business_name.map(str::trim).filter(|b| !b.is_empty()) {
        Some(business) => format!("{}, {}", business, query),
        None => query.to_string(),
    }
}

// ─── Google Places ──────────────────────────────────────────────

#[derive(Deserialize, Debug, Default)]
struct LocalizedText {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct LatLng {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GooglePlace {
    #[serde(default)]
    display_name: Option<LocalizedText>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    location: Option<LatLng>,
    #[serde(default)]
    google_maps_uri: Option<String>,
}

impl GooglePlace {
    fn name(&self) -> Option<&str> {
        self.display_name.as_ref().and_then(|d| d.text.as_deref())
    }

    fn coordinates(&self) -> Option<Coordinates> {
        let loc = self.location.as_ref()?;
        Coordinates::new(loc.latitude, loc.longitude)
    }
}

#[derive(Deserialize, Debug)]
struct GoogleApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl GoogleApiError {
    fn into_provider_error(self) -> ProviderError {
        let message = self.message.unwrap_or_else(|| "no error message".into());
        match self.status.as_deref() {
            Some("PERMISSION_DENIED") | Some("UNAUTHENTICATED") => ProviderError::Credentials(message),
            // a bad key comes back as INVALID_ARGUMENT
            _ if message.contains("API key") => ProviderError::Credentials(message),
            _ => ProviderError::Rejected(message),
        }
    }
}

#[derive(Deserialize, Debug)]
struct PlaceDetailsResponse {
    #[serde(flatten)]
    place: GooglePlace,
    #[serde(default)]
    error: Option<GoogleApiError>,
}

#[derive(Deserialize, Debug)]
struct TextSearchResponse {
    #[serde(default)]
    places: Vec<GooglePlace>,
    #[serde(default)]
    error: Option<GoogleApiError>,
}

/// Map a place-details payload. With coordinates the link is synthesized
/// from name and position; without, the provider link or `fallback_url`.
fn place_from_details(
    payload: serde_json::Value,
    fallback_url: &str,
) -> Result<ResolvedPlace, ProviderError> {
    let response: PlaceDetailsResponse =
        serde_json::from_value(payload).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    if let Some(err) = response.error {
        return Err(err.into_provider_error());
    }

    let place = response.place;
    let name = place.name().unwrap_or("Unknown Place").to_string();
    let coordinates = place.coordinates();
    let maps_url = match coordinates {
        Some(at) => maps_url::search_url(&name, at),
        None => place
            .google_maps_uri
            .clone()
            .unwrap_or_else(|| fallback_url.to_string()),
    };

    Ok(ResolvedPlace {
        address: place
            .formatted_address
            .clone()
            .unwrap_or_else(|| "Unknown Address".into()),
        name,
        coordinates,
        maps_url: Some(maps_url),
        source: SourceTag::DirectId,
    })
}

/// First text-search candidate only.
fn place_from_text_search(
    payload: serde_json::Value,
    search_query: &str,
    query: &str,
) -> Result<ResolvedPlace, ProviderError> {
    let response: TextSearchResponse =
        serde_json::from_value(payload).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    if let Some(err) = response.error {
        return Err(err.into_provider_error());
    }

    let place = response.places.into_iter().next().ok_or(ProviderError::NoResults)?;
    let at = place.coordinates().ok_or(ProviderError::MissingCoordinates)?;
    let name = place.name().unwrap_or(search_query).to_string();
    let maps_url = place
        .google_maps_uri
        .clone()
        .unwrap_or_else(|| maps_url::search_url(&name, at));

    Ok(ResolvedPlace {
        address: place.formatted_address.clone().unwrap_or_else(|| query.to_string()),
        name,
        coordinates: Some(at),
        maps_url: Some(maps_url),
        source: SourceTag::PlacesText,
    })
}

/// Google Places API (New): place details and text search.
pub struct GooglePlaces {
    agent: ureq::Agent,
    api_key: String,
    bias: SearchBias,
}

impl GooglePlaces {
    pub fn new(agent: ureq::Agent, api_key: impl Into<String>, bias: SearchBias) -> Self {
        Self { agent, api_key: api_key.into(), bias }
    }
}

impl PlaceIdResolver for GooglePlaces {
    fn provider(&self) -> &'static str {
        "google_places_details"
    }

    fn lookup_id(&self, place_id: &str, fallback_url: &str) -> Result<ResolvedPlace, ProviderError> {
        let response = self
            .agent
            .get(&place_details_url(place_id))
            .set("Content-Type", "application/json")
            .set("X-Goog-Api-Key", &self.api_key)
            .set("X-Goog-FieldMask", PLACE_DETAILS_FIELDS)
            .call();
        let payload = json_or_error_body(response)?;
        debug!(place_id, %payload, "place details response");

        let place = place_from_details(payload, fallback_url)?;
        info!(place_id, name = %place.name, "place details resolved");
        Ok(place)
    }
}

impl PlaceResolver for GooglePlaces {
    fn provider(&self) -> &'static str {
        "google_places_text"
    }

    fn lookup(&self, query: &str, business_name: Option<&str>) -> Result<ResolvedPlace, ProviderError> {
        let search_query = compose_query(query, business_name);
        info!(query = %search_query, "searching Google Places");

        let response = self
            .agent
            .post(&format!("{}/places:searchText", PLACES_BASE))
            .set("X-Goog-Api-Key", &self.api_key)
            .set("X-Goog-FieldMask", TEXT_SEARCH_FIELDS)
            .send_json(json!({
                "textQuery": search_query,
                "languageCode": self.bias.language_code,
                "regionCode": self.bias.region_code,
            }));
        let payload = json_or_error_body(response)?;
        debug!(%payload, "Google Places response");

        place_from_text_search(payload, &search_query, query)
    }
}

// ─── SerpApi (Google Maps engine) ───────────────────────────────

#[derive(Deserialize, Debug, Default)]
struct GpsCoordinates {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
struct SerpLinks {
    #[serde(default)]
    place_results: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct SerpPlace {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    gps_coordinates: Option<GpsCoordinates>,
    #[serde(default)]
    place_id_search: Option<String>,
    #[serde(default)]
    links: Option<SerpLinks>,
}

#[derive(Deserialize, Debug)]
struct SerpApiResponse {
    #[serde(default)]
    place_results: Option<SerpPlace>,
    #[serde(default)]
    local_results: Vec<SerpPlace>,
    #[serde(default)]
    error: Option<String>,
}

/// `place_results` wins over `local_results`; only the first local result
/// is considered.
fn place_from_serpapi(
    payload: serde_json::Value,
    search_query: &str,
    query: &str,
) -> Result<ResolvedPlace, ProviderError> {
    let response: SerpApiResponse =
        serde_json::from_value(payload).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let (place, link, source) = if let Some(place) = response.place_results {
        let link = place.place_id_search.clone();
        (place, link, SourceTag::SerpApiPlace)
    } else if let Some(place) = response.local_results.into_iter().next() {
        let link = place.links.as_ref().and_then(|l| l.place_results.clone());
        (place, link, SourceTag::SerpApiLocal)
    } else {
        return Err(match response.error {
            Some(msg) if msg.to_lowercase().contains("api key") => ProviderError::Credentials(msg),
            Some(msg) if !msg.to_lowercase().contains("hasn't returned any results") => {
                ProviderError::Rejected(msg)
            }
            _ => ProviderError::NoResults,
        });
    };

    let at = place
        .gps_coordinates
        .as_ref()
        .and_then(|g| Coordinates::new(g.latitude, g.longitude))
        .ok_or(ProviderError::MissingCoordinates)?;
    let name = place.title.clone().unwrap_or_else(|| search_query.to_string());
    let maps_url = link.unwrap_or_else(|| maps_url::search_url(&name, at));

    Ok(ResolvedPlace {
        address: place.address.clone().unwrap_or_else(|| query.to_string()),
        name,
        coordinates: Some(at),
        maps_url: Some(maps_url),
        source,
    })
}

pub struct SerpApiMaps {
    agent: ureq::Agent,
    api_key: String,
    bias: SearchBias,
}

impl SerpApiMaps {
    pub fn new(agent: ureq::Agent, api_key: impl Into<String>, bias: SearchBias) -> Self {
        Self { agent, api_key: api_key.into(), bias }
    }

    fn viewport(&self) -> String {
        format!("@{},{},{}z", self.bias.latitude, self.bias.longitude, self.bias.zoom)
    }
}

impl PlaceResolver for SerpApiMaps {
    fn provider(&self) -> &'static str {
        "serpapi_google_maps"
    }

    fn lookup(&self, query: &str, business_name: Option<&str>) -> Result<ResolvedPlace, ProviderError> {
        let search_query = compose_query(query, business_name);
        info!(query = %search_query, "searching SerpApi Google Maps");

        let response = self
            .agent
            .get(SERPAPI_SEARCH)
            .query("engine", "google_maps")
            .query("q", &search_query)
            .query("ll", &self.viewport())
            .query("type", "search")
            .query("api_key", &self.api_key)
            .call();

        // SerpApi reports bad keys and empty searches as JSON with an error status
        let payload = json_or_error_body(response)?;
        debug!(%payload, "SerpApi response");

        place_from_serpapi(payload, &search_query, query)
    }
}
