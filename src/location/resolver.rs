//! Resolution orchestrator: runs the fallback chain.
//!
//! Place link:  direct-ID lookup → done (any failure is terminal)
//! Post link:   caption → parse → normalize → Google Places → SerpApi → geocoding

use serde::Serialize;
use tracing::{error, info, warn};

use super::geocoding::{GeocodingResolver, Geocoder, GoogleGeocoder, OpenCage};
use super::maps_url;
use super::providers::{http_agent, GooglePlaces, SerpApiMaps};
use super::types::{LocateError, ProviderError, ResolvedPlace};
use crate::caption::{CaptionSource, RawCaption, WebCaptionSource};
use crate::config::Config;
use crate::text::{DescriptionParser, EntityExtractor, HeuristicRecognizer, ParsedCaption, TextNormalizer};

/// One step of the resolver chain.
pub trait PlaceResolver: Send + Sync {
    fn provider(&self) -> &'static str;

    fn lookup(&self, query: &str, business_name: Option<&str>) -> Result<ResolvedPlace, ProviderError>;

    /// `lookup` with failures logged and folded into `None`. A place without
    /// coordinates counts as a miss.
    fn resolve(&self, query: &str, business_name: Option<&str>) -> Option<ResolvedPlace> {
        match self.lookup(query, business_name) {
            Ok(place) if place.has_coordinates() => Some(place),
            Ok(_) => {
                log_provider_error(self.provider(), &ProviderError::MissingCoordinates);
                None
            }
            Err(e) => {
                log_provider_error(self.provider(), &e);
                None
            }
        }
    }
}

/// Lookup by provider place identifier.
pub trait PlaceIdResolver: Send + Sync {
    fn provider(&self) -> &'static str;

    /// `fallback_url` is the link to keep when the provider has no better one.
    fn lookup_id(&self, place_id: &str, fallback_url: &str) -> Result<ResolvedPlace, ProviderError>;
}

/// Credential problems need an operator; everything else is routine.
pub fn log_provider_error(provider: &str, e: &ProviderError) {
    if e.is_fatal_config() {
        error!(provider, class = e.class(), error = %e, "provider credentials rejected");
    } else {
        warn!(provider, class = e.class(), error = %e, "provider step failed");
    }
}

// ─── Request reference ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// A social-media post whose caption must be fetched.
    Post(String),
    /// A SerpApi link that already names a place.
    PlaceLink { place_id: String, maps_url: String },
}

impl Reference {
    pub fn parse(text: &str) -> Result<Self, LocateError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LocateError::Validation("Instagram reel URL is required".into()));
        }
        if maps_url::is_serpapi_link(text) {
            return match maps_url::serpapi_place_id(text) {
                Some(place_id) => Ok(Self::PlaceLink {
                    place_id,
                    maps_url: text.to_string(),
                }),
                None => Err(LocateError::Validation("SerpAPI link has no place_id".into())),
            };
        }
        if text.contains("instagram.com") {
            return Ok(Self::Post(text.to_string()));
        }
        Err(LocateError::Validation(
            "Please provide a valid Instagram reel URL or SerpAPI URL".into(),
        ))
    }
}

// ─── Orchestrator ───────────────────────────────────────────────

/// Parsed caption plus the query it normalizes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionAnalysis {
    #[serde(flatten)]
    pub parsed: ParsedCaption,
    pub query: String,
}

/// Immutable once built; share it behind an `Arc`.
pub struct ResolutionOrchestrator {
    captions: Box<dyn CaptionSource>,
    entities: EntityExtractor,
    normalizer: TextNormalizer,
    place_ids: Option<Box<dyn PlaceIdResolver>>,
    chain: Vec<Box<dyn PlaceResolver>>,
}

impl ResolutionOrchestrator {
    /// An orchestrator with an empty chain.
    pub fn new(captions: Box<dyn CaptionSource>, entities: EntityExtractor, normalizer: TextNormalizer) -> Self {
        Self {
            captions,
            entities,
            normalizer,
            place_ids: None,
            chain: Vec::new(),
        }
    }

    /// Wire the default collaborators and every provider that has a key.
    pub fn from_config(config: &Config) -> Self {
        let timeout = config.per_call_timeout();
        let agent = http_agent(timeout);
        let creds = &config.credentials;

        let mut orchestrator = Self::new(
            Box::new(WebCaptionSource::new(timeout)),
            EntityExtractor::new(Box::new(HeuristicRecognizer::new(&config.home_region))),
            TextNormalizer::new(config.home_region.clone(), &config.postal_corrections),
        );

        match creds.google_maps_api_key.as_deref() {
            Some(key) => {
                orchestrator = orchestrator
                    .with_place_id_resolver(Box::new(GooglePlaces::new(
                        agent.clone(),
                        key,
                        config.search_bias.clone(),
                    )))
                    .with_resolver(Box::new(GooglePlaces::new(agent.clone(), key, config.search_bias.clone())));
            }
            None => warn!("GOOGLE_MAPS_API_KEY not set; Google Places lookups disabled"),
        }

        match creds.serpapi_key.as_deref() {
            Some(key) => {
                orchestrator = orchestrator
                    .with_resolver(Box::new(SerpApiMaps::new(agent.clone(), key, config.search_bias.clone())));
            }
            None => warn!("SERPAPI_KEY not set; SerpApi search disabled"),
        }

        let mut geocoders: Vec<Box<dyn Geocoder>> = Vec::new();
        if let Some(key) = creds.opencage_api_key.as_deref() {
            geocoders.push(Box::new(OpenCage::new(agent.clone(), key, config.search_bias.country_code.clone())));
        } else {
            warn!("OPENCAGE_API_KEY not set; OpenCage geocoding disabled");
        }
        if let Some(key) = creds.google_maps_api_key.as_deref() {
            geocoders.push(Box::new(GoogleGeocoder::new(agent, key)));
        }
        let geocoding = GeocodingResolver::new(geocoders, config.home_region.clone(), config.noisy_tokens.clone());
        if !geocoding.is_empty() {
            orchestrator = orchestrator.with_resolver(Box::new(geocoding));
        }

        info!(chain = ?orchestrator.chain_providers(), "resolver chain ready");
        orchestrator
    }

    pub fn with_captions(mut self, captions: Box<dyn CaptionSource>) -> Self {
        self.captions = captions;
        self
    }

    pub fn with_place_id_resolver(mut self, resolver: Box<dyn PlaceIdResolver>) -> Self {
        self.place_ids = Some(resolver);
        self
    }

    /// Append a step; steps run in insertion order.
    pub fn with_resolver(mut self, resolver: Box<dyn PlaceResolver>) -> Self {
        self.chain.push(resolver);
        self
    }

    pub fn chain_providers(&self) -> Vec<&'static str> {
        self.chain.iter().map(|r| r.provider()).collect()
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    /// Full pipeline for one request reference.
    pub fn locate(&self, reference: &str) -> Result<ResolvedPlace, LocateError> {
        match Reference::parse(reference)? {
            Reference::PlaceLink { place_id, maps_url } => self.locate_place_id(&place_id, &maps_url),
            Reference::Post(post) => {
                let caption = self.captions.fetch_caption(&post).map_err(|e| {
                    warn!(post = %post, error = %e, "caption retrieval failed");
                    LocateError::ExtractionFailed
                })?;
                self.locate_caption(&caption)
            }
        }
    }

    /// Direct-ID path. Anything short of coordinates is terminal.
    pub fn locate_place_id(&self, place_id: &str, known_url: &str) -> Result<ResolvedPlace, LocateError> {
        info!(place_id, "resolving place link directly");
        let failed = |link: Option<String>| LocateError::DirectIdFailed {
            maps_url: maps_url::finalize_maps_url(link),
        };

        let Some(resolver) = &self.place_ids else {
            warn!("place link received but no place-id resolver is configured");
            return Err(failed(Some(known_url.to_string())));
        };

        match resolver.lookup_id(place_id, known_url) {
            Ok(place) if place.has_coordinates() => Ok(finalize(place)),
            Ok(place) => {
                warn!(place_id, "place details carry no coordinates");
                Err(failed(place.maps_url.or_else(|| Some(known_url.to_string()))))
            }
            Err(e) => {
                log_provider_error(resolver.provider(), &e);
                Err(failed(Some(known_url.to_string())))
            }
        }
    }

    /// Parse and normalize without calling any provider.
    pub fn analyze_caption(&self, caption: &RawCaption) -> Option<CaptionAnalysis> {
        let parsed = DescriptionParser::new(&self.entities).parse(caption)?;
        let query = self.normalizer.normalize(&parsed.location_block);
        if query.is_empty() {
            return None;
        }
        Some(CaptionAnalysis { parsed, query })
    }

    /// A blank caption counts as a failed extraction.
    pub fn locate_caption(&self, caption: &RawCaption) -> Result<ResolvedPlace, LocateError> {
        if caption.is_blank() {
            return Err(LocateError::ExtractionFailed);
        }
        let analysis = self.analyze_caption(caption).ok_or(LocateError::NoLocationFound)?;
        info!(
            query = %analysis.query,
            business = ?analysis.parsed.business_name,
            origin = ?analysis.parsed.origin,
            "location block parsed"
        );
        self.resolve_query(&analysis.query, analysis.parsed.business_name.as_deref())
    }

    /// Walk the chain; first place with coordinates wins.
    pub fn resolve_query(&self, query: &str, business_name: Option<&str>) -> Result<ResolvedPlace, LocateError> {
        for resolver in &self.chain {
            if let Some(place) = resolver.resolve(query, business_name) {
                info!(provider = resolver.provider(), source = %place.source, name = %place.name, "resolved");
                return Ok(finalize(place));
            }
        }
        warn!(query, "no provider returned coordinates");
        Err(LocateError::CoordinatesNotFound { query: query.to_string() })
    }
}

/// Fill a missing link from the coordinates, then canonicalize it once.
fn finalize(mut place: ResolvedPlace) -> ResolvedPlace {
    if place.maps_url.is_none() {
        place.maps_url = place.coordinates.map(maps_url::coordinate_search_url);
    }
    place.maps_url = maps_url::finalize_maps_url(place.maps_url);
    place
}
