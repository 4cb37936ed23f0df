use approx::assert_abs_diff_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use reel_locator::caption::StaticCaptionSource;
use reel_locator::config::Config;
use reel_locator::location::maps_url::coordinates_from_maps_url;
use reel_locator::location::{
    Coordinates, LocateError, PlaceResolver, ProviderError, ResolutionOrchestrator, ResolvedPlace, SourceTag,
};
use reel_locator::server::LocationResponse;
use reel_locator::text::{EntityExtractor, HeuristicRecognizer, TextNormalizer};

const POST: &str = "https://www.instagram.com/reel/C8abc12/?igsh=abc";

const CAPTION: &str = "Best shawarma in town 🔥

📍 Location: MG Road, Near City Mall
Ernakulam 371302

#kochifoodie #shawarma
Follow @grillhouse.kochi for more";

/// Records every query and answers from a script.
struct Scripted {
    name: &'static str,
    answer: fn(&str) -> Result<ResolvedPlace, ProviderError>,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl PlaceResolver for Scripted {
    fn provider(&self) -> &'static str {
        self.name
    }

    fn lookup(&self, query: &str, business_name: Option<&str>) -> Result<ResolvedPlace, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((query.to_string(), business_name.map(String::from)));
        (self.answer)(query)
    }
}

struct Tally {
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

fn scripted(name: &'static str, answer: fn(&str) -> Result<ResolvedPlace, ProviderError>) -> (Box<dyn PlaceResolver>, Tally) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let resolver = Scripted { name, answer, calls: calls.clone(), seen: seen.clone() };
    (Box::new(resolver), Tally { calls, seen })
}

fn base(caption: &str) -> ResolutionOrchestrator {
    let config = Config::default();
    ResolutionOrchestrator::new(
        Box::new(StaticCaptionSource::new(caption)),
        EntityExtractor::new(Box::new(HeuristicRecognizer::new(&config.home_region))),
        TextNormalizer::new(config.home_region.clone(), &config.postal_corrections),
    )
}

fn unreachable(_: &str) -> Result<ResolvedPlace, ProviderError> {
    Err(ProviderError::Transport("connection timed out".into()))
}

fn empty(_: &str) -> Result<ResolvedPlace, ProviderError> {
    Err(ProviderError::NoResults)
}

fn geocoded(query: &str) -> Result<ResolvedPlace, ProviderError> {
    Ok(ResolvedPlace {
        name: query.to_string(),
        address: query.to_string(),
        coordinates: Some(Coordinates { lat: 9.9816, lon: 76.2999 }),
        maps_url: None,
        source: SourceTag::GeocodingFallback,
    })
}

fn serpapi_local(_: &str) -> Result<ResolvedPlace, ProviderError> {
    Ok(ResolvedPlace {
        name: "Grill House".into(),
        address: "MG Road, Ernakulam".into(),
        coordinates: Some(Coordinates { lat: 9.9705, lon: 76.2851 }),
        maps_url: Some("https://serpapi.com/search.json?engine=google_maps&type=place&place_id=ChIJgrill".into()),
        source: SourceTag::SerpApiLocal,
    })
}

#[test]
fn test_caption_to_query() {
    let (resolver, tally) = scripted("places", empty);
    let orchestrator = base(CAPTION).with_resolver(resolver);
    let _ = orchestrator.locate(POST);

    let seen = tally.seen.lock().unwrap();
    assert_eq!(
        seen[0].0,
        "MG Road, Near City Mall Ernakulam 682025, Kochi, Kerala, 682025"
    );
    assert_eq!(seen[0].1.as_deref(), Some("grillhouse"));
}

#[test]
fn test_failing_providers_fall_through_to_geocoding() {
    let (places, p) = scripted("places", unreachable);
    let (serp, s) = scripted("serpapi", empty);
    let (geo, g) = scripted("geocoding", geocoded);
    let orchestrator = base(CAPTION).with_resolver(places).with_resolver(serp).with_resolver(geo);

    let place = orchestrator.locate(POST).unwrap();
    assert_eq!(place.source, SourceTag::GeocodingFallback);
    for tally in [&p, &s, &g] {
        assert_eq!(tally.calls.load(Ordering::SeqCst), 1);
    }

    // the synthesized link points back at the same coordinates
    let link = place.maps_url.as_deref().unwrap();
    let back = coordinates_from_maps_url(link).unwrap();
    assert_abs_diff_eq!(back.lat, 9.9816, epsilon = 1e-4);
    assert_abs_diff_eq!(back.lon, 76.2999, epsilon = 1e-4);

    let response = LocationResponse::found(&place);
    assert!(response.location_text.starts_with("Found via geocoding: MG Road"));
    assert_eq!(response.status().as_u16(), 200);
}

#[test]
fn test_serpapi_link_is_rewritten_once() {
    let (places, _) = scripted("places", empty);
    let (serp, _) = scripted("serpapi", serpapi_local);
    let (geo, g) = scripted("geocoding", geocoded);
    let orchestrator = base(CAPTION).with_resolver(places).with_resolver(serp).with_resolver(geo);

    let response = LocationResponse::found(&orchestrator.locate(POST).unwrap());
    assert_eq!(response.location_text, "Found: Grill House");
    assert_eq!(
        response.maps_url.as_deref(),
        Some("https://www.google.com/maps/place/?q=place_id:ChIJgrill")
    );
    assert_eq!(serde_json::to_value(&response).unwrap()["source"], "serpapi_local");
    assert_eq!(g.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_nothing_resolves() {
    let (places, _) = scripted("places", empty);
    let (geo, _) = scripted("geocoding", empty);
    let orchestrator = base("Shop location: Panampilly Nagar\n\n#kochi").with_resolver(places).with_resolver(geo);

    let err = orchestrator.locate(POST).unwrap_err();
    let response = LocationResponse::failed(&err);
    assert_eq!(response.status().as_u16(), 422);
    assert!(response.lat.is_none() && response.lon.is_none());
    assert_eq!(response.address.as_deref(), Some("Panampilly Nagar, Kochi, Kerala, 682025"));
    assert_eq!(serde_json::to_value(&response).unwrap()["source"], "coordinates_not_found");
}

#[test]
fn test_caption_without_location() {
    let (places, p) = scripted("places", geocoded);
    let orchestrator = base("so good!! 😋\n#foodie #weekend").with_resolver(places);
    assert!(matches!(orchestrator.locate(POST), Err(LocateError::NoLocationFound)));
    assert_eq!(p.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_invalid_reference_never_reaches_providers() {
    let (places, p) = scripted("places", geocoded);
    let orchestrator = base(CAPTION).with_resolver(places);
    let err = orchestrator.locate("https://www.youtube.com/watch?v=x").unwrap_err();
    assert_eq!(LocationResponse::failed(&err).status().as_u16(), 400);
    assert_eq!(p.calls.load(Ordering::SeqCst), 0);
}
