//! Consumer-facing map links: synthesis, coordinate parsing and the final
//! rewrite of provider (SerpApi) links.

use tracing::info;
use url::Url;

use super::types::Coordinates;

const MAPS_BASE: &str = "https://www.google.com/maps";
const SEARCH_ZOOM: u8 = 17;

/// `https://www.google.com/maps/search/<name>/@<lat>,<lon>,17z`
pub fn search_url(name: &str, at: Coordinates) -> String {
    let mut url = Url::parse(MAPS_BASE).expect("static base URL");
    url.path_segments_mut()
        .expect("http URL has path segments")
        .push("search")
        .push(name)
        .push(&format!("@{},{},{}z", at.lat, at.lon, SEARCH_ZOOM));
    url.to_string()
}

/// `https://www.google.com/maps/search/?q=<lat>,<lon>&z=17`
pub fn coordinate_search_url(at: Coordinates) -> String {
    format!("{}/search/?q={},{}&z={}", MAPS_BASE, at.lat, at.lon, SEARCH_ZOOM)
}

/// `https://www.google.com/maps/place/?q=place_id:<id>`
pub fn place_id_url(place_id: &str) -> String {
    let id: String = url::form_urlencoded::byte_serialize(place_id.as_bytes()).collect();
    format!("{}/place/?q=place_id:{}", MAPS_BASE, id)
}

/// Read coordinates back from an `/@lat,lon,zoom` segment or a `q=lat,lon`
/// query.
pub fn coordinates_from_maps_url(link: &str) -> Option<Coordinates> {
    let url = Url::parse(link).ok()?;

    // place names may start with '@' too; take the last segment that parses
    let from_path = url.path_segments().and_then(|segs| {
        segs.rev()
            .find_map(|seg| seg.strip_prefix('@').and_then(parse_pair))
    });
    if from_path.is_some() {
        return from_path;
    }

    url.query_pairs()
        .find(|(k, _)| k == "q")
        .and_then(|(_, v)| parse_pair(&v))
}

fn parse_pair(s: &str) -> Option<Coordinates> {
    let mut parts = s.split(',');
    let lat = parts.next()?.trim().parse().ok();
    let lon = parts.next()?.trim().parse().ok();
    Coordinates::new(lat, lon)
}

fn is_serpapi(url: &Url) -> bool {
    url.host_str()
        .map(|h| h == "serpapi.com" || h.ends_with(".serpapi.com"))
        .unwrap_or(false)
}

/// True for any serpapi.com link.
pub fn is_serpapi_link(link: &str) -> bool {
    Url::parse(link.trim()).map(|u| is_serpapi(&u)).unwrap_or(false)
}

/// `place_id` carried by a SerpApi link.
pub fn serpapi_place_id(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    if !is_serpapi(&url) {
        return None;
    }
    url.query_pairs()
        .find(|(k, _)| k == "place_id")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Rewrite SerpApi links to direct place links; everything else passes
/// through. Idempotent.
pub fn finalize_maps_url(link: Option<String>) -> Option<String> {
    let link = link?;
    match serpapi_place_id(&link) {
        Some(place_id) => {
            let direct = place_id_url(&place_id);
            info!(from = %link, to = %direct, "rewrote provider link");
            Some(direct)
        }
        None => Some(link),
    }
}
