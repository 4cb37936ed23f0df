use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::HomeRegion;
use crate::location::{LocateError, Reference};

use super::response::LocationResponse;
use super::state::{AppState, ProviderStatus};

fn respond(body: LocationResponse) -> (StatusCode, Json<LocationResponse>) {
    (body.status(), Json(body))
}

// ─── POST /get_location ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct LocationRequest {
    #[serde(default)]
    pub reel_url: String,
}

pub async fn get_location(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LocationRequest>, JsonRejection>,
) -> (StatusCode, Json<LocationResponse>) {
    let start = Instant::now();

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection, "rejected request body");
            return respond(LocationResponse::request_error("JSON data required"));
        }
    };

    let reel_url = request.reel_url.trim().to_string();
    info!(reel_url = %reel_url, "received URL");

    // cheap checks stay on the async side
    if let Err(e) = Reference::parse(&reel_url) {
        warn!(reel_url = %reel_url, error = %e, "invalid reference");
        return respond(LocationResponse::failed(&e));
    }

    let orchestrator = state.orchestrator.clone();
    let outcome = tokio::task::spawn_blocking(move || orchestrator.locate(&reel_url)).await;

    let body = match outcome {
        Ok(Ok(place)) => LocationResponse::found(&place),
        Ok(Err(e)) => LocationResponse::failed(&e),
        Err(join) if join.is_panic() => {
            error!(error = %join, "pipeline task panicked");
            LocationResponse::failed(&LocateError::Internal("pipeline task panicked".into()))
        }
        Err(join) => {
            error!(error = %join, "pipeline task cancelled");
            LocationResponse::server_error()
        }
    };

    info!(
        source = %body.source,
        status = body.status().as_u16(),
        maps_url = ?body.maps_url,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "POST /get_location"
    );
    respond(body)
}

// ─── GET /api/status ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub providers: ProviderStatus,
    pub home_region: HomeRegion,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "working",
        timestamp: Utc::now().to_rfc3339(),
        providers: state.providers,
        home_region: state.home_region.clone(),
    })
}
