use serde::Serialize;
use std::sync::Arc;

use crate::config::{Config, HomeRegion};
use crate::location::ResolutionOrchestrator;

/// Which provider keys are configured. Never the keys themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub google_maps: bool,
    pub serpapi: bool,
    pub opencage: bool,
}

impl ProviderStatus {
    pub fn from_config(config: &Config) -> Self {
        let creds = &config.credentials;
        Self {
            google_maps: creds.google_maps_api_key.is_some(),
            serpapi: creds.serpapi_key.is_some(),
            opencage: creds.opencage_api_key.is_some(),
        }
    }
}

pub struct AppState {
    pub orchestrator: Arc<ResolutionOrchestrator>,
    pub providers: ProviderStatus,
    pub home_region: HomeRegion,
}

impl AppState {
    pub fn new(orchestrator: ResolutionOrchestrator, config: &Config) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            providers: ProviderStatus::from_config(config),
            home_region: config.home_region.clone(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ResolutionOrchestrator::from_config(config), config)
    }
}
