//! Location resolution: provider adapters, the resolver chain and canonical
//! map links.

pub mod geocoding;
pub mod maps_url;
pub mod providers;
pub mod resolver;
pub mod types;

pub use resolver::{CaptionAnalysis, PlaceIdResolver, PlaceResolver, Reference, ResolutionOrchestrator};
pub use types::{Coordinates, LocateError, ProviderError, ResolvedPlace, SourceTag};
