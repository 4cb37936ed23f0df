mod handlers;
mod response;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use response::LocationResponse;
pub use state::{AppState, ProviderStatus};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/get_location", post(handlers::get_location))
        .route("/api/status", get(handlers::status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(host: &str, port: u16, state: AppState) -> std::io::Result<()> {
    let app = build_router(Arc::new(state));
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("reel locator listening on http://{}", addr);
    axum::serve(listener, app).await
}
