//! HTTP surface over the coordinate integration façade.

mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::GeoError;
use crate::integration::CoordinateIntegrationService;

pub use handlers::{ApiError, Caller, MAX_BATCH};
pub use state::AppState;

pub fn build_router(service: CoordinateIntegrationService, registry_path: Option<PathBuf>) -> Router {
    let state = Arc::new(AppState {
        service,
        registry_path,
    });

    Router::new()
        .route("/api/destination", get(handlers::destination))
        .route("/api/destinations", post(handlers::destinations))
        .route("/api/activities", post(handlers::activities))
        .route("/api/reverse", get(handlers::reverse))
        .route("/api/validate", get(handlers::validate))
        .route("/api/stats", get(handlers::stats))
        .route("/api/maintenance", post(handlers::maintenance))
        .route("/api/places", get(handlers::places))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(
    service: CoordinateIntegrationService,
    registry_path: Option<PathBuf>,
    host: &str,
    port: u16,
) -> Result<(), GeoError> {
    let app = build_router(service, registry_path);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GeoError::Io(format!("cannot bind to {}: {}", addr, e)))?;

    info!(%addr, "meridian server listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| GeoError::Io(format!("server error: {}", e)))
}
