use axum::extract::{ConnectInfo, FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::error::GeoError;
use crate::integration::{Activity, CoordinateStats, DestinationValidation, MaintenanceReport};
use crate::location::types::{Coordinates, PrecisionCheck, PrecisionLevel, ReverseGeocodeResult, ValidationResult};
use crate::location::geocoder::DEFAULT_CALLER;
use crate::location::{manual_place_list, ManualPlaceInfo};

use super::state::AppState;

/// Largest batch accepted by the batch endpoints. A full batch fits in one
/// caller's rate window.
pub const MAX_BATCH: usize = 50;

// ─── Caller identity ─────────────────────────────────────────────

/// Rate-limit key for a request: the client IP, honouring proxy headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(Caller(client_id(&parts.headers, peer)))
    }
}

fn client_id(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };
    header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or(peer)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| DEFAULT_CALLER.to_string())
}

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    kind: &'static str,
    code: u16,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid-input",
            message: message.into(),
        }
    }
}

impl From<GeoError> for ApiError {
    fn from(e: GeoError) -> Self {
        let status = match &e {
            GeoError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GeoError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GeoError::NotFound(_) | GeoError::AllProvidersFailed { .. } | GeoError::DestinationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            GeoError::RegistrationConflict { .. } => StatusCode::CONFLICT,
            GeoError::Provider(_) => StatusCode::BAD_GATEWAY,
            GeoError::ConflictUnresolved(_) | GeoError::Verification(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GeoError::Config(_) | GeoError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.message,
            kind: self.kind,
            code: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

fn check_batch(len: usize) -> Result<(), ApiError> {
    if len == 0 {
        return Err(ApiError::bad_request("Batch is empty"));
    }
    if len > MAX_BATCH {
        return Err(ApiError::bad_request(format!("Batch of {} exceeds the limit of {}", len, MAX_BATCH)));
    }
    Ok(())
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

// ─── GET /api/destination ────────────────────────────────────────

#[derive(Deserialize)]
pub struct DestinationQuery {
    pub query: Option<String>,
}

pub async fn destination(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Query(params): Query<DestinationQuery>,
) -> Result<Json<DestinationValidation>, ApiError> {
    let start = Instant::now();
    let query = params.query.as_deref().unwrap_or("").trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("Missing 'query' parameter"));
    }

    let result = state.service.validate_destination_for(&caller, query).await;
    info!(
        query,
        caller = %caller,
        valid = result.is_valid,
        source = %result.source,
        ms = elapsed_ms(start),
        "GET /api/destination"
    );
    Ok(Json(result))
}

// ─── POST /api/destinations ──────────────────────────────────────

#[derive(Deserialize)]
pub struct DestinationsBody {
    pub destinations: Vec<String>,
}

pub async fn destinations(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(body): Json<DestinationsBody>,
) -> Result<Json<Vec<DestinationValidation>>, ApiError> {
    let start = Instant::now();
    check_batch(body.destinations.len())?;
    let results = state.service.validate_destinations_for(&caller, &body.destinations).await;
    let valid = results.iter().filter(|r| r.is_valid).count();
    info!(caller = %caller, count = results.len(), valid, ms = elapsed_ms(start), "POST /api/destinations");
    Ok(Json(results))
}

// ─── POST /api/activities ────────────────────────────────────────

pub async fn activities(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(body): Json<Vec<Activity>>,
) -> Result<Json<Vec<Activity>>, ApiError> {
    let start = Instant::now();
    check_batch(body.len())?;
    let enriched = state.service.enhance_activities_for(&caller, body).await;
    info!(caller = %caller, count = enriched.len(), ms = elapsed_ms(start), "POST /api/activities");
    Ok(Json(enriched))
}

// ─── GET /api/reverse ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CoordinateQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub precision: Option<String>,
}

impl CoordinateQuery {
    fn coordinates(&self) -> Result<Coordinates, ApiError> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Ok(Coordinates::new(lat, lng)),
            _ => Err(ApiError::bad_request("Provide 'lat' and 'lng' parameters")),
        }
    }
}

pub async fn reverse(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CoordinateQuery>,
) -> Result<Json<ReverseGeocodeResult>, ApiError> {
    let start = Instant::now();
    let coords = params.coordinates()?;
    let result = state.service.geocoder().reverse_geocode(coords).await?;
    info!(%coords, source = %result.source, ms = elapsed_ms(start), "GET /api/reverse");
    Ok(Json(result))
}

// ─── GET /api/validate ───────────────────────────────────────────

#[derive(Serialize)]
pub struct ValidateResponse {
    pub coordinates: Coordinates,
    pub normalized: Coordinates,
    #[serde(flatten)]
    pub result: ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<PrecisionCheck>,
}

pub async fn validate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CoordinateQuery>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let coords = params.coordinates()?;
    let level = params
        .precision
        .as_deref()
        .map(|p| p.parse::<PrecisionLevel>().map_err(ApiError::bad_request))
        .transpose()?;

    let validator = state.service.validator();
    Ok(Json(ValidateResponse {
        coordinates: coords,
        normalized: validator.normalize(&coords),
        result: validator.validate(&coords),
        precision: level.map(|l| validator.validate_precision(&coords, l)),
    }))
}

// ─── GET /api/stats ──────────────────────────────────────────────

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<CoordinateStats> {
    Json(state.service.get_coordinate_stats())
}

// ─── POST /api/maintenance ───────────────────────────────────────

pub async fn maintenance(State(state): State<Arc<AppState>>) -> Result<Json<MaintenanceReport>, ApiError> {
    let report = state.service.perform_maintenance().await;
    state.persist_registry()?;
    Ok(Json(report))
}

// ─── GET /api/places ─────────────────────────────────────────────

pub async fn places() -> Json<Vec<ManualPlaceInfo>> {
    Json(manual_place_list())
}
