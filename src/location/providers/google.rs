//! Google Geocoding API provider. Requires an API key.

use super::{build_agent, get_json, GeocodingProvider, NormalizedPlace, RawPlace};
use crate::error::ProviderError;
use crate::location::types::{Accuracy, AddressComponents, BoundingBox, Coordinates, ResultSource};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_GOOGLE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Deserialize, Debug, Clone)]
pub struct GoogleResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GooglePlace>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct GooglePlace {
    pub formatted_address: String,
    #[serde(default)]
    pub place_id: Option<String>,
    pub geometry: GoogleGeometry,
    #[serde(default)]
    pub address_components: Vec<GoogleAddressComponent>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct GoogleGeometry {
    pub location: GoogleLatLng,
    #[serde(default)]
    pub location_type: Option<String>,
    #[serde(default)]
    pub viewport: Option<GoogleViewport>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GoogleLatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GoogleViewport {
    pub northeast: GoogleLatLng,
    pub southwest: GoogleLatLng,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct GoogleAddressComponent {
    pub long_name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl GooglePlace {
    pub(super) fn into_place(self) -> NormalizedPlace {
        let accuracy = accuracy_from_location_type(self.geometry.location_type.as_deref());
        let components = extract_components(&self.address_components);
        let bounding_box = self.geometry.viewport.map(|v| {
            BoundingBox::new(v.southwest.lat, v.southwest.lng, v.northeast.lat, v.northeast.lng)
        });
        NormalizedPlace {
            coordinates: Coordinates::new(self.geometry.location.lat, self.geometry.location.lng),
            formatted_address: self.formatted_address,
            place_id: self.place_id,
            accuracy,
            components,
            bounding_box,
        }
    }
}

fn accuracy_from_location_type(location_type: Option<&str>) -> Accuracy {
    match location_type {
        Some("ROOFTOP") => Accuracy::High,
        Some("RANGE_INTERPOLATED") | Some("GEOMETRIC_CENTER") => Accuracy::Medium,
        _ => Accuracy::Low,
    }
}

fn extract_components(parts: &[GoogleAddressComponent]) -> AddressComponents {
    let find = |kind: &str| {
        parts
            .iter()
            .find(|c| c.types.iter().any(|t| t == kind))
            .map(|c| c.long_name.clone())
    };
    AddressComponents {
        country: find("country"),
        admin_area: find("administrative_area_level_1"),
        locality: find("locality").or_else(|| find("postal_town")),
        postal_code: find("postal_code"),
    }
}

/// Turn a decoded response into places or the matching provider error.
pub fn interpret_response(response: GoogleResponse) -> Result<Vec<RawPlace>, ProviderError> {
    let GoogleResponse { status, results, error_message } = response;
    let detail = || error_message.clone().unwrap_or_else(|| status.clone());
    match status.as_str() {
        "OK" if !results.is_empty() => Ok(results.into_iter().map(RawPlace::Google).collect()),
        "OK" | "ZERO_RESULTS" => Err(ProviderError::NoResults),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => Err(ProviderError::QuotaExceeded),
        "REQUEST_DENIED" => Err(ProviderError::Auth(detail())),
        "INVALID_REQUEST" => Err(ProviderError::InvalidResponse(detail())),
        _ => Err(ProviderError::Transport(detail())),
    }
}

pub struct GoogleProvider {
    api_key: String,
    base_url: String,
    agent: ureq::Agent,
}

impl GoogleProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration, user_agent: &str) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            agent: build_agent(timeout, user_agent),
        }
    }

    async fn request(&self, query: Vec<(&'static str, String)>) -> Result<Vec<RawPlace>, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingCredential);
        }
        let mut query = query;
        query.push(("key", self.api_key.clone()));
        let response: GoogleResponse = get_json(self.agent.clone(), self.base_url.clone(), query).await?;
        interpret_response(response)
    }
}

#[async_trait]
impl GeocodingProvider for GoogleProvider {
    fn source(&self) -> ResultSource {
        ResultSource::Google
    }

    async fn search(&self, address: &str) -> Result<Vec<RawPlace>, ProviderError> {
        self.request(vec![("address", address.to_string())]).await
    }

    async fn reverse(&self, coords: Coordinates) -> Result<Vec<RawPlace>, ProviderError> {
        self.request(vec![("latlng", format!("{},{}", coords.lat, coords.lng))]).await
    }
}
