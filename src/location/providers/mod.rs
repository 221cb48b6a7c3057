//! Location providers: Google Geocoding (primary), Nominatim (secondary)
//! and the built-in manual table.
//!
//! Each HTTP provider hands back [`RawPlace`] values that keep the provider's
//! own response shape; [`RawPlace::into_place`] normalizes them into one
//! internal form before the geocoder looks at them.

pub mod google;
pub mod manual;
pub mod nominatim;

use super::types::{Accuracy, AddressComponents, BoundingBox, Coordinates, ResultSource};
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub use google::{GooglePlace, GoogleProvider};
pub use nominatim::{NominatimPlace, NominatimProvider};

/// A remote geocoding backend.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Tag carried by results from this provider.
    fn source(&self) -> ResultSource;

    /// Forward geocode a sanitized address.
    async fn search(&self, address: &str) -> Result<Vec<RawPlace>, ProviderError>;

    /// Reverse geocode a coordinate pair.
    async fn reverse(&self, coords: Coordinates) -> Result<Vec<RawPlace>, ProviderError>;
}

/// A provider answer in the provider's own shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPlace {
    Google(GooglePlace),
    Nominatim(NominatimPlace),
}

/// Provider-independent view of a single place.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPlace {
    pub coordinates: Coordinates,
    pub formatted_address: String,
    pub place_id: Option<String>,
    pub accuracy: Accuracy,
    pub components: AddressComponents,
    pub bounding_box: Option<BoundingBox>,
}

impl RawPlace {
    pub fn into_place(self) -> Result<NormalizedPlace, ProviderError> {
        match self {
            Self::Google(p) => Ok(p.into_place()),
            Self::Nominatim(p) => p.into_place(),
        }
    }
}

// ─── HTTP plumbing ──────────────────────────────────────────────

pub(crate) fn build_agent(timeout: Duration, user_agent: &str) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
}

fn map_ureq_error(e: ureq::Error) -> ProviderError {
    match e {
        ureq::Error::Status(status, _) => ProviderError::from_status(status),
        ureq::Error::Transport(t) => {
            let msg = t.to_string();
            if msg.contains("timed out") || msg.contains("timeout") {
                ProviderError::Timeout
            } else {
                ProviderError::Transport(msg)
            }
        }
    }
}

/// GET `url` with `query` parameters and decode the JSON body.
///
/// ureq is blocking, so the call runs on tokio's blocking pool.
pub(crate) async fn get_json<T>(
    agent: ureq::Agent,
    url: String,
    query: Vec<(&'static str, String)>,
) -> Result<T, ProviderError>
where
    T: DeserializeOwned + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut request = agent.get(&url);
        for (key, value) in &query {
            request = request.query(key, value);
        }
        let response = request.call().map_err(map_ureq_error)?;
        response
            .into_json::<T>()
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    })
    .await
    .map_err(|e| ProviderError::Transport(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_place_dispatch() {
        let raw = RawPlace::Nominatim(NominatimPlace {
            lat: "59.3293".into(),
            lon: "18.0686".into(),
            display_name: "Stockholm, Sweden".into(),
            place_id: Some(42),
            place_class: Some("boundary".into()),
            place_type: Some("administrative".into()),
            addresstype: Some("city".into()),
            importance: Some(0.8),
            boundingbox: None,
            address: None,
        });
        let place = raw.into_place().unwrap();
        assert_eq!(place.coordinates, Coordinates::new(59.3293, 18.0686));
        assert_eq!(place.place_id.as_deref(), Some("42"));
    }
}
