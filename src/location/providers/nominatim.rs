//! OpenStreetMap Nominatim provider. No credential; slower, so it gets a
//! longer timeout than the primary.

use super::{build_agent, get_json, GeocodingProvider, NormalizedPlace, RawPlace};
use crate::error::ProviderError;
use crate::location::types::{Accuracy, AddressComponents, BoundingBox, Coordinates, ResultSource};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct NominatimPlace {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
    #[serde(default)]
    pub place_id: Option<u64>,
    #[serde(default, rename = "class")]
    pub place_class: Option<String>,
    #[serde(default, rename = "type")]
    pub place_type: Option<String>,
    #[serde(default)]
    pub addresstype: Option<String>,
    #[serde(default)]
    pub importance: Option<f64>,
    /// `[south, north, west, east]` as strings.
    #[serde(default)]
    pub boundingbox: Option<Vec<String>>,
    #[serde(default)]
    pub address: Option<NominatimAddress>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct NominatimAddress {
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub postcode: Option<String>,
}

impl NominatimPlace {
    pub(super) fn into_place(self) -> Result<NormalizedPlace, ProviderError> {
        let lat: f64 = self
            .lat
            .parse()
            .map_err(|_| ProviderError::InvalidResponse(format!("invalid lat '{}'", self.lat)))?;
        let lng: f64 = self
            .lon
            .parse()
            .map_err(|_| ProviderError::InvalidResponse(format!("invalid lon '{}'", self.lon)))?;

        let accuracy = accuracy_from_place_type(
            self.place_class.as_deref(),
            self.addresstype.as_deref().or(self.place_type.as_deref()),
        );
        let bounding_box = self.boundingbox.as_deref().and_then(parse_bbox);
        let components = self
            .address
            .map(|a| AddressComponents {
                country: a.country,
                admin_area: a.state,
                locality: a.city.or(a.town).or(a.village),
                postal_code: a.postcode,
            })
            .unwrap_or_default();

        Ok(NormalizedPlace {
            coordinates: Coordinates::new(lat, lng),
            formatted_address: self.display_name,
            place_id: self.place_id.map(|id| id.to_string()),
            accuracy,
            components,
            bounding_box,
        })
    }
}

fn accuracy_from_place_type(class: Option<&str>, kind: Option<&str>) -> Accuracy {
    match (class, kind) {
        (_, Some("house" | "building")) => Accuracy::High,
        (Some("building" | "amenity" | "tourism" | "historic"), _) => Accuracy::High,
        (_, Some("road" | "neighbourhood" | "suburb" | "quarter" | "city" | "town" | "village")) => {
            Accuracy::Medium
        }
        _ => Accuracy::Low,
    }
}

fn parse_bbox(raw: &[String]) -> Option<BoundingBox> {
    let v: Vec<f64> = raw.iter().filter_map(|s| s.parse().ok()).collect();
    match v.as_slice() {
        [south, north, west, east] => Some(BoundingBox::new(*south, *west, *north, *east)),
        _ => None,
    }
}

pub struct NominatimProvider {
    base_url: String,
    agent: ureq::Agent,
}

impl NominatimProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration, user_agent: &str) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent: build_agent(timeout, user_agent),
        }
    }
}

#[async_trait]
impl GeocodingProvider for NominatimProvider {
    fn source(&self) -> ResultSource {
        ResultSource::Nominatim
    }

    async fn search(&self, address: &str) -> Result<Vec<RawPlace>, ProviderError> {
        let url = format!("{}/search", self.base_url);
        let query = vec![
            ("q", address.to_string()),
            ("format", "json".to_string()),
            ("addressdetails", "1".to_string()),
            ("limit", "1".to_string()),
        ];
        let places: Vec<NominatimPlace> = get_json(self.agent.clone(), url, query).await?;
        if places.is_empty() {
            return Err(ProviderError::NoResults);
        }
        Ok(places.into_iter().map(RawPlace::Nominatim).collect())
    }

    async fn reverse(&self, coords: Coordinates) -> Result<Vec<RawPlace>, ProviderError> {
        let url = format!("{}/reverse", self.base_url);
        let query = vec![
            ("lat", coords.lat.to_string()),
            ("lon", coords.lng.to_string()),
            ("format", "json".to_string()),
            ("addressdetails", "1".to_string()),
        ];
        let value: serde_json::Value = get_json(self.agent.clone(), url, query).await?;
        interpret_reverse(value)
    }
}

/// Reverse lookups answer with a single object, or `{"error": ...}` when nothing is there.
fn interpret_reverse(value: serde_json::Value) -> Result<Vec<RawPlace>, ProviderError> {
    if value.get("error").is_some() {
        return Err(ProviderError::NoResults);
    }
    let place: NominatimPlace =
        serde_json::from_value(value).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    Ok(vec![RawPlace::Nominatim(place)])
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLOSSEUM: &str = r#"{
        "place_id": 118440953,
        "lat": "41.8902142",
        "lon": "12.4900422",
        "display_name": "Colosseo, Piazza del Colosseo, Roma, Lazio, 00184, Italia",
        "class": "tourism",
        "type": "attraction",
        "importance": 0.79,
        "boundingbox": ["41.8893", "41.8911", "12.4883", "12.4917"],
        "address": {"city": "Roma", "state": "Lazio", "postcode": "00184", "country": "Italia"}
    }"#;

    #[test]
    fn test_place_normalizes() {
        let place: NominatimPlace = serde_json::from_str(COLOSSEUM).unwrap();
        let n = place.into_place().unwrap();
        assert_eq!(n.coordinates, Coordinates::new(41.8902142, 12.4900422));
        assert_eq!(n.accuracy, Accuracy::High);
        assert_eq!(n.components.locality.as_deref(), Some("Roma"));
        assert_eq!(n.components.admin_area.as_deref(), Some("Lazio"));
        assert!(n.bounding_box.unwrap().contains(&n.coordinates));
    }

    #[test]
    fn test_unparseable_lat_rejected() {
        let mut place: NominatimPlace = serde_json::from_str(COLOSSEUM).unwrap();
        place.lat = "north".into();
        assert!(matches!(place.into_place(), Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_reverse_error_object() {
        let v = serde_json::json!({"error": "Unable to geocode"});
        assert_eq!(interpret_reverse(v), Err(ProviderError::NoResults));
    }

    #[test]
    fn test_place_type_accuracy() {
        assert_eq!(accuracy_from_place_type(Some("place"), Some("city")), Accuracy::Medium);
        assert_eq!(accuracy_from_place_type(Some("building"), Some("yes")), Accuracy::High);
        assert_eq!(accuracy_from_place_type(Some("natural"), Some("peak")), Accuracy::Low);
    }

    #[test]
    fn test_bad_bbox_ignored() {
        assert!(parse_bbox(&["1".into(), "2".into()]).is_none());
    }
}
