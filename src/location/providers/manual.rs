//! Built-in table of well-known places. Last resort when every network tier
//! is unavailable; no network and no cache writes.

use crate::location::types::{Accuracy, AddressComponents, Coordinates, GeocodeResult, ResultSource};
use serde::Serialize;

struct ManualPlace {
    names: &'static [&'static str], // canonical + aliases
    display: &'static str,
    lat: f64,
    lng: f64,
    country: &'static str,
}

const MANUAL_PLACES: &[ManualPlace] = &[
    ManualPlace {
        names: &["paris"],
        display: "Paris, France",
        lat: 48.8566, lng: 2.3522,
        country: "France",
    },
    ManualPlace {
        names: &["london"],
        display: "London, United Kingdom",
        lat: 51.5074, lng: -0.1278,
        country: "United Kingdom",
    },
    ManualPlace {
        names: &["new york", "new york city", "nyc"],
        display: "New York, NY, USA",
        lat: 40.7128, lng: -74.0060,
        country: "United States",
    },
    ManualPlace {
        names: &["tokyo"],
        display: "Tokyo, Japan",
        lat: 35.6762, lng: 139.6503,
        country: "Japan",
    },
    ManualPlace {
        names: &["rome", "roma"],
        display: "Rome, Italy",
        lat: 41.9028, lng: 12.4964,
        country: "Italy",
    },
    ManualPlace {
        names: &["barcelona"],
        display: "Barcelona, Spain",
        lat: 41.3874, lng: 2.1686,
        country: "Spain",
    },
    ManualPlace {
        names: &["amsterdam"],
        display: "Amsterdam, Netherlands",
        lat: 52.3676, lng: 4.9041,
        country: "Netherlands",
    },
    ManualPlace {
        names: &["berlin"],
        display: "Berlin, Germany",
        lat: 52.5200, lng: 13.4050,
        country: "Germany",
    },
    ManualPlace {
        names: &["stockholm"],
        display: "Stockholm, Sweden",
        lat: 59.3293, lng: 18.0686,
        country: "Sweden",
    },
    ManualPlace {
        names: &["istanbul"],
        display: "Istanbul, Türkiye",
        lat: 41.0082, lng: 28.9784,
        country: "Türkiye",
    },
    ManualPlace {
        names: &["dubai"],
        display: "Dubai, United Arab Emirates",
        lat: 25.2048, lng: 55.2708,
        country: "United Arab Emirates",
    },
    ManualPlace {
        names: &["cairo"],
        display: "Cairo, Egypt",
        lat: 30.0444, lng: 31.2357,
        country: "Egypt",
    },
    ManualPlace {
        names: &["sydney"],
        display: "Sydney NSW, Australia",
        lat: -33.8688, lng: 151.2093,
        country: "Australia",
    },
    ManualPlace {
        names: &["los angeles"],
        display: "Los Angeles, CA, USA",
        lat: 34.0522, lng: -118.2437,
        country: "United States",
    },
    ManualPlace {
        names: &["san francisco"],
        display: "San Francisco, CA, USA",
        lat: 37.7749, lng: -122.4194,
        country: "United States",
    },
    ManualPlace {
        names: &["rio de janeiro", "rio"],
        display: "Rio de Janeiro, Brazil",
        lat: -22.9068, lng: -43.1729,
        country: "Brazil",
    },
    ManualPlace {
        names: &["bangkok"],
        display: "Bangkok, Thailand",
        lat: 13.7563, lng: 100.5018,
        country: "Thailand",
    },
    ManualPlace {
        names: &["singapore"],
        display: "Singapore",
        lat: 1.3521, lng: 103.8198,
        country: "Singapore",
    },
    ManualPlace {
        names: &["mumbai", "bombay"],
        display: "Mumbai, Maharashtra, India",
        lat: 19.0760, lng: 72.8777,
        country: "India",
    },
    ManualPlace {
        names: &["cape town"],
        display: "Cape Town, South Africa",
        lat: -33.9249, lng: 18.4241,
        country: "South Africa",
    },
];

// Shorter names only match exactly; "rio" must not match inside "rioja".
const MIN_FUZZY_NAME_LEN: usize = 4;

/// Exact name/alias match first, then substring match either way.
pub fn lookup(query: &str) -> Option<GeocodeResult> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return None;
    }

    if let Some(place) = MANUAL_PLACES.iter().find(|p| p.names.contains(&q.as_str())) {
        return Some(to_result(place));
    }

    MANUAL_PLACES
        .iter()
        .find(|p| {
            p.names.iter().any(|name| {
                name.len() >= MIN_FUZZY_NAME_LEN
                    && (q.contains(name) || (q.len() >= MIN_FUZZY_NAME_LEN && name.contains(&q)))
            })
        })
        .map(to_result)
}

fn to_result(place: &ManualPlace) -> GeocodeResult {
    GeocodeResult {
        coordinates: Coordinates::new(place.lat, place.lng),
        formatted_address: place.display.to_string(),
        place_id: None,
        accuracy: Accuracy::Medium,
        source: ResultSource::Manual,
        components: AddressComponents {
            country: Some(place.country.to_string()),
            locality: Some(place.display.split(',').next().unwrap_or(place.display).to_string()),
            ..AddressComponents::default()
        },
        bounding_box: None,
        cached_from: None,
    }
}

/// A manual table entry for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ManualPlaceInfo {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lng: f64,
}

pub fn manual_place_list() -> Vec<ManualPlaceInfo> {
    MANUAL_PLACES
        .iter()
        .map(|p| ManualPlaceInfo {
            name: p.display.to_string(),
            country: p.country.to_string(),
            lat: p.lat,
            lng: p.lng,
        })
        .collect()
}
