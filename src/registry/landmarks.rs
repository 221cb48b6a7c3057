//! Well-known landmarks the registry can be seeded with.

use super::types::{DestinationKind, DestinationMetadata, NewDestination, UpdateFrequency};
use crate::location::types::{Accuracy, Coordinates};

struct Landmark {
    name: &'static str,
    aliases: &'static [&'static str],
    lat: f64,
    lng: f64,
    country: &'static str,
    locality: &'static str,
    kind: DestinationKind,
    source: &'static str,
    confidence: f64,
}

const LANDMARKS: &[Landmark] = &[
    Landmark {
        name: "Eiffel Tower",
        aliases: &["Tour Eiffel"],
        lat: 48.858370, lng: 2.294481,
        country: "France", locality: "Paris",
        kind: DestinationKind::Landmark,
        source: "official_tourism", confidence: 0.98,
    },
    Landmark {
        name: "Statue of Liberty",
        aliases: &["Liberty Enlightening the World"],
        lat: 40.689247, lng: -74.044502,
        country: "United States", locality: "New York",
        kind: DestinationKind::Landmark,
        source: "government_survey", confidence: 0.98,
    },
    Landmark {
        name: "Colosseum",
        aliases: &["Colosseo", "Flavian Amphitheatre"],
        lat: 41.890210, lng: 12.492231,
        country: "Italy", locality: "Rome",
        kind: DestinationKind::Landmark,
        source: "official_tourism", confidence: 0.97,
    },
    Landmark {
        name: "Big Ben",
        aliases: &["Elizabeth Tower"],
        lat: 51.500729, lng: -0.124625,
        country: "United Kingdom", locality: "London",
        kind: DestinationKind::Landmark,
        source: "government_survey", confidence: 0.97,
    },
    Landmark {
        name: "Sydney Opera House",
        aliases: &[],
        lat: -33.856784, lng: 151.215297,
        country: "Australia", locality: "Sydney",
        kind: DestinationKind::Venue,
        source: "official_tourism", confidence: 0.97,
    },
    Landmark {
        name: "Taj Mahal",
        aliases: &[],
        lat: 27.175015, lng: 78.042155,
        country: "India", locality: "Agra",
        kind: DestinationKind::Landmark,
        source: "government_survey", confidence: 0.96,
    },
    Landmark {
        name: "Golden Gate Bridge",
        aliases: &[],
        lat: 37.819929, lng: -122.478255,
        country: "United States", locality: "San Francisco",
        kind: DestinationKind::Landmark,
        source: "government_survey", confidence: 0.97,
    },
    Landmark {
        name: "Machu Picchu",
        aliases: &["Machupicchu"],
        lat: -13.163141, lng: -72.544963,
        country: "Peru", locality: "Cusco Region",
        kind: DestinationKind::Attraction,
        source: "official_tourism", confidence: 0.95,
    },
];

/// Registration inputs for every built-in landmark.
pub fn seed_destinations() -> Vec<NewDestination> {
    LANDMARKS
        .iter()
        .map(|l| NewDestination {
            name: l.name.to_string(),
            coordinates: Coordinates::new(l.lat, l.lng),
            accuracy: Accuracy::High,
            verified_by: "seed".to_string(),
            sources: vec![l.source.to_string()],
            alternative_names: l.aliases.iter().map(|a| a.to_string()).collect(),
            metadata: DestinationMetadata {
                country: l.country.to_string(),
                admin_area: None,
                locality: Some(l.locality.to_string()),
                kind: l.kind,
                popularity: 100,
            },
            confidence: l.confidence,
            update_frequency: UpdateFrequency::Quarterly,
        })
        .collect()
}
