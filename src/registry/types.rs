//! Types for the verified-destination registry.

use crate::location::types::{Accuracy, Coordinates};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How often a destination should be re-verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateFrequency {
    Weekly,
    Monthly,
    Quarterly,
    Annually,
}

impl UpdateFrequency {
    pub fn days(&self) -> i64 {
        match self {
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Quarterly => 90,
            Self::Annually => 365,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    City,
    Landmark,
    Attraction,
    Region,
    Venue,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationMetadata {
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(rename = "type")]
    pub kind: DestinationKind,
    #[serde(default)]
    pub popularity: u32,
}

/// A place whose coordinates have been checked and are trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedDestination {
    pub id: String,
    pub name: String,
    pub coordinates: Coordinates,
    pub accuracy: Accuracy,
    pub verification_date: DateTime<Utc>,
    pub verified_by: String,
    /// Most recent source first.
    pub sources: Vec<String>,
    #[serde(default)]
    pub alternative_names: Vec<String>,
    pub metadata: DestinationMetadata,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub last_updated: DateTime<Utc>,
    pub update_frequency: UpdateFrequency,
}

impl VerifiedDestination {
    /// Whether `name` matches the canonical or an alternative name, ignoring case.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.alternative_names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.alternative_names.iter().map(String::as_str))
    }
}

/// Input for registering a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDestination {
    pub name: String,
    pub coordinates: Coordinates,
    pub accuracy: Accuracy,
    pub verified_by: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub alternative_names: Vec<String>,
    pub metadata: DestinationMetadata,
    pub confidence: f64,
    pub update_frequency: UpdateFrequency,
}

/// One observation of where a place is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateOption {
    pub coordinates: Coordinates,
    pub source: String,
    pub confidence: f64,
}

impl CoordinateOption {
    pub fn new(lat: f64, lng: f64, source: impl Into<String>, confidence: f64) -> Self {
        Self {
            coordinates: Coordinates::new(lat, lng),
            source: source.into(),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    HighestReliability,
    Consensus,
    ManualReview,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighestReliability => write!(f, "highest_reliability"),
            Self::Consensus => write!(f, "consensus"),
            Self::ManualReview => write!(f, "manual_review"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub conflict_id: String,
    pub destination: String,
    pub coordinates: Vec<Coordinates>,
    pub sources: Vec<String>,
    /// Options submitted, including any dropped as invalid.
    #[serde(default)]
    pub option_count: usize,
    pub strategy: ResolutionStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_coordinates: Option<Coordinates>,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
    pub confidence: f64,
}

/// How to look a destination up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DestinationLookup<'a> {
    Name(&'a str),
    Coordinates(Coordinates),
}

/// Outcome of draining the re-verification queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub processed: usize,
    pub refreshed: usize,
    pub stamped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryStats {
    pub total_destinations: usize,
    pub resolved_conflicts: usize,
    pub pending_updates: usize,
    pub average_confidence: f64,
    pub data_sources: usize,
}
