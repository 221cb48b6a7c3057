//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// The `(0, 0)` sentinel used for "no coordinates".
    pub const fn unset() -> Self {
        Self { lat: 0.0, lng: 0.0 }
    }

    pub fn is_unset(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.lat >= 0.0 { 'N' } else { 'S' };
        let ew = if self.lng >= 0.0 { 'E' } else { 'W' };
        write!(f, "{:.4}\u{00B0}{}, {:.4}\u{00B0}{}", self.lat.abs(), ns, self.lng.abs(), ew)
    }
}

/// Coarse accuracy tier of a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    Low,
    Medium,
    High,
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Cache,
    Google,
    Nominatim,
    Manual,
    VerifiedDatabase,
    Unresolved,
}

impl ResultSource {
    /// Sources other than the primary provider (and its cache replays).
    pub fn is_backup(&self) -> bool {
        matches!(self, Self::Nominatim | Self::Manual)
    }
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Google => write!(f, "google"),
            Self::Nominatim => write!(f, "nominatim"),
            Self::Manual => write!(f, "manual"),
            Self::VerifiedDatabase => write!(f, "verified_database"),
            Self::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// Structured address parts extracted from a provider response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressComponents {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self { south, west, north, east }
    }

    pub fn contains(&self, c: &Coordinates) -> bool {
        (self.south..=self.north).contains(&c.lat) && (self.west..=self.east).contains(&c.lng)
    }
}

/// A forward geocoding answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub coordinates: Coordinates,
    pub formatted_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    pub accuracy: Accuracy,
    pub source: ResultSource,
    #[serde(default)]
    pub components: AddressComponents,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    /// Provider that originally answered, set when `source` is [`ResultSource::Cache`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_from: Option<ResultSource>,
}

impl GeocodeResult {
    /// The provider behind this answer, looking through cache replays.
    pub fn provider(&self) -> ResultSource {
        self.cached_from.unwrap_or(self.source)
    }
}

/// A reverse geocoding answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseGeocodeResult {
    pub coordinates: Coordinates,
    pub formatted_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    pub source: ResultSource,
    #[serde(default)]
    pub components: AddressComponents,
}

/// Outcome of validating a coordinate pair. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<Accuracy>,
}

impl ValidationResult {
    pub(crate) fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            warnings: Vec::new(),
            accuracy: None,
        }
    }
}

/// Resolution a caller needs from a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionLevel {
    City,
    Building,
    Room,
}

impl PrecisionLevel {
    /// Decimal places needed on both axes.
    pub fn required_decimals(&self) -> u32 {
        match self {
            Self::City => 4,
            Self::Building => 5,
            Self::Room => 6,
        }
    }
}

impl std::str::FromStr for PrecisionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "city" => Ok(Self::City),
            "building" => Ok(Self::Building),
            "room" => Ok(Self::Room),
            _ => Err(format!("Unknown precision '{}'. Use city, building or room.", s)),
        }
    }
}

/// Result of a precision requirement check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrecisionCheck {
    pub meets_requirement: bool,
    pub required_decimals: u32,
    pub actual_decimals: u32,
}
