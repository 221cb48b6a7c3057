//! Source reliability ladder and the data-source catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kinds of coordinate sources, most trusted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    GovernmentSurvey,
    OfficialTourism,
    VerifiedManual,
    VerifiedProvider,
    Provider,
    Crowdsourced,
    Fallback,
    Unknown,
}

impl SourceType {
    /// Reliability on a 0–10 scale.
    pub fn reliability_score(&self) -> u8 {
        match self {
            Self::GovernmentSurvey => 10,
            Self::OfficialTourism => 9,
            Self::VerifiedManual => 8,
            Self::VerifiedProvider => 7,
            Self::Provider => 6,
            Self::Crowdsourced => 4,
            Self::Fallback => 2,
            Self::Unknown => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// `reliability_score / 10`.
    pub reliability: f64,
    pub last_used: Option<DateTime<Utc>>,
    pub success_rate: f64,
    /// Typical positional error in metres.
    pub average_accuracy: f64,
}

impl DataSource {
    fn seeded(name: &str, source_type: SourceType, success_rate: f64, average_accuracy: f64) -> Self {
        Self {
            name: name.to_string(),
            source_type,
            reliability: f64::from(source_type.reliability_score()) / 10.0,
            last_used: None,
            success_rate,
            average_accuracy,
        }
    }
}

/// Catalog of known sources, keyed by lower-cased name.
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    sources: BTreeMap<String, DataSource>,
}

impl SourceCatalog {
    /// The static catalog seeded at startup.
    pub fn seeded() -> Self {
        let seed = [
            DataSource::seeded("government_survey", SourceType::GovernmentSurvey, 0.99, 1.0),
            DataSource::seeded("official_tourism", SourceType::OfficialTourism, 0.97, 5.0),
            DataSource::seeded("manual_verification", SourceType::VerifiedManual, 0.95, 10.0),
            DataSource::seeded("verified_database", SourceType::VerifiedManual, 0.95, 10.0),
            DataSource::seeded("google_verified", SourceType::VerifiedProvider, 0.93, 15.0),
            DataSource::seeded("google", SourceType::Provider, 0.90, 25.0),
            DataSource::seeded("nominatim", SourceType::Crowdsourced, 0.85, 50.0),
            DataSource::seeded("user_submitted", SourceType::Crowdsourced, 0.70, 100.0),
            DataSource::seeded("manual", SourceType::Fallback, 0.60, 1000.0),
            DataSource::seeded("fallback", SourceType::Fallback, 0.50, 5000.0),
        ];
        Self {
            sources: seed.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DataSource> {
        self.sources.get(&name.to_lowercase())
    }

    /// Source type for `name`; unknown names rank lowest.
    pub fn source_type(&self, name: &str) -> SourceType {
        self.get(name).map(|s| s.source_type).unwrap_or(SourceType::Unknown)
    }

    pub fn reliability_score(&self, name: &str) -> u8 {
        self.source_type(name).reliability_score()
    }

    pub fn mark_used(&mut self, name: &str, at: DateTime<Utc>) {
        if let Some(s) = self.sources.get_mut(&name.to_lowercase()) {
            s.last_used = Some(at);
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn list(&self) -> Vec<DataSource> {
        self.sources.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_order() {
        let ladder = [
            SourceType::GovernmentSurvey,
            SourceType::OfficialTourism,
            SourceType::VerifiedManual,
            SourceType::VerifiedProvider,
            SourceType::Provider,
            SourceType::Crowdsourced,
            SourceType::Fallback,
            SourceType::Unknown,
        ];
        for pair in ladder.windows(2) {
            assert!(pair[0].reliability_score() > pair[1].reliability_score());
        }
    }

    #[test]
    fn test_catalog_lookup() {
        let mut catalog = SourceCatalog::seeded();
        assert_eq!(catalog.source_type("Google"), SourceType::Provider);
        assert_eq!(catalog.source_type("someone's blog"), SourceType::Unknown);
        assert_eq!(catalog.reliability_score("official_tourism"), 9);

        let now = Utc::now();
        catalog.mark_used("nominatim", now);
        assert_eq!(catalog.get("nominatim").unwrap().last_used, Some(now));
    }
}
