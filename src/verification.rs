//! Accuracy verification seam.
//!
//! The registry and the façade consume an [`AccuracyVerifier`]; the engine
//! does not care how it decides. [`HeuristicVerifier`] is the built-in one:
//! validator warnings plus a distance check against the manual place table,
//! with corrections kept in an in-memory audit log.

use crate::error::GeoError;
use crate::location::providers::manual;
use crate::location::types::{Accuracy, Coordinates};
use crate::location::validator::CoordinateValidator;
use crate::lock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// How far a coordinate may sit from the well-known place its label names.
const LABEL_MISMATCH_KM: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub is_accurate: bool,
    pub confidence: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_coordinates: Option<Coordinates>,
}

/// An audited coordinate replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateCorrection {
    pub original: Coordinates,
    pub corrected: Coordinates,
    pub source: String,
    pub confidence: f64,
    pub actor: String,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait AccuracyVerifier: Send + Sync {
    /// Cross-check `coords` against the free-text `label` they claim to locate.
    async fn verify_coordinate_accuracy(&self, coords: Coordinates, label: &str) -> Result<AccuracyReport, GeoError>;

    /// Record that `original` was replaced by `corrected`.
    async fn apply_coordinate_correction(&self, correction: CoordinateCorrection) -> Result<(), GeoError>;
}

#[derive(Debug, Default)]
pub struct HeuristicVerifier {
    validator: CoordinateValidator,
    corrections: Mutex<Vec<CoordinateCorrection>>,
}

impl HeuristicVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Corrections recorded so far, oldest first.
    pub fn corrections(&self) -> Vec<CoordinateCorrection> {
        lock(&self.corrections).clone()
    }
}

#[async_trait]
impl AccuracyVerifier for HeuristicVerifier {
    async fn verify_coordinate_accuracy(&self, coords: Coordinates, label: &str) -> Result<AccuracyReport, GeoError> {
        let check = self.validator.validate(&coords);
        let mut sources = vec!["coordinate_validator".to_string()];

        if !check.valid {
            return Ok(AccuracyReport {
                is_accurate: false,
                confidence: 0.0,
                issues: check.error.into_iter().collect(),
                recommendations: vec!["Re-enter the location or pick it on a map".to_string()],
                sources,
                verified_coordinates: None,
            });
        }

        let mut confidence: f64 = match check.accuracy {
            Some(Accuracy::High) => 0.9,
            Some(Accuracy::Medium) => 0.75,
            _ => 0.5,
        };
        let mut is_accurate = true;
        let mut recommendations = Vec::new();
        let mut verified_coordinates = None;

        for warning in &check.warnings {
            confidence -= 0.1;
            if warning.contains("precision") {
                recommendations.push("Use a more specific address for better precision".to_string());
            }
            if warning.contains("Ocean") {
                is_accurate = false;
                recommendations.push("Confirm the destination is on land".to_string());
            }
        }
        let mut issues = check.warnings;

        if let Some(reference) = manual::lookup(label) {
            sources.push("manual_reference".to_string());
            let distance = self.validator.calculate_distance(&coords, &reference.coordinates);
            if distance > LABEL_MISMATCH_KM {
                is_accurate = false;
                confidence -= 0.3;
                issues.push(format!(
                    "Coordinates are {:.0} km from {}",
                    distance, reference.formatted_address
                ));
                recommendations.push(format!("Check that '{}' refers to {}", label, reference.formatted_address));
                verified_coordinates = Some(reference.coordinates);
            }
        }

        Ok(AccuracyReport {
            is_accurate,
            confidence: confidence.clamp(0.1, 1.0),
            issues,
            recommendations,
            sources,
            verified_coordinates,
        })
    }

    async fn apply_coordinate_correction(&self, correction: CoordinateCorrection) -> Result<(), GeoError> {
        let check = self.validator.validate(&correction.corrected);
        if !check.valid {
            return Err(GeoError::Verification(check.error.unwrap_or_default()));
        }
        tracing::info!(
            from = %correction.original,
            to = %correction.corrected,
            source = %correction.source,
            actor = %correction.actor,
            "coordinate correction recorded"
        );
        lock(&self.corrections).push(correction);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accurate_city() {
        let v = HeuristicVerifier::new();
        let r = v
            .verify_coordinate_accuracy(Coordinates::new(48.8566, 2.3522), "Paris")
            .await
            .unwrap();
        assert!(r.is_accurate);
        assert!(r.issues.is_empty());
        assert!(r.sources.contains(&"manual_reference".to_string()));
        assert!(r.confidence >= 0.9 - 1e-9);
    }

    #[tokio::test]
    async fn test_label_mismatch() {
        let v = HeuristicVerifier::new();
        let r = v
            .verify_coordinate_accuracy(Coordinates::new(51.5074, -0.1278), "Paris")
            .await
            .unwrap();
        assert!(!r.is_accurate);
        assert_eq!(r.verified_coordinates, Some(Coordinates::new(48.8566, 2.3522)));
        assert!(r.issues.iter().any(|i| i.contains("km from Paris")));
    }

    #[tokio::test]
    async fn test_invalid_coordinates_report() {
        let v = HeuristicVerifier::new();
        let r = v.verify_coordinate_accuracy(Coordinates::unset(), "anywhere").await.unwrap();
        assert!(!r.is_accurate);
        assert_eq!(r.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_ocean_not_accurate() {
        let v = HeuristicVerifier::new();
        let r = v
            .verify_coordinate_accuracy(Coordinates::new(35.0001, -150.0001), "Middle of nowhere")
            .await
            .unwrap();
        assert!(!r.is_accurate);
        assert!(!r.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_corrections_audited() {
        let v = HeuristicVerifier::new();
        let correction = CoordinateCorrection {
            original: Coordinates::new(48.85, 2.35),
            corrected: Coordinates::new(48.8584, 2.2945),
            source: "official_tourism".into(),
            confidence: 0.9,
            actor: "tester".into(),
            recorded_at: Utc::now(),
        };
        v.apply_coordinate_correction(correction.clone()).await.unwrap();
        assert_eq!(v.corrections(), vec![correction]);

        let bad = CoordinateCorrection {
            corrected: Coordinates::unset(),
            ..v.corrections()[0].clone()
        };
        assert!(v.apply_coordinate_correction(bad).await.is_err());
    }
}
