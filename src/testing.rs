//! Test doubles shared by the unit tests.

use crate::error::{GeoError, ProviderError};
use crate::location::providers::{GeocodingProvider, RawPlace};
use crate::location::types::{Coordinates, ResultSource};
use crate::lock;
use crate::verification::{AccuracyReport, AccuracyVerifier, CoordinateCorrection};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A Google result with ROOFTOP accuracy at `(lat, lng)`.
pub fn google_place(lat: f64, lng: f64) -> RawPlace {
    let place = serde_json::from_value(json!({
        "formatted_address": format!("Test Place ({}, {})", lat, lng),
        "place_id": "test-place",
        "geometry": {
            "location": { "lat": lat, "lng": lng },
            "location_type": "ROOFTOP"
        },
        "address_components": [
            { "long_name": "Testville", "short_name": "Testville", "types": ["locality"] },
            { "long_name": "Testland", "short_name": "TL", "types": ["country"] }
        ]
    }))
    .unwrap();
    RawPlace::Google(place)
}

/// A Nominatim building result at `(lat, lng)`.
pub fn nominatim_place(lat: f64, lng: f64) -> RawPlace {
    let place = serde_json::from_value(json!({
        "lat": lat.to_string(),
        "lon": lng.to_string(),
        "display_name": "Test Place, Testville, Testland",
        "place_id": 42,
        "class": "building",
        "type": "yes",
        "address": { "city": "Testville", "country": "Testland" }
    }))
    .unwrap();
    RawPlace::Nominatim(place)
}

/// A provider with a canned answer that counts calls.
pub struct FakeProvider {
    source: ResultSource,
    answer: Result<Vec<RawPlace>, ProviderError>,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub fn ok(source: ResultSource, places: Vec<RawPlace>) -> Arc<Self> {
        Arc::new(Self {
            source,
            answer: Ok(places),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(source: ResultSource, error: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            source,
            answer: Err(error),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeocodingProvider for FakeProvider {
    fn source(&self) -> ResultSource {
        self.source
    }

    async fn search(&self, _address: &str) -> Result<Vec<RawPlace>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }

    async fn reverse(&self, _coords: Coordinates) -> Result<Vec<RawPlace>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

enum Verdict {
    Accurate,
    Suggest(Coordinates),
    Fail,
}

/// A verifier with a fixed verdict that records corrections.
pub struct FakeVerifier {
    verdict: Verdict,
    checks: AtomicUsize,
    corrections: Mutex<Vec<CoordinateCorrection>>,
}

impl FakeVerifier {
    fn with(verdict: Verdict) -> Self {
        Self {
            verdict,
            checks: AtomicUsize::new(0),
            corrections: Mutex::new(Vec::new()),
        }
    }

    pub fn accurate() -> Self {
        Self::with(Verdict::Accurate)
    }

    /// Reports every coordinate as wrong and proposes `coords` instead.
    pub fn suggesting(coords: Coordinates) -> Self {
        Self::with(Verdict::Suggest(coords))
    }

    pub fn failing() -> Self {
        Self::with(Verdict::Fail)
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn corrections(&self) -> Vec<CoordinateCorrection> {
        lock(&self.corrections).clone()
    }
}

#[async_trait]
impl AccuracyVerifier for FakeVerifier {
    async fn verify_coordinate_accuracy(&self, _coords: Coordinates, label: &str) -> Result<AccuracyReport, GeoError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        match self.verdict {
            Verdict::Accurate => Ok(AccuracyReport {
                is_accurate: true,
                confidence: 0.9,
                issues: Vec::new(),
                recommendations: Vec::new(),
                sources: vec!["fake".into()],
                verified_coordinates: None,
            }),
            Verdict::Suggest(coords) => Ok(AccuracyReport {
                is_accurate: false,
                confidence: 0.4,
                issues: vec![format!("{} looks misplaced", label)],
                recommendations: vec!["Use the suggested coordinates".into()],
                sources: vec!["fake".into()],
                verified_coordinates: Some(coords),
            }),
            Verdict::Fail => Err(GeoError::Verification("verifier offline".into())),
        }
    }

    async fn apply_coordinate_correction(&self, correction: CoordinateCorrection) -> Result<(), GeoError> {
        if matches!(self.verdict, Verdict::Fail) {
            return Err(GeoError::Verification("verifier offline".into()));
        }
        lock(&self.corrections).push(correction);
        Ok(())
    }
}
