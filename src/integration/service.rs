//! CoordinateIntegrationService: the façade trip and activity workflows call.
//!
//! Combines the registry, the geocoder, the validator and the accuracy
//! verifier. Nothing here returns an error to the caller: failures become
//! `is_valid = false` results or per-activity markers.

use crate::error::GeoError;
use crate::location::geocoder::{GeocodeStats, GeocodingService, DEFAULT_CALLER};
use crate::location::types::{Accuracy, Coordinates, GeocodeResult, ResultSource};
use crate::location::validator::CoordinateValidator;
use crate::registry::manager::GeographicDataManager;
use crate::registry::types::{DestinationLookup, RegistryStats, UpdateReport, VerifiedDestination};
use crate::verification::{AccuracyReport, AccuracyVerifier};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Confidence given to an activity whose coordinates could not be checked.
pub const UNVERIFIED_CONFIDENCE: f64 = 0.1;

/// Outcome of validating one destination string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationValidation {
    pub query: String,
    pub is_valid: bool,
    pub coordinates: Coordinates,
    pub formatted_address: String,
    pub accuracy: Accuracy,
    pub source: ResultSource,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

/// A trip activity that may or may not carry coordinates yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate_info: Option<CoordinateInfo>,
}

impl Activity {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            coordinates: None,
            coordinate_info: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    /// Text used to look the activity up: the address if present, else the name.
    fn label(&self) -> &str {
        self.address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(self.name.trim())
    }
}

/// What the engine learned about an activity's coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateInfo {
    /// `None` when the coordinates came with the activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ResultSource>,
    pub accuracy: Accuracy,
    pub confidence: f64,
    pub verified: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    /// Id of the matching verified destination, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_match: Option<String>,
    pub needs_manual_verification: bool,
}

impl CoordinateInfo {
    fn unverified(reason: String) -> Self {
        Self {
            source: None,
            accuracy: Accuracy::Low,
            confidence: UNVERIFIED_CONFIDENCE,
            verified: false,
            issues: vec![reason, "Manual verification required".to_string()],
            registry_match: None,
            needs_manual_verification: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateStats {
    pub geocoding: GeocodeStats,
    pub registry: RegistryStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceReport {
    pub cache_entries_cleared: usize,
    pub updates_scheduled: usize,
    pub updates: UpdateReport,
}

pub struct CoordinateIntegrationService {
    validator: CoordinateValidator,
    geocoder: Arc<GeocodingService>,
    registry: Arc<GeographicDataManager>,
    verifier: Arc<dyn AccuracyVerifier>,
}

impl CoordinateIntegrationService {
    pub fn new(
        geocoder: Arc<GeocodingService>,
        registry: Arc<GeographicDataManager>,
        verifier: Arc<dyn AccuracyVerifier>,
    ) -> Self {
        Self {
            validator: CoordinateValidator::new(),
            geocoder,
            registry,
            verifier,
        }
    }

    pub fn geocoder(&self) -> &GeocodingService {
        &self.geocoder
    }

    pub fn registry(&self) -> &GeographicDataManager {
        &self.registry
    }

    pub fn validator(&self) -> &CoordinateValidator {
        &self.validator
    }

    // ─── Destinations ───────────────────────────────────────────

    /// Resolve and check one destination. Never fails: an unresolvable
    /// destination comes back with `is_valid = false` and `(0, 0)`.
    pub async fn validate_destination(&self, text: &str) -> DestinationValidation {
        self.validate_destination_for(DEFAULT_CALLER, text).await
    }

    /// [`validate_destination`](Self::validate_destination) charged to `caller`'s rate quota.
    pub async fn validate_destination_for(&self, caller: &str, text: &str) -> DestinationValidation {
        match self.resolve_destination(caller, text).await {
            Ok(resolved) => resolved.validation,
            Err(e) => unresolved(text, &e),
        }
    }

    /// Validate many destinations concurrently, one result per input in input order.
    pub async fn validate_destinations(&self, texts: &[String]) -> Vec<DestinationValidation> {
        self.validate_destinations_for(DEFAULT_CALLER, texts).await
    }

    pub async fn validate_destinations_for(&self, caller: &str, texts: &[String]) -> Vec<DestinationValidation> {
        let outcomes = self.try_validate_destinations_for(caller, texts).await;
        texts
            .iter()
            .zip(outcomes)
            .map(|(text, outcome)| outcome.unwrap_or_else(|e| unresolved(text, &e)))
            .collect()
    }

    /// Like [`validate_destinations`](Self::validate_destinations) but keeps each item's error.
    pub async fn try_validate_destinations(&self, texts: &[String]) -> Vec<Result<DestinationValidation, GeoError>> {
        self.try_validate_destinations_for(DEFAULT_CALLER, texts).await
    }

    pub async fn try_validate_destinations_for(
        &self,
        caller: &str,
        texts: &[String],
    ) -> Vec<Result<DestinationValidation, GeoError>> {
        join_all(texts.iter().map(|t| self.resolve_destination(caller, t)))
            .await
            .into_iter()
            .map(|outcome| outcome.map(|resolved| resolved.validation))
            .collect()
    }

    async fn resolve_destination(&self, caller: &str, text: &str) -> Result<Resolved, GeoError> {
        let query = text.trim();
        if query.is_empty() {
            return Err(GeoError::InvalidInput("destination is empty".into()));
        }

        if let Some(verified) = self.registry.find_destination(DestinationLookup::Name(query)) {
            debug!(query, id = %verified.id, "destination found in verified registry");
            return Ok(Resolved {
                validation: from_registry(query, &verified),
                report: None,
                verified: Some(verified),
            });
        }

        let geocoded = self.geocoder.geocode_for(caller, query).await?;
        let check = self.validator.validate(&geocoded.coordinates);
        if !check.valid {
            let reason = check.error.unwrap_or_default();
            warn!(query, reason = %reason, "geocoded coordinates failed validation");
            return Ok(Resolved {
                validation: DestinationValidation {
                    warnings: vec![reason],
                    ..unresolved_shell(query, geocoded.formatted_address)
                },
                report: None,
                verified: None,
            });
        }

        let mut warnings = check.warnings;
        let mut suggestions = Vec::new();
        let report = match self.verifier.verify_coordinate_accuracy(geocoded.coordinates, query).await {
            Ok(report) => {
                warnings.extend(report.issues.iter().cloned());
                suggestions.extend(report.recommendations.iter().cloned());
                Some(report)
            }
            Err(e) => {
                warn!(query, error = %e, "accuracy verification unavailable");
                warnings.push(format!("Accuracy verification unavailable: {}", e));
                None
            }
        };
        let provider = geocoded.provider();
        if provider.is_backup() {
            warnings.push(format!(
                "Using backup service ({}); coordinates may be less precise",
                provider
            ));
        }
        dedup_in_order(&mut warnings);
        dedup_in_order(&mut suggestions);

        let GeocodeResult {
            coordinates,
            formatted_address,
            accuracy,
            source,
            ..
        } = geocoded;
        Ok(Resolved {
            validation: DestinationValidation {
                query: query.to_string(),
                is_valid: true,
                coordinates,
                formatted_address,
                accuracy,
                source,
                warnings,
                suggestions,
            },
            report,
            verified: None,
        })
    }

    // ─── Activities ─────────────────────────────────────────────

    /// Attach checked coordinates to every activity. A failing item gets a
    /// manual-verification marker; the rest of the batch is unaffected.
    pub async fn enhance_activities_with_coordinates(&self, activities: Vec<Activity>) -> Vec<Activity> {
        self.enhance_activities_for(DEFAULT_CALLER, activities).await
    }

    /// [`enhance_activities_with_coordinates`](Self::enhance_activities_with_coordinates)
    /// charged to `caller`'s rate quota.
    pub async fn enhance_activities_for(&self, caller: &str, activities: Vec<Activity>) -> Vec<Activity> {
        join_all(activities.into_iter().map(|a| self.enhance_activity(caller, a))).await
    }

    async fn enhance_activity(&self, caller: &str, mut activity: Activity) -> Activity {
        let outcome = match activity.coordinates {
            Some(coords) => self.verify_existing(&activity, coords).await,
            None => self.locate(caller, &activity).await,
        };
        match outcome {
            Ok((coordinates, info)) => {
                activity.coordinates = Some(coordinates);
                activity.coordinate_info = Some(info);
            }
            Err(e) => {
                warn!(activity = %activity.name, error = %e, "could not enrich activity");
                activity.coordinate_info = Some(CoordinateInfo::unverified(e.to_string()));
            }
        }
        activity
    }

    async fn verify_existing(
        &self,
        activity: &Activity,
        coords: Coordinates,
    ) -> Result<(Coordinates, CoordinateInfo), GeoError> {
        let check = self.validator.validate(&coords);
        if !check.valid {
            return Err(GeoError::InvalidInput(check.error.unwrap_or_default()));
        }
        let report = self.verifier.verify_coordinate_accuracy(coords, activity.label()).await?;

        let registry_match = self
            .registry
            .find_destination(DestinationLookup::Coordinates(coords))
            .or_else(|| self.registry.find_destination(DestinationLookup::Name(activity.name.trim())))
            .map(|d| d.id);

        let mut issues = check.warnings;
        issues.extend(report.issues);
        Ok((
            coords,
            CoordinateInfo {
                source: None,
                accuracy: check.accuracy.unwrap_or(Accuracy::Low),
                confidence: report.confidence,
                verified: report.is_accurate,
                issues,
                registry_match,
                needs_manual_verification: !report.is_accurate,
            },
        ))
    }

    async fn locate(&self, caller: &str, activity: &Activity) -> Result<(Coordinates, CoordinateInfo), GeoError> {
        let label = activity.label();
        let Resolved {
            validation,
            report,
            verified: registry_entry,
        } = self.resolve_destination(caller, label).await?;
        if !validation.is_valid {
            return Err(GeoError::NotFound(label.to_string()));
        }

        // Registry entries are already verified; anything else needs the verifier's word.
        let (confidence, verified) = match (&registry_entry, &report) {
            (Some(entry), _) => (entry.confidence, true),
            (None, Some(report)) => (report.confidence, report.is_accurate),
            (None, None) => (UNVERIFIED_CONFIDENCE, false),
        };
        let registry_match = registry_entry.map(|d| d.id);
        Ok((
            validation.coordinates,
            CoordinateInfo {
                source: Some(validation.source),
                accuracy: validation.accuracy,
                confidence,
                verified,
                issues: validation.warnings,
                registry_match,
                needs_manual_verification: !verified,
            },
        ))
    }

    // ─── Admin ──────────────────────────────────────────────────

    pub fn get_coordinate_stats(&self) -> CoordinateStats {
        CoordinateStats {
            geocoding: self.geocoder.stats(),
            registry: self.registry.stats(),
        }
    }

    /// Clear the geocode cache and run one scheduled-update cycle.
    pub async fn perform_maintenance(&self) -> MaintenanceReport {
        let cache_entries_cleared = self.geocoder.purge_expired() + self.geocoder.clear_cache();
        let updates_scheduled = self.registry.schedule_data_update();
        let updates = self.registry.process_update_queue().await;
        info!(cache_entries_cleared, updates_scheduled, "maintenance complete");
        MaintenanceReport {
            cache_entries_cleared,
            updates_scheduled,
            updates,
        }
    }
}

/// A resolved destination plus what the verifier said about it.
struct Resolved {
    validation: DestinationValidation,
    report: Option<AccuracyReport>,
    /// The registry entry, when the fast path answered.
    verified: Option<VerifiedDestination>,
}

fn from_registry(query: &str, d: &VerifiedDestination) -> DestinationValidation {
    let place = d.metadata.locality.as_deref().unwrap_or(&d.metadata.country);
    let formatted_address = if place == d.metadata.country {
        format!("{}, {}", d.name, place)
    } else {
        format!("{}, {}, {}", d.name, place, d.metadata.country)
    };
    DestinationValidation {
        query: query.to_string(),
        is_valid: true,
        coordinates: d.coordinates,
        formatted_address,
        accuracy: d.accuracy,
        source: ResultSource::VerifiedDatabase,
        warnings: Vec::new(),
        suggestions: Vec::new(),
    }
}

fn unresolved_shell(query: &str, formatted_address: String) -> DestinationValidation {
    DestinationValidation {
        query: query.to_string(),
        is_valid: false,
        coordinates: Coordinates::unset(),
        formatted_address,
        accuracy: Accuracy::Low,
        source: ResultSource::Unresolved,
        warnings: Vec::new(),
        suggestions: Vec::new(),
    }
}

fn unresolved(text: &str, error: &GeoError) -> DestinationValidation {
    let query = text.trim();
    let mut suggestions = match error {
        GeoError::RateLimited { .. } => vec!["Wait a minute and try again".to_string()],
        GeoError::InvalidInput(_) => vec!["Enter a place name or street address".to_string()],
        _ => vec![
            "Check the spelling of the destination".to_string(),
            "Add a city or country, for example 'Eiffel Tower, Paris'".to_string(),
        ],
    };
    suggestions.push("Pick the location on a map to set coordinates manually".to_string());
    DestinationValidation {
        warnings: vec![format!("Could not find coordinates for '{}': {}", query, error)],
        suggestions,
        ..unresolved_shell(query, query.to_string())
    }
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|i| seen.insert(i.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::location::geocoder::GeocoderSettings;
    use crate::testing::{google_place, nominatim_place, FakeProvider, FakeVerifier};
    use crate::verification::HeuristicVerifier;

    struct Harness {
        service: CoordinateIntegrationService,
        primary: Arc<FakeProvider>,
        verifier: Arc<FakeVerifier>,
    }

    fn harness(primary: Arc<FakeProvider>, verifier: FakeVerifier) -> Harness {
        let verifier = Arc::new(verifier);
        let geocoder = GeocodingService::new(GeocoderSettings::default()).with_primary(primary.clone());
        let registry = GeographicDataManager::new(verifier.clone()).with_seed_data();
        Harness {
            service: CoordinateIntegrationService::new(Arc::new(geocoder), Arc::new(registry), verifier.clone()),
            primary,
            verifier,
        }
    }

    fn paris_provider() -> Arc<FakeProvider> {
        FakeProvider::ok(ResultSource::Google, vec![google_place(48.856614, 2.352222)])
    }

    #[tokio::test]
    async fn test_registry_answers_without_network() {
        let h = harness(paris_provider(), FakeVerifier::accurate());
        let v = h.service.validate_destination("Eiffel Tower").await;
        assert!(v.is_valid);
        assert_eq!(v.source, ResultSource::VerifiedDatabase);
        assert_eq!(v.coordinates, Coordinates::new(48.85837, 2.294481));
        assert_eq!(v.formatted_address, "Eiffel Tower, Paris, France");
        assert_eq!(h.primary.calls(), 0);
        assert_eq!(h.verifier.checks(), 0);
    }

    #[tokio::test]
    async fn test_unknown_destination_is_invalid() {
        let failing = FakeProvider::failing(ResultSource::Google, ProviderError::NoResults);
        let h = harness(failing, FakeVerifier::accurate());
        let v = h.service.validate_destination("Qwzxylocation9999").await;
        assert!(!v.is_valid);
        assert_eq!(v.coordinates, Coordinates::unset());
        assert_eq!(v.source, ResultSource::Unresolved);
        assert!(!v.warnings.is_empty());
        assert!(!v.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_geocoded_destination_merges_warnings() {
        let h = harness(paris_provider(), FakeVerifier::suggesting(Coordinates::new(1.0, 1.0)));
        let v = h.service.validate_destination("Paris").await;
        assert!(v.is_valid);
        assert_eq!(v.source, ResultSource::Google);
        assert_eq!(v.accuracy, Accuracy::High);
        assert!(v.warnings.iter().any(|w| w.contains("looks misplaced")));
        assert_eq!(v.suggestions, vec!["Use the suggested coordinates".to_string()]);
    }

    #[tokio::test]
    async fn test_backup_source_flagged() {
        let verifier = Arc::new(HeuristicVerifier::new());
        let secondary = FakeProvider::ok(ResultSource::Nominatim, vec![nominatim_place(52.52, 13.405)]);
        let geocoder = GeocodingService::default().with_secondary(secondary);
        let registry = GeographicDataManager::new(verifier.clone());
        let service = CoordinateIntegrationService::new(Arc::new(geocoder), Arc::new(registry), verifier);

        let v = service.validate_destination("Alexanderplatz, Berlin").await;
        assert!(v.is_valid);
        assert_eq!(v.source, ResultSource::Nominatim);
        assert!(v.warnings.iter().any(|w| w.contains("backup service")));
    }

    #[tokio::test]
    async fn test_verifier_failure_is_a_warning() {
        let h = harness(paris_provider(), FakeVerifier::failing());
        let v = h.service.validate_destination("Paris").await;
        assert!(v.is_valid);
        assert!(v.warnings.iter().any(|w| w.contains("verification unavailable")));
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_isolates_failures() {
        let h = harness(paris_provider(), FakeVerifier::accurate());
        let inputs = vec!["Colosseum".to_string(), "   ".to_string(), "Paris".to_string()];
        let out = h.service.validate_destinations(&inputs).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].source, ResultSource::VerifiedDatabase);
        assert!(!out[1].is_valid);
        assert_eq!(out[2].source, ResultSource::Google);

        let raw = h.service.try_validate_destinations(&inputs).await;
        assert!(matches!(raw[1], Err(GeoError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_enhance_activities() {
        let h = harness(paris_provider(), FakeVerifier::accurate());
        let activities = vec![
            Activity::named("Morning at the tower").with_address("Eiffel Tower"),
            Activity::named("Lunch").with_coordinates(Coordinates::new(41.890210, 12.492231)),
            Activity::named("Broken").with_coordinates(Coordinates::new(0.0, 0.0)),
            Activity::named("Walk").with_address("Paris"),
        ];
        let out = h.service.enhance_activities_with_coordinates(activities).await;
        assert_eq!(out.len(), 4);

        let tower = out[0].coordinate_info.as_ref().unwrap();
        assert_eq!(tower.source, Some(ResultSource::VerifiedDatabase));
        assert!(tower.registry_match.as_deref().unwrap().starts_with("eiffel_tower_"));
        assert!(tower.verified);
        assert!(!tower.needs_manual_verification);
        assert_eq!(out[0].coordinates, Some(Coordinates::new(48.85837, 2.294481)));

        let lunch = out[1].coordinate_info.as_ref().unwrap();
        assert!(lunch.verified);
        assert!(lunch.registry_match.as_deref().unwrap().starts_with("colosseum_"));

        let broken = out[2].coordinate_info.as_ref().unwrap();
        assert!(broken.needs_manual_verification);
        assert_eq!(broken.confidence, UNVERIFIED_CONFIDENCE);

        let walk = out[3].coordinate_info.as_ref().unwrap();
        assert_eq!(walk.source, Some(ResultSource::Google));
        assert_eq!(out[3].coordinates, Some(Coordinates::new(48.856614, 2.352222)));
        assert!(walk.verified);
        assert!(!walk.needs_manual_verification);
        assert_eq!(walk.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_geocoded_activity_carries_verifier_verdict() {
        let h = harness(paris_provider(), FakeVerifier::suggesting(Coordinates::new(48.8566, 2.3522)));
        let out = h
            .service
            .enhance_activities_with_coordinates(vec![Activity::named("Walk").with_address("Paris")])
            .await;

        let info = out[0].coordinate_info.as_ref().unwrap();
        assert_eq!(out[0].coordinates, Some(Coordinates::new(48.856614, 2.352222)));
        assert!(!info.verified);
        assert!(info.needs_manual_verification);
        assert_eq!(info.confidence, 0.4);
        assert!(info.issues.iter().any(|i| i == "Paris looks misplaced"));
    }

    #[tokio::test]
    async fn test_callers_have_separate_quotas() {
        let verifier = Arc::new(FakeVerifier::accurate());
        let settings = GeocoderSettings {
            rate_limit_requests: 2,
            ..GeocoderSettings::default()
        };
        let geocoder = GeocodingService::new(settings).with_primary(paris_provider());
        let registry = GeographicDataManager::new(verifier.clone());
        let service = CoordinateIntegrationService::new(Arc::new(geocoder), Arc::new(registry), verifier);

        let texts: Vec<String> = ["Paris", "Lyon", "Nice"].iter().map(|s| s.to_string()).collect();
        let alice = service.validate_destinations_for("10.0.0.1", &texts).await;
        assert_eq!(alice.iter().filter(|v| v.is_valid).count(), 2);
        assert!(alice.iter().any(|v| v.warnings.iter().any(|w| w.contains("10.0.0.1"))));

        let bob = service.validate_destination_for("10.0.0.2", "Marseille").await;
        assert!(bob.is_valid);

        let activities = service
            .enhance_activities_for("10.0.0.3", vec![Activity::named("Walk").with_address("Paris")])
            .await;
        assert!(activities[0].coordinate_info.as_ref().unwrap().verified);
    }

    #[tokio::test]
    async fn test_backup_warning_survives_cache_replay() {
        let verifier = Arc::new(FakeVerifier::accurate());
        let secondary = FakeProvider::ok(ResultSource::Nominatim, vec![nominatim_place(52.52, 13.405)]);
        let geocoder = GeocodingService::default().with_secondary(secondary.clone());
        let registry = GeographicDataManager::new(verifier.clone());
        let service = CoordinateIntegrationService::new(Arc::new(geocoder), Arc::new(registry), verifier);

        let first = service.validate_destination("Alexanderplatz, Berlin").await;
        let second = service.validate_destination("Alexanderplatz, Berlin").await;
        assert_eq!(second.source, ResultSource::Cache);
        assert_eq!(secondary.calls(), 1);
        assert_eq!(first.warnings, second.warnings);
        assert!(second.warnings.iter().any(|w| w.contains("backup service (nominatim)")));
    }

    #[tokio::test]
    async fn test_stats_and_maintenance() {
        let h = harness(paris_provider(), FakeVerifier::accurate());
        h.service.validate_destination("Paris").await;
        h.service.validate_destination("Paris").await;

        let stats = h.service.get_coordinate_stats();
        assert_eq!(stats.geocoding.cache_hits, 1);
        assert_eq!(stats.registry.total_destinations, 8);

        let report = h.service.perform_maintenance().await;
        assert_eq!(report.cache_entries_cleared, 1);
        assert_eq!(report.updates_scheduled, 0);
        assert_eq!(h.service.get_coordinate_stats().geocoding.cache_size, 0);
    }
}
