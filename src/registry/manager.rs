//! GeographicDataManager: the verified-destination registry.
//!
//! Holds destinations keyed by id, memoized conflict resolutions, the
//! source catalog and the re-verification queue. Every map sits behind its
//! own mutex; no guard is held across an `.await`.

use super::conflict::{arbitrate, conflict_id, conflict_signature, stable_hash, CONSENSUS_RADIUS_KM};
use super::landmarks::seed_destinations;
use super::sources::{DataSource, SourceCatalog};
use super::store::{RegistrySnapshot, SNAPSHOT_VERSION};
use super::types::{
    ConflictResolution, CoordinateOption, DestinationLookup, NewDestination, RegistryStats, ResolutionStrategy,
    UpdateReport, VerifiedDestination,
};
use crate::clock::{Clock, SystemClock};
use crate::error::GeoError;
use crate::location::types::Coordinates;
use crate::location::validator::CoordinateValidator;
use crate::lock;
use crate::verification::{AccuracyReport, AccuracyVerifier, CoordinateCorrection};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Radius for coordinate-based `find_destination`.
pub const COORDINATE_MATCH_KM: f64 = 0.01;
/// Queries shorter than this only match names exactly.
const MIN_FUZZY_QUERY_LEN: usize = 3;
const CONFIDENCE_BUMP: f64 = 0.1;

pub struct GeographicDataManager {
    validator: CoordinateValidator,
    verifier: Arc<dyn AccuracyVerifier>,
    clock: Arc<dyn Clock>,
    destinations: Mutex<BTreeMap<String, VerifiedDestination>>,
    conflicts: Mutex<HashMap<String, ConflictResolution>>,
    catalog: Mutex<SourceCatalog>,
    update_queue: Mutex<VecDeque<String>>,
}

impl GeographicDataManager {
    /// An empty registry.
    pub fn new(verifier: Arc<dyn AccuracyVerifier>) -> Self {
        Self {
            validator: CoordinateValidator::new(),
            verifier,
            clock: Arc::new(SystemClock),
            destinations: Mutex::new(BTreeMap::new()),
            conflicts: Mutex::new(HashMap::new()),
            catalog: Mutex::new(SourceCatalog::seeded()),
            update_queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register the built-in landmarks. Ones that collide with an existing
    /// entry are skipped.
    pub fn with_seed_data(self) -> Self {
        let mut added = 0;
        for destination in seed_destinations() {
            match self.add_verified_destination(destination) {
                Ok(_) => added += 1,
                Err(e) => debug!(error = %e, "skipped seed landmark"),
            }
        }
        info!(added, "seeded destination registry");
        self
    }

    // ─── Registration ───────────────────────────────────────────

    /// Register a destination. Rejected when another entry lies within 100 m.
    pub fn add_verified_destination(&self, new: NewDestination) -> Result<VerifiedDestination, GeoError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(GeoError::InvalidInput("destination name is empty".into()));
        }
        let check = self.validator.validate(&new.coordinates);
        if !check.valid {
            return Err(GeoError::InvalidInput(check.error.unwrap_or_default()));
        }

        let coordinates = self.validator.normalize(&new.coordinates);
        let now = self.clock.now();
        let id = destination_id(name, &coordinates);

        let mut destinations = lock(&self.destinations);
        if let Some((existing_id, distance_km)) = closest_within(&destinations, &coordinates, CONSENSUS_RADIUS_KM) {
            return Err(GeoError::RegistrationConflict {
                existing_id,
                distance_m: distance_km * 1000.0,
            });
        }

        let sources = if new.sources.is_empty() {
            vec![new.verified_by.clone()]
        } else {
            new.sources
        };
        let destination = VerifiedDestination {
            id: id.clone(),
            name: name.to_string(),
            coordinates,
            accuracy: new.accuracy,
            verification_date: now,
            verified_by: new.verified_by,
            sources,
            alternative_names: new.alternative_names,
            metadata: new.metadata,
            confidence: new.confidence.clamp(0.0, 1.0),
            last_updated: now,
            update_frequency: new.update_frequency,
        };
        destinations.insert(id.clone(), destination.clone());
        info!(id = %id, coordinates = %coordinates, "registered verified destination");
        Ok(destination)
    }

    /// Replace a destination's coordinates, auditing the change through the verifier.
    pub async fn update_destination_coordinates(
        &self,
        id: &str,
        coordinates: Coordinates,
        source: &str,
        actor: &str,
    ) -> Result<VerifiedDestination, GeoError> {
        let check = self.validator.validate(&coordinates);
        if !check.valid {
            return Err(GeoError::InvalidInput(check.error.unwrap_or_default()));
        }
        let corrected = self.validator.normalize(&coordinates);

        let current = self.get(id).ok_or_else(|| GeoError::DestinationNotFound(id.to_string()))?;
        let confidence = (current.confidence + CONFIDENCE_BUMP).min(1.0);
        let now = self.clock.now();

        self.verifier
            .apply_coordinate_correction(CoordinateCorrection {
                original: current.coordinates,
                corrected,
                source: source.to_string(),
                confidence,
                actor: actor.to_string(),
                recorded_at: now,
            })
            .await?;

        let mut destinations = lock(&self.destinations);
        let entry = destinations
            .get_mut(id)
            .ok_or_else(|| GeoError::DestinationNotFound(id.to_string()))?;
        entry.coordinates = corrected;
        entry.confidence = (entry.confidence + CONFIDENCE_BUMP).min(1.0);
        entry.sources.insert(0, source.to_string());
        entry.last_updated = now;
        info!(id, from = %current.coordinates, to = %corrected, source, actor, "updated destination coordinates");
        Ok(entry.clone())
    }

    // ─── Conflicts ──────────────────────────────────────────────

    /// Pick coordinates for `name` from disagreeing options.
    ///
    /// Memoized per conflict signature: a repeat call within the same hour
    /// with the same option count returns the stored resolution.
    pub fn resolve_coordinate_conflict(
        &self,
        name: &str,
        options: &[CoordinateOption],
    ) -> Result<ConflictResolution, GeoError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GeoError::InvalidInput("conflict needs a destination name".into()));
        }

        let now = self.clock.now();
        let signature = conflict_signature(name, options.len(), now.timestamp());
        if let Some(existing) = lock(&self.conflicts).get(&signature) {
            debug!(conflict_id = %existing.conflict_id, "conflict already resolved");
            return Ok(existing.clone());
        }

        let usable: Vec<CoordinateOption> = options
            .iter()
            .filter(|o| self.validator.validate(&o.coordinates).valid)
            .cloned()
            .collect();
        if usable.is_empty() {
            return Err(GeoError::InvalidInput(format!(
                "no valid coordinate options for '{}'",
                name
            )));
        }

        let arbitration = {
            let mut catalog = lock(&self.catalog);
            for option in &usable {
                catalog.mark_used(&option.source, now);
            }
            arbitrate(&usable, &catalog, &self.validator)
        }
        .ok_or_else(|| GeoError::ConflictUnresolved(name.to_string()))?;

        if arbitration.strategy == ResolutionStrategy::ManualReview {
            warn!(
                destination = name,
                options = usable.len(),
                confidence = arbitration.confidence,
                "sources disagree; resolution needs manual review"
            );
        }

        let resolution = ConflictResolution {
            conflict_id: conflict_id(&signature),
            destination: name.to_string(),
            coordinates: usable.iter().map(|o| o.coordinates).collect(),
            sources: usable.iter().map(|o| o.source.clone()).collect(),
            option_count: options.len(),
            strategy: arbitration.strategy,
            resolved_coordinates: Some(arbitration.coordinates),
            resolved_by: "arbitration".to_string(),
            resolved_at: now,
            confidence: arbitration.confidence,
        };
        info!(
            conflict_id = %resolution.conflict_id,
            strategy = %resolution.strategy,
            "resolved coordinate conflict"
        );

        let stored = lock(&self.conflicts).entry(signature).or_insert(resolution).clone();
        Ok(stored)
    }

    pub fn conflicts(&self) -> Vec<ConflictResolution> {
        let mut all: Vec<_> = lock(&self.conflicts).values().cloned().collect();
        all.sort_by(|a, b| a.resolved_at.cmp(&b.resolved_at).then(a.conflict_id.cmp(&b.conflict_id)));
        all
    }

    // ─── Lookup ─────────────────────────────────────────────────

    pub fn find_destination(&self, lookup: DestinationLookup<'_>) -> Option<VerifiedDestination> {
        match lookup {
            DestinationLookup::Coordinates(c) => self.find_nearby_destination(&c, COORDINATE_MATCH_KM),
            DestinationLookup::Name(name) => self.find_by_name(name),
        }
    }

    fn find_by_name(&self, name: &str) -> Option<VerifiedDestination> {
        let query = name.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        let destinations = lock(&self.destinations);

        if let Some(d) = destinations.values().find(|d| d.matches_name(&query)) {
            return Some(d.clone());
        }
        if query.len() < MIN_FUZZY_QUERY_LEN {
            return None;
        }
        let query_words = words(&query);
        destinations
            .values()
            .find(|d| {
                d.all_names().any(|n| {
                    let name_words = words(n);
                    // "Eiffel Tower, Paris" names the landmark; "Sydney" only names
                    // part of "Sydney Opera House".
                    let mentions_name = name_words.join(" ").len() >= MIN_FUZZY_QUERY_LEN
                        && contains_words(&query_words, &name_words);
                    let covers_name =
                        contains_words(&name_words, &query_words) && query_words.len() * 2 > name_words.len();
                    mentions_name || covers_name
                })
            })
            .cloned()
    }

    /// The closest destination within `radius_km`, if any.
    pub fn find_nearby_destination(&self, coords: &Coordinates, radius_km: f64) -> Option<VerifiedDestination> {
        let destinations = lock(&self.destinations);
        closest_within(&destinations, coords, radius_km).and_then(|(id, _)| destinations.get(&id).cloned())
    }

    pub fn get(&self, id: &str) -> Option<VerifiedDestination> {
        lock(&self.destinations).get(id).cloned()
    }

    pub fn list(&self) -> Vec<VerifiedDestination> {
        lock(&self.destinations).values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.destinations).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ─── Scheduled re-verification ──────────────────────────────

    /// Queue every destination older than its update frequency.
    /// Returns how many ids were newly queued.
    pub fn schedule_data_update(&self) -> usize {
        let now = self.clock.now();
        let due: Vec<String> = lock(&self.destinations)
            .values()
            .filter(|d| (now - d.last_updated).num_days() > d.update_frequency.days())
            .map(|d| d.id.clone())
            .collect();

        let mut queue = lock(&self.update_queue);
        let mut queued = 0;
        for id in due {
            if !queue.contains(&id) {
                queue.push_back(id);
                queued += 1;
            }
        }
        if queued > 0 {
            info!(queued, pending = queue.len(), "scheduled destination re-verification");
        }
        queued
    }

    pub fn data_sources(&self) -> Vec<DataSource> {
        lock(&self.catalog).list()
    }

    pub fn pending_updates(&self) -> usize {
        lock(&self.update_queue).len()
    }

    /// Drain the queue: re-verify each entry, refresh inaccurate coordinates
    /// from the verifier's suggestion, otherwise just stamp `last_updated`.
    pub async fn process_update_queue(&self) -> UpdateReport {
        let mut report = UpdateReport::default();

        loop {
            let next = lock(&self.update_queue).pop_front();
            let Some(id) = next else { break };
            report.processed += 1;

            let Some(destination) = self.get(&id) else {
                warn!(id = %id, "queued destination no longer exists");
                report.failed += 1;
                continue;
            };

            let verdict = self
                .verifier
                .verify_coordinate_accuracy(destination.coordinates, &destination.name)
                .await;
            match verdict {
                Ok(AccuracyReport {
                    is_accurate: false,
                    verified_coordinates: Some(suggested),
                    ..
                }) => {
                    match self
                        .update_destination_coordinates(&id, suggested, "accuracy_verification", "scheduled_update")
                        .await
                    {
                        Ok(_) => report.refreshed += 1,
                        Err(e) => {
                            warn!(id = %id, error = %e, "could not refresh destination");
                            report.failed += 1;
                        }
                    }
                }
                Ok(_) => {
                    let now = self.clock.now();
                    if let Some(entry) = lock(&self.destinations).get_mut(&id) {
                        entry.last_updated = now;
                    }
                    report.stamped += 1;
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "re-verification failed");
                    report.failed += 1;
                }
            }
        }

        if report.processed > 0 {
            info!(
                processed = report.processed,
                refreshed = report.refreshed,
                stamped = report.stamped,
                failed = report.failed,
                "processed update queue"
            );
        }
        report
    }

    // ─── Stats & persistence ────────────────────────────────────

    pub fn stats(&self) -> RegistryStats {
        let (total_destinations, average_confidence) = {
            let destinations = lock(&self.destinations);
            let n = destinations.len();
            let mean = if n == 0 {
                0.0
            } else {
                destinations.values().map(|d| d.confidence).sum::<f64>() / n as f64
            };
            (n, mean)
        };
        RegistryStats {
            total_destinations,
            resolved_conflicts: lock(&self.conflicts).len(),
            pending_updates: self.pending_updates(),
            average_confidence,
            data_sources: lock(&self.catalog).len(),
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: self.clock.now(),
            destinations: self.list(),
            conflicts: self.conflicts(),
        }
    }

    /// Load a snapshot on top of the current state; same ids are overwritten.
    /// Returns how many destinations were loaded.
    pub fn restore(&self, snapshot: RegistrySnapshot) -> usize {
        let loaded = snapshot.destinations.len();
        {
            let mut destinations = lock(&self.destinations);
            for d in snapshot.destinations {
                destinations.insert(d.id.clone(), d);
            }
        }
        // Memo keys are signatures; rebuild them from the stored conflicts.
        // Older snapshots lack the option count and fall back to the kept options.
        let mut conflicts = lock(&self.conflicts);
        for c in snapshot.conflicts {
            let count = if c.option_count > 0 { c.option_count } else { c.coordinates.len() };
            let signature = conflict_signature(&c.destination, count, c.resolved_at.timestamp());
            conflicts.insert(signature, c);
        }
        loaded
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `needle` appears in `haystack` as a run of whole words.
fn contains_words(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// `"<slug>_<8 hex digits>"`, the hex part derived from the coordinates.
pub fn destination_id(name: &str, coords: &Coordinates) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    let slug = if slug.is_empty() { "destination" } else { slug };
    let hash = stable_hash(&format!("{:.6},{:.6}", coords.lat, coords.lng)) as u32;
    format!("{}_{:08x}", slug, hash)
}

fn closest_within(
    destinations: &BTreeMap<String, VerifiedDestination>,
    coords: &Coordinates,
    radius_km: f64,
) -> Option<(String, f64)> {
    destinations
        .values()
        .map(|d| (d, crate::location::validator::haversine_km(&d.coordinates, coords)))
        .filter(|(_, km)| *km <= radius_km)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(d, km)| (d.id.clone(), km))
}
