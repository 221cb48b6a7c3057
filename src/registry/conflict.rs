//! Arbitration between disagreeing coordinate observations.
//!
//! Order of attempts:
//!   1. highest-reliability source, if it scores at least 7/10
//!   2. consensus: the largest cluster (≥ 2 members) within 100 m of its centroid
//!   3. manual review: the most confident option, confidence cut by 20%

use super::sources::SourceCatalog;
use super::types::{CoordinateOption, ResolutionStrategy};
use crate::location::types::Coordinates;
use crate::location::validator::CoordinateValidator;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub const RELIABILITY_THRESHOLD: u8 = 7;
pub const CONSENSUS_RADIUS_KM: f64 = 0.1;
pub const CONSENSUS_BOOST: f64 = 1.1;
pub const MANUAL_REVIEW_PENALTY: f64 = 0.8;
/// Width of the time bucket folded into a conflict signature.
pub const SIGNATURE_BUCKET_SECS: i64 = 3600;

/// The chosen answer for a set of options.
#[derive(Debug, Clone, PartialEq)]
pub struct Arbitration {
    pub strategy: ResolutionStrategy,
    pub coordinates: Coordinates,
    pub confidence: f64,
}

struct Cluster {
    members: Vec<usize>,
    centroid: Coordinates,
}

/// Pick coordinates for `options`. Returns `None` when there are no options.
pub fn arbitrate(
    options: &[CoordinateOption],
    catalog: &SourceCatalog,
    validator: &CoordinateValidator,
) -> Option<Arbitration> {
    let mut ranked: Vec<&CoordinateOption> = options.iter().collect();
    ranked.sort_by(|a, b| {
        catalog
            .reliability_score(&b.source)
            .cmp(&catalog.reliability_score(&a.source))
            .then(b.confidence.total_cmp(&a.confidence))
    });
    let top = *ranked.first()?;

    if catalog.reliability_score(&top.source) >= RELIABILITY_THRESHOLD {
        return Some(Arbitration {
            strategy: ResolutionStrategy::HighestReliability,
            coordinates: validator.normalize(&top.coordinates),
            confidence: top.confidence.clamp(0.0, 1.0),
        });
    }

    if let Some(cluster) = largest_cluster(options, validator) {
        let mean_confidence =
            cluster.members.iter().map(|&i| options[i].confidence).sum::<f64>() / cluster.members.len() as f64;
        return Some(Arbitration {
            strategy: ResolutionStrategy::Consensus,
            coordinates: validator.normalize(&cluster.centroid),
            confidence: (mean_confidence * CONSENSUS_BOOST).clamp(0.0, 1.0),
        });
    }

    let most_confident = options
        .iter()
        .reduce(|best, o| if o.confidence > best.confidence { o } else { best })?;
    Some(Arbitration {
        strategy: ResolutionStrategy::ManualReview,
        coordinates: validator.normalize(&most_confident.coordinates),
        confidence: (most_confident.confidence * MANUAL_REVIEW_PENALTY).clamp(0.0, 1.0),
    })
}

/// Group options around running centroids; the biggest group of two or more wins.
fn largest_cluster(options: &[CoordinateOption], validator: &CoordinateValidator) -> Option<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();

    for (i, option) in options.iter().enumerate() {
        let home = clusters
            .iter_mut()
            .find(|c| validator.calculate_distance(&c.centroid, &option.coordinates) <= CONSENSUS_RADIUS_KM);
        match home {
            Some(cluster) => {
                cluster.members.push(i);
                cluster.centroid = centroid(cluster.members.iter().map(|&m| options[m].coordinates));
            }
            None => clusters.push(Cluster {
                members: vec![i],
                centroid: option.coordinates,
            }),
        }
    }

    // Ties go to the cluster formed first.
    clusters
        .into_iter()
        .filter(|c| c.members.len() >= 2)
        .reduce(|best, c| if c.members.len() > best.members.len() { c } else { best })
}

fn centroid(points: impl Iterator<Item = Coordinates>) -> Coordinates {
    let (mut lat, mut lng, mut n) = (0.0, 0.0, 0usize);
    for p in points {
        lat += p.lat;
        lng += p.lng;
        n += 1;
    }
    if n == 0 {
        return Coordinates::unset();
    }
    Coordinates::new(lat / n as f64, lng / n as f64)
}

/// Identity of a conflict: name, option count and time bucket.
pub fn conflict_signature(name: &str, option_count: usize, unix_secs: i64) -> String {
    let bucket = unix_secs.div_euclid(SIGNATURE_BUCKET_SECS);
    format!("{}|{}|{}", name.trim().to_lowercase(), option_count, bucket)
}

/// Stable identifier derived from a signature.
pub fn conflict_id(signature: &str) -> String {
    format!("conflict_{:016x}", stable_hash(signature))
}

pub(crate) fn stable_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
