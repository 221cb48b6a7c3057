//! Coordinate validation and normalization.
//!
//! Pure and stateless: every check reports through [`ValidationResult`],
//! nothing here returns an error or panics on bad input.

use super::types::{Accuracy, BoundingBox, Coordinates, PrecisionCheck, PrecisionLevel, ValidationResult};

const EARTH_RADIUS_KM: f64 = 6371.0;
const POLAR_LATITUDE: f64 = 66.5;
const MAX_COUNTED_DECIMALS: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Error,
    Warning,
}

struct RestrictedArea {
    name: &'static str,
    bounds: BoundingBox,
    severity: Severity,
}

const RESTRICTED_AREAS: &[RestrictedArea] = &[
    RestrictedArea {
        name: "Area 51 (Nevada Test and Training Range)",
        bounds: BoundingBox::new(37.20, -115.90, 37.30, -115.75),
        severity: Severity::Error,
    },
    RestrictedArea {
        name: "Korean Demilitarized Zone",
        bounds: BoundingBox::new(37.90, 126.10, 38.30, 128.40),
        severity: Severity::Error,
    },
    RestrictedArea {
        name: "The Pentagon",
        bounds: BoundingBox::new(38.868, -77.060, 38.874, -77.052),
        severity: Severity::Warning,
    },
    RestrictedArea {
        name: "Pine Gap",
        bounds: BoundingBox::new(-23.82, 133.72, -23.78, 133.76),
        severity: Severity::Warning,
    },
];

// Open-water boxes kept clear of coastlines; islands inside them only warn.
const OCEANS: &[(&str, BoundingBox)] = &[
    ("North Pacific Ocean", BoundingBox::new(25.0, -170.0, 45.0, -135.0)),
    ("South Pacific Ocean", BoundingBox::new(-60.0, -150.0, -10.0, -90.0)),
    ("North Atlantic Ocean", BoundingBox::new(20.0, -60.0, 50.0, -20.0)),
    ("South Atlantic Ocean", BoundingBox::new(-50.0, -30.0, -5.0, 5.0)),
    ("Indian Ocean", BoundingBox::new(-45.0, 60.0, -5.0, 95.0)),
];

const DESERTS: &[(&str, BoundingBox)] = &[
    ("Sahara Desert", BoundingBox::new(15.0, -15.0, 29.5, 30.0)),
    ("Gobi Desert", BoundingBox::new(40.0, 95.0, 45.0, 110.0)),
    ("Atacama Desert", BoundingBox::new(-27.0, -71.0, -18.0, -68.5)),
    ("Rub' al Khali", BoundingBox::new(17.5, 44.0, 23.0, 56.0)),
];

/// Validates and normalizes coordinate pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateValidator;

impl CoordinateValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run every structural and geographic check on `coords`.
    pub fn validate(&self, coords: &Coordinates) -> ValidationResult {
        let Coordinates { lat, lng } = *coords;

        if !lat.is_finite() || !lng.is_finite() {
            return ValidationResult::invalid("Coordinates must be finite numbers");
        }
        if !(-90.0..=90.0).contains(&lat) {
            return ValidationResult::invalid(format!("Latitude {} is outside [-90, 90]", lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return ValidationResult::invalid(format!("Longitude {} is outside [-180, 180]", lng));
        }
        if coords.is_unset() {
            return ValidationResult::invalid("Coordinates (0, 0) are not a valid location (Null Island)");
        }

        let mut warnings = Vec::new();

        let precision = decimal_places(lat).min(decimal_places(lng));
        let accuracy = accuracy_for_precision(precision);
        if precision < PrecisionLevel::City.required_decimals() {
            warnings.push(format!(
                "Low coordinate precision ({} decimal places); location may be off by more than 100 m",
                precision
            ));
        }

        for area in RESTRICTED_AREAS.iter().filter(|a| a.bounds.contains(coords)) {
            match area.severity {
                Severity::Error => {
                    return ValidationResult {
                        valid: false,
                        error: Some(format!("Coordinates fall inside a restricted area: {}", area.name)),
                        warnings,
                        accuracy: Some(accuracy),
                    };
                }
                Severity::Warning => {
                    warnings.push(format!("Coordinates are near a restricted area: {}", area.name));
                }
            }
        }

        if let Some((ocean, _)) = OCEANS.iter().find(|(_, b)| b.contains(coords)) {
            warnings.push(format!(
                "Coordinates appear to be in the {}; verify this is correct for your destination",
                ocean
            ));
        }

        if lat.abs() > POLAR_LATITUDE {
            warnings.push("Coordinates are in a polar region; services may be limited".to_string());
        }

        if let Some((desert, _)) = DESERTS.iter().find(|(_, b)| b.contains(coords)) {
            warnings.push(format!("Coordinates are in the {}; verify accessibility", desert));
        }

        ValidationResult {
            valid: true,
            error: None,
            warnings,
            accuracy: Some(accuracy),
        }
    }

    /// Clamp latitude, wrap longitude into [-180, 180] and round to 6 decimals.
    pub fn normalize(&self, coords: &Coordinates) -> Coordinates {
        let lat = coords.lat.clamp(-90.0, 90.0);
        let lng = if (-180.0..=180.0).contains(&coords.lng) {
            coords.lng
        } else {
            (coords.lng + 180.0).rem_euclid(360.0) - 180.0
        };
        Coordinates::new(round6(lat), round6(lng))
    }

    /// Great-circle distance in kilometres.
    pub fn calculate_distance(&self, a: &Coordinates, b: &Coordinates) -> f64 {
        haversine_km(a, b)
    }

    /// Whether both axes carry enough decimals for `level`.
    pub fn validate_precision(&self, coords: &Coordinates, level: PrecisionLevel) -> PrecisionCheck {
        let actual = decimal_places(coords.lat).min(decimal_places(coords.lng));
        let required = level.required_decimals();
        PrecisionCheck {
            meets_requirement: actual >= required,
            required_decimals: required,
            actual_decimals: actual,
        }
    }

    pub fn validate_batch(&self, coords: &[Coordinates]) -> Vec<ValidationResult> {
        coords.iter().map(|c| self.validate(c)).collect()
    }
}

/// Haversine distance between two points, in kilometres.
pub fn haversine_km(a: &Coordinates, b: &Coordinates) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

/// Number of digits after the decimal point in the shortest representation of `v`.
fn decimal_places(v: f64) -> u32 {
    let s = v.to_string();
    match s.split_once('.') {
        Some((_, frac)) => (frac.len() as u32).min(MAX_COUNTED_DECIMALS),
        None => 0,
    }
}

// Four decimals (~11 m) already pins down a destination; anything coarser
// is low and carries the precision warning.
fn accuracy_for_precision(decimals: u32) -> Accuracy {
    if decimals < PrecisionLevel::City.required_decimals() {
        Accuracy::Low
    } else {
        Accuracy::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn v() -> CoordinateValidator {
        CoordinateValidator::new()
    }

    #[test]
    fn test_null_island_invalid() {
        let r = v().validate(&Coordinates::new(0.0, 0.0));
        assert!(!r.valid);
        assert!(r.error.unwrap().contains("Null Island"));
    }

    #[test]
    fn test_out_of_range_invalid() {
        assert!(!v().validate(&Coordinates::new(91.0, 0.0)).valid);
        assert!(!v().validate(&Coordinates::new(0.0, 181.0)).valid);
        assert!(!v().validate(&Coordinates::new(-90.5, 10.0)).valid);
    }

    #[test]
    fn test_nan_invalid() {
        assert!(!v().validate(&Coordinates::new(f64::NAN, 2.0)).valid);
        assert!(!v().validate(&Coordinates::new(2.0, f64::INFINITY)).valid);
    }

    #[test]
    fn test_paris_valid_high() {
        let r = v().validate(&Coordinates::new(48.8566, 2.3522));
        assert!(r.valid);
        assert_eq!(r.accuracy, Some(Accuracy::High));
        assert!(r.warnings.is_empty(), "unexpected warnings: {:?}", r.warnings);
    }

    #[test]
    fn test_low_precision_warns() {
        let r = v().validate(&Coordinates::new(48.9, 2.4));
        assert!(r.valid);
        assert_eq!(r.accuracy, Some(Accuracy::Low));
        assert!(r.warnings.iter().any(|w| w.contains("precision")));

        let r = v().validate(&Coordinates::new(48.857, 2.352));
        assert_eq!(r.accuracy, Some(Accuracy::Low));
        assert!(r.warnings.iter().any(|w| w.contains("3 decimal places")));
    }

    #[test]
    fn test_precision_tiers_agree_with_warning() {
        for (lat, lng) in [(48.8, 2.3), (48.85, 2.35), (48.857, 2.352)] {
            let r = v().validate(&Coordinates::new(lat, lng));
            assert_eq!(r.accuracy, Some(Accuracy::Low), "{} {}", lat, lng);
            assert!(r.warnings.iter().any(|w| w.contains("precision")));
        }
        for (lat, lng) in [(48.8566, 2.3522), (48.85661, 2.35222), (48.856614, 2.352222)] {
            let r = v().validate(&Coordinates::new(lat, lng));
            assert_eq!(r.accuracy, Some(Accuracy::High), "{} {}", lat, lng);
            assert!(!r.warnings.iter().any(|w| w.contains("precision")));
        }
    }

    #[test]
    fn test_restricted_error_fails() {
        let r = v().validate(&Coordinates::new(37.2431, -115.7930));
        assert!(!r.valid);
        assert!(r.error.unwrap().contains("Area 51"));
    }

    #[test]
    fn test_restricted_warning_passes() {
        let r = v().validate(&Coordinates::new(38.8719, -77.0563));
        assert!(r.valid);
        assert!(r.warnings.iter().any(|w| w.contains("Pentagon")));
    }

    #[test]
    fn test_ocean_warning() {
        let r = v().validate(&Coordinates::new(35.0001, -150.0001));
        assert!(r.valid);
        assert!(r.warnings.iter().any(|w| w.contains("Pacific")));
    }

    #[test]
    fn test_polar_and_desert_warnings() {
        let r = v().validate(&Coordinates::new(78.2232, 15.6267));
        assert!(r.valid);
        assert!(r.warnings.iter().any(|w| w.contains("polar")));

        let r = v().validate(&Coordinates::new(23.4162, 25.6628));
        assert!(r.valid);
        assert!(r.warnings.iter().any(|w| w.contains("Sahara")));
    }

    #[test]
    fn test_normalize_clamps_and_wraps() {
        let n = v().normalize(&Coordinates::new(95.0, 185.0));
        assert_eq!(n, Coordinates::new(90.0, -175.0));

        let n = v().normalize(&Coordinates::new(-12.12345678, -190.0));
        assert_eq!(n, Coordinates::new(-12.123457, 170.0));
    }

    #[test]
    fn test_normalize_keeps_antimeridian() {
        let n = v().normalize(&Coordinates::new(10.0, 180.0));
        assert_eq!(n.lng, 180.0);
    }

    #[test]
    fn test_distance_symmetric_and_zero() {
        let paris = Coordinates::new(48.8566, 2.3522);
        let london = Coordinates::new(51.5074, -0.1278);
        let d1 = v().calculate_distance(&paris, &london);
        let d2 = v().calculate_distance(&london, &paris);
        assert_abs_diff_eq!(d1, d2, epsilon = 1e-9);
        assert_abs_diff_eq!(d1, 343.5, epsilon = 1.0);
        assert_eq!(v().calculate_distance(&paris, &paris), 0.0);
    }

    #[test]
    fn test_validate_precision_levels() {
        let c = Coordinates::new(48.85661, 2.35222);
        assert!(v().validate_precision(&c, PrecisionLevel::City).meets_requirement);
        assert!(v().validate_precision(&c, PrecisionLevel::Building).meets_requirement);
        let room = v().validate_precision(&c, PrecisionLevel::Room);
        assert!(!room.meets_requirement);
        assert_eq!(room.actual_decimals, 5);
        assert_eq!(room.required_decimals, 6);
    }

    #[test]
    fn test_batch_preserves_order() {
        let list = [
            Coordinates::new(48.8566, 2.3522),
            Coordinates::new(0.0, 0.0),
            Coordinates::new(91.0, 0.0),
        ];
        let results = v().validate_batch(&list);
        assert_eq!(results.len(), 3);
        assert!(results[0].valid);
        assert!(!results[1].valid);
        assert!(!results[2].valid);
    }

    #[test]
    fn test_decimal_places() {
        assert_eq!(decimal_places(48.8566), 4);
        assert_eq!(decimal_places(2.0), 0);
        assert_eq!(decimal_places(-0.1278), 4);
    }
}
