//! Location subsystem: coordinate validation and the tiered geocoder.
//!
//! Provides coordinate validation/normalization, address geocoding through
//! a cache and a chain of providers, and a built-in fallback table.

pub mod cache;
pub mod executor;
pub mod geocoder;
pub mod providers;
pub mod rate_limit;
pub mod types;
pub mod validator;

pub use executor::{PassthroughExecutor, ResilientExecutor, RetryingExecutor};
pub use geocoder::{GeocodeStats, GeocoderSettings, GeocodingService};
pub use providers::manual::{manual_place_list, ManualPlaceInfo};
pub use providers::{GeocodingProvider, GoogleProvider, NominatimProvider, RawPlace};
pub use types::{
    Accuracy, AddressComponents, BoundingBox, Coordinates, GeocodeResult, PrecisionCheck, PrecisionLevel,
    ResultSource, ReverseGeocodeResult, ValidationResult,
};
pub use validator::{haversine_km, CoordinateValidator};
