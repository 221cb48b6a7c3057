//! Meridian: coordinate resolution engine.
//!
//! Turns free-text destinations into checked coordinates. A lookup goes
//! through the verified-destination registry first, then a tiered geocoder
//! (cache, Google, Nominatim, built-in table), and the answer is validated
//! and cross-checked before it reaches the caller.

pub mod clock;
pub mod config;
pub mod error;
pub mod integration;
pub mod location;
pub mod registry;
pub mod server;
pub mod verification;

#[cfg(test)]
mod testing;

use std::sync::{Mutex, MutexGuard};

pub use error::{GeoError, ProviderError};
pub use integration::CoordinateIntegrationService;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}
