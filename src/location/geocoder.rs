//! Geocoding service: runs the tier chain.
//!
//! Forward flow: sanitize → rate limit → cache → primary → secondary → manual table → error
//! Reverse flow: validate → primary → secondary → error
//!
//! Every tier's coordinates are revalidated before they are accepted; a tier
//! that returns structurally invalid coordinates counts as a failed tier.

use super::cache::{CacheLookup, GeocodeCache, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_HOURS};
use super::executor::{PassthroughExecutor, ResilientExecutor};
use super::providers::{manual, GeocodingProvider, NormalizedPlace, RawPlace};
use super::rate_limit::{RateLimiter, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECS};
use super::types::{Coordinates, GeocodeResult, ReverseGeocodeResult};
use super::validator::CoordinateValidator;
use crate::clock::{Clock, SystemClock};
use crate::error::{GeoError, ProviderError};
use crate::lock;
use chrono::Duration;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

pub const MAX_ADDRESS_LEN: usize = 500;
pub const MIN_ADDRESS_LEN: usize = 2;
pub const DEFAULT_CALLER: &str = "anonymous";

const SAFE_PUNCTUATION: &[char] = &[',', '.', '-', '\'', '#', '/', '&', '(', ')'];

/// Tunables for the geocoding service.
#[derive(Debug, Clone)]
pub struct GeocoderSettings {
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub rate_limit_requests: usize,
    pub rate_limit_window: Duration,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::hours(DEFAULT_CACHE_TTL_HOURS),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            rate_limit_requests: DEFAULT_MAX_REQUESTS,
            rate_limit_window: Duration::seconds(DEFAULT_WINDOW_SECS),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: u64,
    cache_hits: u64,
    primary_requests: u64,
    secondary_requests: u64,
    manual_requests: u64,
    primary_successes: u64,
    secondary_successes: u64,
    manual_successes: u64,
    reverse_requests: u64,
    errors: u64,
    completed: u64,
    average_response_ms: f64,
}

impl Counters {
    fn record_response(&mut self, started: Instant) {
        let ms = started.elapsed().as_secs_f64() * 1000.0;
        self.completed += 1;
        self.average_response_ms += (ms - self.average_response_ms) / self.completed as f64;
    }
}

/// Snapshot of geocoder statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub primary_requests: u64,
    pub secondary_requests: u64,
    pub manual_requests: u64,
    pub primary_successes: u64,
    pub secondary_successes: u64,
    pub manual_successes: u64,
    pub reverse_requests: u64,
    pub errors: u64,
    pub average_response_ms: f64,
    pub cache_size: usize,
    pub cache_capacity: usize,
    pub cache_hit_rate: f64,
}

#[derive(Debug, Clone, Copy)]
enum Tier {
    Primary,
    Secondary,
}

impl Tier {
    fn label(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// The geocoder with its cache, rate limiter and provider tiers.
pub struct GeocodingService {
    validator: CoordinateValidator,
    executor: Arc<dyn ResilientExecutor>,
    primary: Option<Arc<dyn GeocodingProvider>>,
    secondary: Option<Arc<dyn GeocodingProvider>>,
    clock: Arc<dyn Clock>,
    cache: Mutex<GeocodeCache>,
    limiter: Mutex<RateLimiter>,
    counters: Mutex<Counters>,
}

impl GeocodingService {
    /// A service with no network providers; only cache and the manual table answer.
    pub fn new(settings: GeocoderSettings) -> Self {
        Self {
            validator: CoordinateValidator::new(),
            executor: Arc::new(PassthroughExecutor),
            primary: None,
            secondary: None,
            clock: Arc::new(SystemClock),
            cache: Mutex::new(GeocodeCache::new(settings.cache_ttl, settings.cache_capacity)),
            limiter: Mutex::new(RateLimiter::new(settings.rate_limit_requests, settings.rate_limit_window)),
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn with_primary(mut self, provider: Arc<dyn GeocodingProvider>) -> Self {
        self.primary = Some(provider);
        self
    }

    pub fn with_secondary(mut self, provider: Arc<dyn GeocodingProvider>) -> Self {
        self.secondary = Some(provider);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn ResilientExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Geocode on behalf of the anonymous caller.
    pub async fn geocode(&self, address: &str) -> Result<GeocodeResult, GeoError> {
        self.geocode_for(DEFAULT_CALLER, address).await
    }

    /// Geocode an address, rate-limited per `caller`.
    pub async fn geocode_for(&self, caller: &str, address: &str) -> Result<GeocodeResult, GeoError> {
        let started = Instant::now();
        lock(&self.counters).total_requests += 1;

        let result = self.run_tiers(caller, address).await;

        let mut counters = lock(&self.counters);
        if result.is_err() {
            counters.errors += 1;
        }
        counters.record_response(started);
        result
    }

    async fn run_tiers(&self, caller: &str, address: &str) -> Result<GeocodeResult, GeoError> {
        let sanitized = sanitize_address(address)?;
        let now = self.clock.now();

        {
            let mut limiter = lock(&self.limiter);
            if !limiter.check(caller, now) {
                warn!(caller, "geocode request rate-limited");
                return Err(GeoError::RateLimited {
                    caller: caller.to_string(),
                    limit: limiter.max_requests(),
                    window_secs: limiter.window().num_seconds().max(0) as u64,
                });
            }
        }

        let lookup = lock(&self.cache).get(&sanitized, now);
        match lookup {
            CacheLookup::Hit(hit) => {
                debug!(address = %sanitized, "geocode cache hit");
                lock(&self.counters).cache_hits += 1;
                return Ok(hit);
            }
            CacheLookup::Expired => debug!(address = %sanitized, "evicted stale cache entry"),
            CacheLookup::Miss => {}
        }

        let mut failures = Vec::new();

        for tier in [Tier::Primary, Tier::Secondary] {
            let Some(provider) = self.provider(tier) else {
                debug!(tier = tier.label(), "provider not configured, skipping");
                failures.push(format!("{}: not configured", tier.label()));
                continue;
            };

            self.count_attempt(tier);
            match self.search_tier(provider.as_ref(), &sanitized).await {
                Ok(result) => {
                    self.count_success(tier);
                    lock(&self.cache).put(&sanitized, &result, self.clock.now());
                    debug!(tier = tier.label(), source = %result.source, "geocode resolved");
                    return Ok(result);
                }
                Err(e) => {
                    warn!(tier = tier.label(), source = %provider.source(), error = %e, address = %sanitized, "geocode tier failed");
                    failures.push(format!("{} ({}): {}", tier.label(), provider.source(), e));
                }
            }
        }

        lock(&self.counters).manual_requests += 1;
        if let Some(result) = manual::lookup(&sanitized) {
            let check = self.validator.validate(&result.coordinates);
            if check.valid {
                lock(&self.counters).manual_successes += 1;
                debug!(address = %sanitized, "geocode resolved from manual table");
                return Ok(result);
            }
            failures.push(format!("manual: {}", check.error.unwrap_or_default()));
        } else {
            failures.push("manual: no match".to_string());
        }

        warn!(address = %sanitized, ?failures, "all geocoding providers failed");
        Err(GeoError::AllProvidersFailed {
            address: sanitized,
            failures,
        })
    }

    async fn search_tier(&self, provider: &dyn GeocodingProvider, address: &str) -> Result<GeocodeResult, ProviderError> {
        let places = self
            .executor
            .execute(Box::new(move || provider.search(address)))
            .await?;
        let place = self.first_valid_place(places)?;
        Ok(GeocodeResult {
            coordinates: place.coordinates,
            formatted_address: place.formatted_address,
            place_id: place.place_id,
            accuracy: place.accuracy,
            source: provider.source(),
            components: place.components,
            bounding_box: place.bounding_box,
            cached_from: None,
        })
    }

    fn first_valid_place(&self, places: Vec<RawPlace>) -> Result<NormalizedPlace, ProviderError> {
        let raw = places.into_iter().next().ok_or(ProviderError::NoResults)?;
        let mut place = raw.into_place()?;
        let check = self.validator.validate(&place.coordinates);
        if !check.valid {
            return Err(ProviderError::InvalidCoordinates(check.error.unwrap_or_default()));
        }
        place.coordinates = self.validator.normalize(&place.coordinates);
        Ok(place)
    }

    /// Reverse geocode through the network tiers only.
    pub async fn reverse_geocode(&self, coords: Coordinates) -> Result<ReverseGeocodeResult, GeoError> {
        let started = Instant::now();
        lock(&self.counters).reverse_requests += 1;

        let result = self.run_reverse(coords).await;

        let mut counters = lock(&self.counters);
        if result.is_err() {
            counters.errors += 1;
        }
        counters.record_response(started);
        result
    }

    async fn run_reverse(&self, coords: Coordinates) -> Result<ReverseGeocodeResult, GeoError> {
        let check = self.validator.validate(&coords);
        if !check.valid {
            return Err(GeoError::InvalidInput(check.error.unwrap_or_default()));
        }
        let coords = self.validator.normalize(&coords);
        let mut failures = Vec::new();

        for tier in [Tier::Primary, Tier::Secondary] {
            let Some(provider) = self.provider(tier) else {
                failures.push(format!("{}: not configured", tier.label()));
                continue;
            };
            self.count_attempt(tier);
            let provider = provider.as_ref();
            let attempt = self
                .executor
                .execute(Box::new(move || provider.reverse(coords)))
                .await
                .and_then(|places| self.first_valid_place(places));
            match attempt {
                Ok(place) => {
                    self.count_success(tier);
                    return Ok(ReverseGeocodeResult {
                        coordinates: place.coordinates,
                        formatted_address: place.formatted_address,
                        place_id: place.place_id,
                        source: provider.source(),
                        components: place.components,
                    });
                }
                Err(e) => {
                    warn!(tier = tier.label(), error = %e, %coords, "reverse geocode tier failed");
                    failures.push(format!("{} ({}): {}", tier.label(), provider.source(), e));
                }
            }
        }

        Err(GeoError::AllProvidersFailed {
            address: coords.to_string(),
            failures,
        })
    }

    fn provider(&self, tier: Tier) -> Option<&Arc<dyn GeocodingProvider>> {
        match tier {
            Tier::Primary => self.primary.as_ref(),
            Tier::Secondary => self.secondary.as_ref(),
        }
    }

    fn count_attempt(&self, tier: Tier) {
        let mut c = lock(&self.counters);
        match tier {
            Tier::Primary => c.primary_requests += 1,
            Tier::Secondary => c.secondary_requests += 1,
        }
    }

    fn count_success(&self, tier: Tier) {
        let mut c = lock(&self.counters);
        match tier {
            Tier::Primary => c.primary_successes += 1,
            Tier::Secondary => c.secondary_successes += 1,
        }
    }

    /// Drop every cached result. Returns how many were held.
    pub fn clear_cache(&self) -> usize {
        lock(&self.cache).clear()
    }

    /// Drop expired cache entries and idle rate-limit windows.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        lock(&self.limiter).prune_idle(now);
        lock(&self.cache).purge_expired(now)
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub fn stats(&self) -> GeocodeStats {
        let (cache_size, cache_capacity) = {
            let cache = lock(&self.cache);
            (cache.len(), cache.capacity())
        };
        let c = lock(&self.counters);
        let cache_hit_rate = if c.total_requests == 0 {
            0.0
        } else {
            c.cache_hits as f64 / c.total_requests as f64
        };
        GeocodeStats {
            total_requests: c.total_requests,
            cache_hits: c.cache_hits,
            primary_requests: c.primary_requests,
            secondary_requests: c.secondary_requests,
            manual_requests: c.manual_requests,
            primary_successes: c.primary_successes,
            secondary_successes: c.secondary_successes,
            manual_successes: c.manual_successes,
            reverse_requests: c.reverse_requests,
            errors: c.errors,
            average_response_ms: c.average_response_ms,
            cache_size,
            cache_capacity,
            cache_hit_rate,
        }
    }
}

impl Default for GeocodingService {
    fn default() -> Self {
        Self::new(GeocoderSettings::default())
    }
}

/// Trim, cap, strip unsafe characters and collapse whitespace.
pub fn sanitize_address(input: &str) -> Result<String, GeoError> {
    let capped: String = input.trim().chars().take(MAX_ADDRESS_LEN).collect();
    let cleaned: String = capped
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || SAFE_PUNCTUATION.contains(c))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() < MIN_ADDRESS_LEN {
        return Err(GeoError::InvalidInput(format!(
            "address must contain at least {} usable characters",
            MIN_ADDRESS_LEN
        )));
    }
    Ok(collapsed)
}
