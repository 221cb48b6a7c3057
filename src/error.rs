//! Error taxonomy for the coordinate resolution engine.
//!
//! `ProviderError` describes why a single provider tier failed.
//! `GeoError` is what callers of the geocoder and the registry see.

use thiserror::Error;

/// Failure of one provider call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("provider credential not configured")]
    MissingCredential,

    #[error("provider rejected credentials: {0}")]
    Auth(String),

    #[error("provider quota exceeded")]
    QuotaExceeded,

    #[error("provider request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned HTTP {status}")]
    Http { status: u16 },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("provider found no match")]
    NoResults,

    #[error("provider returned invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

impl ProviderError {
    /// Map an HTTP status to the matching provider failure.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth(format!("HTTP {}", status)),
            408 | 504 => Self::Timeout,
            429 => Self::QuotaExceeded,
            _ => Self::Http { status },
        }
    }
}

/// Errors surfaced by the geocoder and the destination registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("rate limit exceeded for '{caller}' ({limit} requests per {window_secs}s)")]
    RateLimited {
        caller: String,
        limit: usize,
        window_secs: u64,
    },

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("no location found for '{0}'")]
    NotFound(String),

    #[error("all geocoding providers failed for '{address}'")]
    AllProvidersFailed {
        address: String,
        /// One line per tier that was attempted, in tier order.
        failures: Vec<String>,
    },

    #[error("coordinate conflict for '{0}' could not be resolved")]
    ConflictUnresolved(String),

    #[error("destination '{existing_id}' is already registered {distance_m:.0} m away")]
    RegistrationConflict { existing_id: String, distance_m: f64 },

    #[error("destination '{0}' not found")]
    DestinationNotFound(String),

    #[error("accuracy verification failed: {0}")]
    Verification(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl GeoError {
    /// Stable machine-readable tag for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid-input",
            Self::RateLimited { .. } => "rate-limited",
            Self::Provider(_) => "provider-error",
            Self::NotFound(_) => "not-found",
            Self::AllProvidersFailed { .. } => "all-providers-failed",
            Self::ConflictUnresolved(_) => "conflict-unresolved",
            Self::RegistrationConflict { .. } => "registration-conflict",
            Self::DestinationNotFound(_) => "destination-not-found",
            Self::Verification(_) => "verification-failed",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }
}

impl From<std::io::Error> for GeoError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for GeoError {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(e.to_string())
    }
}
