//! Engine configuration, loaded from `~/.meridian/config.json`.
//!
//! Every field has a default, so a missing file or a partial file both work.
//! `MERIDIAN_GOOGLE_API_KEY` overrides the key from the file.

use crate::error::GeoError;
use crate::integration::CoordinateIntegrationService;
use crate::location::executor::RetryingExecutor;
use crate::location::geocoder::{GeocoderSettings, GeocodingService};
use crate::location::providers::google::DEFAULT_GOOGLE_URL;
use crate::location::providers::nominatim::DEFAULT_NOMINATIM_URL;
use crate::location::providers::{GoogleProvider, NominatimProvider};
use crate::registry::manager::GeographicDataManager;
use crate::registry::store;
use crate::verification::HeuristicVerifier;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const API_KEY_ENV: &str = "MERIDIAN_GOOGLE_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Google Geocoding key. Without one the primary tier is skipped.
    pub google_api_key: Option<String>,
    pub google_url: String,
    pub nominatim_url: String,
    pub user_agent: String,
    pub primary_timeout_secs: u64,
    /// The secondary is slower; give it more room.
    pub secondary_timeout_secs: u64,
    pub cache_ttl_hours: i64,
    pub cache_capacity: usize,
    pub rate_limit_requests: usize,
    pub rate_limit_window_secs: i64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Registry snapshot to load at startup and save on exit.
    pub registry_path: Option<PathBuf>,
    /// Seed the registry with the built-in landmarks.
    pub seed_registry: bool,
    /// Skip both network tiers.
    pub offline: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            google_api_key: None,
            google_url: DEFAULT_GOOGLE_URL.to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            user_agent: format!("meridian-geo/{}", env!("CARGO_PKG_VERSION")),
            primary_timeout_secs: 5,
            secondary_timeout_secs: 10,
            cache_ttl_hours: 24,
            cache_capacity: 1000,
            rate_limit_requests: 60,
            rate_limit_window_secs: 60,
            retry_attempts: 2,
            retry_backoff_ms: 250,
            registry_path: None,
            seed_registry: true,
            offline: false,
        }
    }
}

impl EngineConfig {
    /// `~/.meridian/config.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".meridian")
            .join("config.json")
    }

    /// Load from the default path, then apply the environment.
    pub fn load() -> Result<Self, GeoError> {
        let mut config = Self::load_from(&Self::default_path())?;
        config.apply_api_key(std::env::var(API_KEY_ENV).ok());
        Ok(config)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, GeoError> {
        let data = match fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&data)
            .map_err(|e| GeoError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Override the key when `key` is set and non-blank.
    pub fn apply_api_key(&mut self, key: Option<String>) {
        if let Some(key) = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
            self.google_api_key = Some(key);
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.google_api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn geocoder_settings(&self) -> GeocoderSettings {
        GeocoderSettings {
            cache_ttl: chrono::Duration::hours(self.cache_ttl_hours.max(0)),
            cache_capacity: self.cache_capacity.max(1),
            rate_limit_requests: self.rate_limit_requests.max(1),
            rate_limit_window: chrono::Duration::seconds(self.rate_limit_window_secs.max(1)),
        }
    }

    /// Geocoder with the provider tiers this config enables.
    pub fn build_geocoder(&self) -> GeocodingService {
        let mut geocoder = GeocodingService::new(self.geocoder_settings()).with_executor(Arc::new(
            RetryingExecutor::new(self.retry_attempts, Duration::from_millis(self.retry_backoff_ms)),
        ));
        if self.offline {
            info!("offline mode: network providers disabled");
            return geocoder;
        }
        if let Some(key) = self.google_api_key.as_deref().filter(|_| self.has_api_key()) {
            geocoder = geocoder.with_primary(Arc::new(GoogleProvider::new(
                key.trim(),
                self.google_url.clone(),
                Duration::from_secs(self.primary_timeout_secs),
                &self.user_agent,
            )));
        } else {
            info!("no Google API key configured; primary tier disabled");
        }
        geocoder.with_secondary(Arc::new(NominatimProvider::new(
            self.nominatim_url.clone(),
            Duration::from_secs(self.secondary_timeout_secs),
            &self.user_agent,
        )))
    }

    /// Registry with seed data and, when configured, the saved snapshot.
    pub fn build_registry(&self, verifier: Arc<HeuristicVerifier>) -> Result<GeographicDataManager, GeoError> {
        let mut registry = GeographicDataManager::new(verifier);
        if self.seed_registry {
            registry = registry.with_seed_data();
        }
        if let Some(path) = &self.registry_path {
            if let Some(snapshot) = store::load_from(path)? {
                let loaded = registry.restore(snapshot);
                info!(loaded, path = %path.display(), "loaded registry snapshot");
            }
        }
        Ok(registry)
    }

    /// Wire the full façade.
    pub fn build_service(&self) -> Result<CoordinateIntegrationService, GeoError> {
        let verifier = Arc::new(HeuristicVerifier::new());
        let registry = self.build_registry(verifier.clone())?;
        Ok(CoordinateIntegrationService::new(
            Arc::new(self.build_geocoder()),
            Arc::new(registry),
            verifier,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.primary_timeout_secs, 5);
        assert_eq!(c.secondary_timeout_secs, 10);
        assert_eq!(c.rate_limit_requests, 60);
        assert!(c.seed_registry);
        assert!(!c.has_api_key());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = EngineConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(c, EngineConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{ "cache_capacity": 50, "offline": true }}"#).unwrap();
        let c = EngineConfig::load_from(f.path()).unwrap();
        assert_eq!(c.cache_capacity, 50);
        assert!(c.offline);
        assert_eq!(c.cache_ttl_hours, 24);
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "cache_capacity = 50").unwrap();
        let err = EngineConfig::load_from(f.path()).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_api_key_override() {
        let mut c = EngineConfig {
            google_api_key: Some("from-file".into()),
            ..EngineConfig::default()
        };
        c.apply_api_key(Some("   ".into()));
        assert_eq!(c.google_api_key.as_deref(), Some("from-file"));
        c.apply_api_key(Some(" from-env ".into()));
        assert_eq!(c.google_api_key.as_deref(), Some("from-env"));
        c.apply_api_key(None);
        assert_eq!(c.google_api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_build_geocoder_tiers() {
        let offline = EngineConfig {
            offline: true,
            google_api_key: Some("k".into()),
            ..EngineConfig::default()
        };
        assert!(!offline.build_geocoder().has_primary());

        let keyless = EngineConfig::default();
        assert!(!keyless.build_geocoder().has_primary());

        let keyed = EngineConfig {
            google_api_key: Some("k".into()),
            ..EngineConfig::default()
        };
        assert!(keyed.build_geocoder().has_primary());
    }

    #[test]
    fn test_build_registry_with_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let seeded = EngineConfig::default()
            .build_registry(Arc::new(HeuristicVerifier::new()))
            .unwrap();
        store::save_to(&path, &seeded.snapshot()).unwrap();

        let config = EngineConfig {
            seed_registry: false,
            registry_path: Some(path),
            ..EngineConfig::default()
        };
        let registry = config.build_registry(Arc::new(HeuristicVerifier::new())).unwrap();
        assert_eq!(registry.len(), 8);
    }
}
