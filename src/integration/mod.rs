//! Caller-facing façade over the geocoder, the registry and the verifier.

pub mod service;

pub use service::{
    Activity, CoordinateInfo, CoordinateIntegrationService, CoordinateStats, DestinationValidation, MaintenanceReport,
};
