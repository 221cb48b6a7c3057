//! Verified-destination registry.
//!
//! Trusted coordinates for well-known places, arbitration between
//! disagreeing sources, and periodic re-verification.

pub mod conflict;
pub mod landmarks;
pub mod manager;
pub mod sources;
pub mod store;
pub mod types;

pub use conflict::{arbitrate, Arbitration};
pub use manager::GeographicDataManager;
pub use sources::{DataSource, SourceCatalog, SourceType};
pub use store::RegistrySnapshot;
pub use types::{
    ConflictResolution, CoordinateOption, DestinationKind, DestinationLookup, DestinationMetadata, NewDestination,
    RegistryStats, ResolutionStrategy, UpdateFrequency, UpdateReport, VerifiedDestination,
};
