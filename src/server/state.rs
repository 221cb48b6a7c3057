use crate::error::GeoError;
use crate::integration::CoordinateIntegrationService;
use crate::registry::store;
use std::path::PathBuf;

pub struct AppState {
    pub service: CoordinateIntegrationService,
    /// Where to write the registry after maintenance, if anywhere.
    pub registry_path: Option<PathBuf>,
}

impl AppState {
    pub fn persist_registry(&self) -> Result<(), GeoError> {
        if let Some(path) = &self.registry_path {
            store::save_to(path, &self.service.registry().snapshot())?;
        }
        Ok(())
    }
}
