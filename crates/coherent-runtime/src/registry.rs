use crate::RuntimeError;
use coherent_store::StoreLayout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleStatus {
    pub module_id: String,
    pub running: bool,
}

/// Live registry of deployable modules that can be started and stopped.
///
/// Commands either take full effect or fail without changing the module's
/// activation state.
pub trait ModuleRegistry: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with [`RuntimeError::ModuleNotFound`] for unknown modules.
    fn is_running(&self, module_id: &str) -> Result<bool, RuntimeError>;

    fn start(&self, module_id: &str) -> Result<(), RuntimeError>;

    fn stop(&self, module_id: &str) -> Result<(), RuntimeError>;

    /// All known modules, sorted by id.
    fn list(&self) -> Result<Vec<ModuleStatus>, RuntimeError>;
}

pub fn select_registry(name: &str, root: &Path) -> Result<Arc<dyn ModuleRegistry>, RuntimeError> {
    match name {
        "file" => Ok(Arc::new(crate::file::FileRegistry::new(
            StoreLayout::new(root).registry_file(),
        ))),
        "mock" => Ok(Arc::new(crate::mock::MockRegistry::new())),
        other => Err(RuntimeError::RegistryUnavailable(other.to_owned())),
    }
}
