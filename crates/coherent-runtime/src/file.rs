use crate::registry::{ModuleRegistry, ModuleStatus};
use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct RegistryFile {
    #[serde(default)]
    modules: BTreeMap<String, ModuleEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct ModuleEntry {
    running: bool,
    /// Pinned modules refuse start and stop commands.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pinned: bool,
    /// Sticky modules can be started but refuse to stop.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    sticky: bool,
}

/// Module registry persisted as JSON:
///
/// ```json
/// { "modules": { "ldap-connector": { "running": false } } }
/// ```
///
/// Every command rewrites the file atomically, so a failed command leaves the
/// previous activation state on disk. A missing file is an empty registry.
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add or replace a module entry.
    pub fn register(&self, module_id: &str, running: bool) -> Result<(), RuntimeError> {
        let mut file = self.load()?;
        file.modules.insert(
            module_id.to_owned(),
            ModuleEntry {
                running,
                ..ModuleEntry::default()
            },
        );
        self.save(&file)
    }

    /// Pin or unpin a module. Pinned modules reject activation commands.
    pub fn set_pinned(&self, module_id: &str, pinned: bool) -> Result<(), RuntimeError> {
        let mut file = self.load()?;
        let entry = file
            .modules
            .get_mut(module_id)
            .ok_or_else(|| RuntimeError::ModuleNotFound(module_id.to_owned()))?;
        entry.pinned = pinned;
        self.save(&file)
    }

    /// Mark a module as sticky. Sticky modules reject stop commands.
    pub fn set_sticky(&self, module_id: &str, sticky: bool) -> Result<(), RuntimeError> {
        let mut file = self.load()?;
        let entry = file
            .modules
            .get_mut(module_id)
            .ok_or_else(|| RuntimeError::ModuleNotFound(module_id.to_owned()))?;
        entry.sticky = sticky;
        self.save(&file)
    }

    fn load(&self) -> Result<RegistryFile, RuntimeError> {
        if !self.path.exists() {
            return Ok(RegistryFile::default());
        }
        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .map_err(|e| RuntimeError::Corrupt(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, file: &RegistryFile) -> Result<(), RuntimeError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let content = serde_json::to_string_pretty(file)
            .map_err(|e| RuntimeError::Corrupt(format!("cannot serialize registry: {e}")))?;
        coherent_store::write_atomic(&dir, &self.path, content.as_bytes())?;
        Ok(())
    }

    fn set_running(
        &self,
        module_id: &str,
        running: bool,
        command: &'static str,
    ) -> Result<(), RuntimeError> {
        let mut file = self.load()?;
        let entry = file
            .modules
            .get_mut(module_id)
            .ok_or_else(|| RuntimeError::ModuleNotFound(module_id.to_owned()))?;

        if entry.pinned {
            return Err(RuntimeError::CommandRejected {
                module: module_id.to_owned(),
                command,
                reason: "module is pinned".to_owned(),
            });
        }
        if entry.sticky && !running {
            return Err(RuntimeError::CommandRejected {
                module: module_id.to_owned(),
                command,
                reason: "module is sticky".to_owned(),
            });
        }
        match (entry.running, running) {
            (true, true) => return Err(RuntimeError::AlreadyRunning(module_id.to_owned())),
            (false, false) => return Err(RuntimeError::NotRunning(module_id.to_owned())),
            _ => {}
        }

        entry.running = running;
        self.save(&file)?;
        debug!("{command} {module_id} in {}", self.path.display());
        Ok(())
    }
}

impl ModuleRegistry for FileRegistry {
    fn name(&self) -> &'static str {
        "file"
    }

    fn is_running(&self, module_id: &str) -> Result<bool, RuntimeError> {
        self.load()?
            .modules
            .get(module_id)
            .map(|e| e.running)
            .ok_or_else(|| RuntimeError::ModuleNotFound(module_id.to_owned()))
    }

    fn start(&self, module_id: &str) -> Result<(), RuntimeError> {
        self.set_running(module_id, true, "start")
    }

    fn stop(&self, module_id: &str) -> Result<(), RuntimeError> {
        self.set_running(module_id, false, "stop")
    }

    fn list(&self) -> Result<Vec<ModuleStatus>, RuntimeError> {
        Ok(self
            .load()?
            .modules
            .into_iter()
            .map(|(module_id, entry)| ModuleStatus {
                module_id,
                running: entry.running,
            })
            .collect())
    }
}
