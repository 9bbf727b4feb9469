use crate::registry::{ModuleRegistry, ModuleStatus};
use crate::RuntimeError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MockState {
    modules: BTreeMap<String, bool>,
    refuse_start: BTreeSet<String>,
    refuse_stop: BTreeSet<String>,
    commands: Vec<String>,
}

/// In-memory module registry.
///
/// Starting a running module or stopping a stopped one succeeds silently, so
/// tests observe exactly the commands a unit chose to issue through
/// [`commands`](Self::commands).
#[derive(Default)]
pub struct MockRegistry {
    state: Mutex<MockState>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_module(self, module_id: &str, running: bool) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.modules.insert(module_id.to_owned(), running);
        }
        self
    }

    pub fn refuse_start(&self, module_id: &str) -> Result<(), RuntimeError> {
        self.lock()?.refuse_start.insert(module_id.to_owned());
        Ok(())
    }

    pub fn refuse_stop(&self, module_id: &str) -> Result<(), RuntimeError> {
        self.lock()?.refuse_stop.insert(module_id.to_owned());
        Ok(())
    }

    /// Change a module's state behind the back of any unit, as an operator
    /// or another process would.
    pub fn set_running(&self, module_id: &str, running: bool) -> Result<(), RuntimeError> {
        self.lock()?.modules.insert(module_id.to_owned(), running);
        Ok(())
    }

    /// Accepted commands in order, formatted as `"start <id>"` / `"stop <id>"`.
    pub fn commands(&self) -> Vec<String> {
        self.lock().map(|s| s.commands.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        self.state
            .lock()
            .map_err(|e| RuntimeError::RegistryUnavailable(format!("mutex poisoned: {e}")))
    }

    fn command(&self, module_id: &str, running: bool) -> Result<(), RuntimeError> {
        let command = if running { "start" } else { "stop" };
        let mut state = self.lock()?;
        if !state.modules.contains_key(module_id) {
            return Err(RuntimeError::ModuleNotFound(module_id.to_owned()));
        }
        let refused = if running {
            &state.refuse_start
        } else {
            &state.refuse_stop
        };
        if refused.contains(module_id) {
            return Err(RuntimeError::CommandRejected {
                module: module_id.to_owned(),
                command,
                reason: "refused by mock".to_owned(),
            });
        }
        state.modules.insert(module_id.to_owned(), running);
        state.commands.push(format!("{command} {module_id}"));
        Ok(())
    }
}

impl ModuleRegistry for MockRegistry {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_running(&self, module_id: &str) -> Result<bool, RuntimeError> {
        self.lock()?
            .modules
            .get(module_id)
            .copied()
            .ok_or_else(|| RuntimeError::ModuleNotFound(module_id.to_owned()))
    }

    fn start(&self, module_id: &str) -> Result<(), RuntimeError> {
        self.command(module_id, true)
    }

    fn stop(&self, module_id: &str) -> Result<(), RuntimeError> {
        self.command(module_id, false)
    }

    fn list(&self) -> Result<Vec<ModuleStatus>, RuntimeError> {
        Ok(self
            .lock()?
            .modules
            .iter()
            .map(|(id, &running)| ModuleStatus {
                module_id: id.clone(),
                running,
            })
            .collect())
    }
}
