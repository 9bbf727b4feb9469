use crate::unit::{ChangeUnit, UnitPhase, UnitState};
use crate::CoreError;
use coherent_runtime::ModuleRegistry;
use std::sync::Arc;
use tracing::{debug, info};

/// Drives one module to a desired activation state.
///
/// The module's activation state at construction time is the state that
/// compensation restores. Both `apply` and `compensate` compare against the
/// live state first and issue no command when it already matches.
pub struct ModuleActivationUnit {
    registry: Arc<dyn ModuleRegistry>,
    module_id: String,
    desired_running: bool,
    original_running: bool,
    phase: UnitPhase,
}

impl ModuleActivationUnit {
    /// Fails with [`CoreError::ModuleNotFound`] when the registry does not
    /// know the module.
    pub fn new(
        registry: Arc<dyn ModuleRegistry>,
        module_id: &str,
        desired_running: bool,
    ) -> Result<Self, CoreError> {
        let original_running = match registry.is_running(module_id) {
            Ok(running) => running,
            Err(e) if e.is_not_found() => {
                return Err(CoreError::ModuleNotFound(module_id.to_owned()))
            }
            Err(e) => return Err(e.into()),
        };
        debug!(
            "captured module '{module_id}' running={original_running} via {} registry",
            registry.name()
        );
        Ok(Self {
            registry,
            module_id: module_id.to_owned(),
            desired_running,
            original_running,
            phase: UnitPhase::Pending,
        })
    }

    pub fn start(registry: Arc<dyn ModuleRegistry>, module_id: &str) -> Result<Self, CoreError> {
        Self::new(registry, module_id, true)
    }

    pub fn stop(registry: Arc<dyn ModuleRegistry>, module_id: &str) -> Result<Self, CoreError> {
        Self::new(registry, module_id, false)
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn desired_running(&self) -> bool {
        self.desired_running
    }

    pub fn original_running(&self) -> bool {
        self.original_running
    }

    fn drive(&self, running: bool) -> Result<(), CoreError> {
        if running {
            self.registry.start(&self.module_id)?;
        } else {
            self.registry.stop(&self.module_id)?;
        }
        Ok(())
    }
}

fn verb(running: bool) -> &'static str {
    if running {
        "start"
    } else {
        "stop"
    }
}

impl ChangeUnit for ModuleActivationUnit {
    fn kind(&self) -> &'static str {
        "module"
    }

    fn target(&self) -> &str {
        &self.module_id
    }

    fn phase(&self) -> UnitPhase {
        self.phase
    }

    fn apply(&mut self) -> Result<(), CoreError> {
        let live = self.registry.is_running(&self.module_id)?;
        if live == self.desired_running {
            debug!(
                "module '{}' already running={live}, nothing to apply",
                self.module_id
            );
            self.phase = UnitPhase::Applied;
            return Ok(());
        }

        match self.drive(self.desired_running) {
            Ok(()) => {
                info!("{} module '{}'", verb(self.desired_running), self.module_id);
                self.phase = UnitPhase::Applied;
                Ok(())
            }
            Err(e) => {
                self.phase = UnitPhase::Failed;
                Err(e)
            }
        }
    }

    fn compensate(&mut self) -> Result<(), CoreError> {
        let live = self.registry.is_running(&self.module_id)?;
        if live == self.original_running {
            debug!(
                "module '{}' already at original running={live}",
                self.module_id
            );
            self.phase = UnitPhase::Compensated;
            return Ok(());
        }

        self.drive(self.original_running)?;
        info!(
            "compensated module '{}': {}",
            self.module_id,
            verb(self.original_running)
        );
        self.phase = UnitPhase::Compensated;
        Ok(())
    }

    fn inspect(&self) -> Result<UnitState, CoreError> {
        Ok(UnitState::Module {
            running: self.registry.is_running(&self.module_id)?,
        })
    }
}
