use crate::unit::{ChangeUnit, UnitPhase, UnitState};
use crate::CoreError;
use coherent_store::{Settings, SettingsBackend};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SettingsPolicy {
    /// The store must not exist yet.
    Create,
    /// The store must exist. With `merge`, incoming keys overwrite existing
    /// ones and the remaining keys are kept; without it the content is
    /// replaced.
    Update { merge: bool },
    /// The store must exist.
    Delete,
}

impl std::fmt::Display for SettingsPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsPolicy::Create => f.write_str("create"),
            SettingsPolicy::Update { merge: true } => f.write_str("update (merge)"),
            SettingsPolicy::Update { merge: false } => f.write_str("update (replace)"),
            SettingsPolicy::Delete => f.write_str("delete"),
        }
    }
}

/// Creates, updates, or deletes one settings store.
///
/// For update and delete the store's full content is snapshotted at
/// construction, and compensation writes that snapshot back verbatim.
/// Compensating a create removes the store.
pub struct SettingsStoreUnit {
    backend: Arc<dyn SettingsBackend>,
    store_id: String,
    policy: SettingsPolicy,
    incoming: Settings,
    original: Option<Settings>,
    phase: UnitPhase,
}

impl SettingsStoreUnit {
    pub fn new(
        backend: Arc<dyn SettingsBackend>,
        store_id: &str,
        policy: SettingsPolicy,
        incoming: Settings,
    ) -> Result<Self, CoreError> {
        let original = backend.read(store_id)?;
        match (policy, original.is_some()) {
            (SettingsPolicy::Create, true) => {
                return Err(CoreError::SettingsAlreadyExist(store_id.to_owned()))
            }
            (SettingsPolicy::Update { .. } | SettingsPolicy::Delete, false) => {
                return Err(CoreError::SettingsNotFound(store_id.to_owned()))
            }
            _ => {}
        }
        debug!(
            "settings store '{store_id}': {policy}, {} existing keys via {} backend",
            original.as_ref().map_or(0, Settings::len),
            backend.name()
        );
        Ok(Self {
            backend,
            store_id: store_id.to_owned(),
            policy,
            incoming,
            original,
            phase: UnitPhase::Pending,
        })
    }

    pub fn create(
        backend: Arc<dyn SettingsBackend>,
        store_id: &str,
        values: Settings,
    ) -> Result<Self, CoreError> {
        Self::new(backend, store_id, SettingsPolicy::Create, values)
    }

    pub fn update(
        backend: Arc<dyn SettingsBackend>,
        store_id: &str,
        values: Settings,
        merge: bool,
    ) -> Result<Self, CoreError> {
        Self::new(backend, store_id, SettingsPolicy::Update { merge }, values)
    }

    pub fn delete(backend: Arc<dyn SettingsBackend>, store_id: &str) -> Result<Self, CoreError> {
        Self::new(backend, store_id, SettingsPolicy::Delete, Settings::new())
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn policy(&self) -> SettingsPolicy {
        self.policy
    }

    /// Content captured at construction. `None` for a create.
    pub fn original(&self) -> Option<&Settings> {
        self.original.as_ref()
    }

    /// The store content a successful apply leaves behind.
    pub fn desired(&self) -> Option<Settings> {
        match self.policy {
            SettingsPolicy::Create | SettingsPolicy::Update { merge: false } => {
                Some(self.incoming.clone())
            }
            SettingsPolicy::Update { merge: true } => {
                let mut merged = self.original.clone().unwrap_or_default();
                merged.extend(
                    self.incoming
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
                Some(merged)
            }
            SettingsPolicy::Delete => None,
        }
    }

    fn mutate(&self, desired: Option<&Settings>) -> Result<(), CoreError> {
        match desired {
            Some(content) => self.backend.write(&self.store_id, content)?,
            None => match self.backend.delete(&self.store_id) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}

impl ChangeUnit for SettingsStoreUnit {
    fn kind(&self) -> &'static str {
        "settings"
    }

    fn target(&self) -> &str {
        &self.store_id
    }

    fn phase(&self) -> UnitPhase {
        self.phase
    }

    fn apply(&mut self) -> Result<(), CoreError> {
        let live = self.backend.read(&self.store_id)?;
        // A store that appeared after construction is not ours to own, even
        // when its content happens to match.
        if self.policy == SettingsPolicy::Create && live.is_some() {
            return Err(CoreError::SettingsAlreadyExist(self.store_id.clone()));
        }
        let desired = self.desired();
        if live == desired {
            debug!(
                "settings store '{}' already at desired content",
                self.store_id
            );
            self.phase = UnitPhase::Applied;
            return Ok(());
        }

        match self.mutate(desired.as_ref()) {
            Ok(()) => {
                info!("{} settings store '{}'", self.policy, self.store_id);
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
        if !self.phase.touched() {
            debug!("settings store '{}' untouched, nothing to compensate", self.store_id);
            return Ok(());
        }

        let live = self.backend.read(&self.store_id)?;
        if live == self.original {
            self.phase = UnitPhase::Compensated;
            return Ok(());
        }

        self.mutate(self.original.as_ref())?;
        info!(
            "compensated settings store '{}' ({})",
            self.store_id, self.policy
        );
        self.phase = UnitPhase::Compensated;
        Ok(())
    }

    fn inspect(&self) -> Result<UnitState, CoreError> {
        Ok(UnitState::Settings {
            content: self.backend.read(&self.store_id)?,
        })
    }
}
