use crate::plan::{ChangeSpec, PlanError, PlanV1, SettingsPolicyName};
use crate::types::{validate_module_id, validate_store_id, Settings};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Validated change plan, in the order the changes must be applied.
///
/// Ids are trimmed, `merge` is resolved to its default, and every change is
/// known to target a distinct resource. This is the input to unit
/// construction and to the plan digest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedPlan {
    pub plan_version: u32,
    pub description: Option<String>,
    pub changes: Vec<NormalizedChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedChange {
    Module {
        module: String,
        running: bool,
    },
    Settings {
        store: String,
        policy: SettingsPolicyName,
        merge: bool,
        values: Settings,
    },
}

impl NormalizedChange {
    /// Human-readable name of the resource this change owns.
    pub fn target(&self) -> String {
        match self {
            NormalizedChange::Module { module, .. } => format!("module '{module}'"),
            NormalizedChange::Settings { store, .. } => format!("settings store '{store}'"),
        }
    }
}

impl PlanV1 {
    pub fn normalize(&self) -> Result<NormalizedPlan, PlanError> {
        if self.plan_version != 1 {
            return Err(PlanError::UnsupportedVersion(self.plan_version));
        }
        if self.changes.is_empty() {
            return Err(PlanError::EmptyPlan);
        }

        let mut changes = Vec::with_capacity(self.changes.len());
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (index, spec) in self.changes.iter().enumerate() {
            let change = normalize_change(index, spec)?;
            let target = change.target();
            if let Some(&first) = seen.get(&target) {
                return Err(PlanError::DuplicateTarget {
                    index,
                    first,
                    target,
                });
            }
            seen.insert(target, index);
            changes.push(change);
        }

        Ok(NormalizedPlan {
            plan_version: self.plan_version,
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_owned),
            changes,
        })
    }
}

impl NormalizedPlan {
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn normalize_change(index: usize, spec: &ChangeSpec) -> Result<NormalizedChange, PlanError> {
    match spec {
        ChangeSpec::Module(m) => {
            let module = m.module.trim().to_owned();
            validate_module_id(&module).map_err(|source| PlanError::InvalidModuleId {
                index,
                module: module.clone(),
                source,
            })?;
            Ok(NormalizedChange::Module {
                module,
                running: m.running,
            })
        }
        ChangeSpec::Settings(s) => {
            let store = s.store.trim().to_owned();
            validate_store_id(&store).map_err(|source| PlanError::InvalidStoreId {
                index,
                store: store.clone(),
                source,
            })?;
            if s.merge.is_some() && s.policy != SettingsPolicyName::Update {
                return Err(PlanError::MergeRequiresUpdate { index, store });
            }
            if s.policy == SettingsPolicyName::Delete && !s.values.is_empty() {
                return Err(PlanError::ValuesOnDelete { index, store });
            }
            let mut values = Settings::new();
            for (key, value) in &s.values {
                let key = key.trim();
                if values.insert(key.to_owned(), value.clone()).is_some() {
                    return Err(PlanError::DuplicateValueKey {
                        index,
                        store,
                        key: key.to_owned(),
                    });
                }
            }
            Ok(NormalizedChange::Settings {
                store,
                policy: s.policy,
                merge: s.merge.unwrap_or(true),
                values,
            })
        }
    }
}
