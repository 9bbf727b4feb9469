use crate::types::{InvalidId, Settings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse plan: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported plan_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("plan contains no changes")]
    EmptyPlan,
    #[error("change #{index}: invalid module id '{module}': {source}")]
    InvalidModuleId {
        index: usize,
        module: String,
        source: InvalidId,
    },
    #[error("change #{index}: invalid store id '{store}': {source}")]
    InvalidStoreId {
        index: usize,
        store: String,
        source: InvalidId,
    },
    #[error("change #{index}: 'merge' is only valid with policy \"update\" (store '{store}')")]
    MergeRequiresUpdate { index: usize, store: String },
    #[error("change #{index}: policy \"delete\" takes no values (store '{store}')")]
    ValuesOnDelete { index: usize, store: String },
    #[error("change #{index}: key '{key}' appears more than once in store '{store}'")]
    DuplicateValueKey {
        index: usize,
        store: String,
        key: String,
    },
    #[error("change #{index}: {target} is already targeted by change #{first}")]
    DuplicateTarget {
        index: usize,
        first: usize,
        target: String,
    },
}

/// A change plan as written by an operator.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PlanV1 {
    pub plan_version: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "change")]
    pub changes: Vec<ChangeSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeSpec {
    Module(ModuleChange),
    Settings(SettingsChange),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ModuleChange {
    pub module: String,
    pub running: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SettingsChange {
    pub store: String,
    pub policy: SettingsPolicyName,
    /// Keep keys the update does not mention. Defaults to `true`.
    #[serde(default)]
    pub merge: Option<bool>,
    #[serde(default)]
    pub values: Settings,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SettingsPolicyName {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for SettingsPolicyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsPolicyName::Create => write!(f, "create"),
            SettingsPolicyName::Update => write!(f, "update"),
            SettingsPolicyName::Delete => write!(f, "delete"),
        }
    }
}

pub fn parse_plan_str(input: &str) -> Result<PlanV1, PlanError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_plan_file(path: impl AsRef<Path>) -> Result<PlanV1, PlanError> {
    let content = fs::read_to_string(path)?;
    parse_plan_str(&content)
}
