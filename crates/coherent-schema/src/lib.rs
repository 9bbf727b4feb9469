//! Change plan parsing, normalization, identifiers and digests for Coherent.
//!
//! This crate defines the schema layer: TOML change plan parsing (`PlanV1`),
//! the validated representation handed to the transaction engine
//! (`NormalizedPlan`), identifier rules for modules and settings stores, and
//! the deterministic plan digest used to label transactions.

pub mod identity;
pub mod normalize;
pub mod plan;
pub mod types;

pub use identity::{plan_digest, short_digest};
pub use normalize::{NormalizedChange, NormalizedPlan};
pub use plan::{
    parse_plan_file, parse_plan_str, ChangeSpec, ModuleChange, PlanError, PlanV1, SettingsChange,
    SettingsPolicyName,
};
pub use types::{validate_module_id, validate_store_id, InvalidId, Settings};
