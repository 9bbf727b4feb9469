//! Transactional orchestration engine for Coherent.
//!
//! This crate ties the settings store and module registry backends together
//! into all-or-nothing transactions: the `ChangeUnit` contract (apply,
//! compensate, inspect), the module activation and settings store units, the
//! `TransactionController` that applies units in order and compensates the
//! applied prefix in reverse on the first failure, and the `OutcomeReport`
//! handed back to callers. It also provides plan-to-unit construction, the
//! transaction phase state machine, and a cross-process transaction lock.

pub mod builder;
pub mod concurrency;
pub mod controller;
pub mod lifecycle;
pub mod module_unit;
pub mod outcome;
pub mod settings_unit;
pub mod unit;

pub use builder::build_units;
pub use concurrency::{install_signal_handler, shutdown_requested, TransactionLock};
pub use controller::{NoopObserver, TransactionController, TransactionObserver};
pub use lifecycle::{validate_transition, TxnPhase};
pub use module_unit::ModuleActivationUnit;
pub use outcome::{CompensationError, OutcomeReport, OutcomeStatus, UnitResult};
pub use settings_unit::{SettingsPolicy, SettingsStoreUnit};
pub use unit::{ChangeUnit, UnitPhase, UnitState};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("plan error: {0}")]
    Plan(#[from] coherent_schema::PlanError),
    #[error("store error: {0}")]
    Store(#[from] coherent_store::StoreError),
    #[error("runtime error: {0}")]
    Runtime(#[from] coherent_runtime::RuntimeError),
    #[error("module not found: {0}")]
    ModuleNotFound(String),
    #[error("settings store already exists: {0}")]
    SettingsAlreadyExist(String),
    #[error("settings store not found: {0}")]
    SettingsNotFound(String),
    #[error("change #{index} ({target}): {source}")]
    Construction {
        index: usize,
        target: String,
        source: Box<CoreError>,
    },
    #[error("{unit} panicked during {operation}: {message}")]
    UnitPanicked {
        unit: String,
        operation: &'static str,
        message: String,
    },
    #[error("invalid transaction transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Whether this error was raised while checking a unit's preconditions,
    /// before anything was mutated.
    pub fn is_precondition(&self) -> bool {
        match self {
            CoreError::ModuleNotFound(_)
            | CoreError::SettingsAlreadyExist(_)
            | CoreError::SettingsNotFound(_) => true,
            CoreError::Construction { source, .. } => source.is_precondition(),
            _ => false,
        }
    }
}
