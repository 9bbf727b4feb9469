//! Module registry backends for Coherent.
//!
//! This crate implements the live-platform side of module activation: the
//! `ModuleRegistry` trait consumed by module activation units, a persistent
//! `FileRegistry` backed by `modules.json` under the Coherent root, and an
//! in-memory `MockRegistry` with command refusal injection for tests.

pub mod file;
pub mod mock;
pub mod registry;

pub use file::FileRegistry;
pub use mock::MockRegistry;
pub use registry::{select_registry, ModuleRegistry, ModuleStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry store error: {0}")]
    Store(#[from] coherent_store::StoreError),
    #[error("registry '{0}' is not available")]
    RegistryUnavailable(String),
    #[error("registry file is corrupt: {0}")]
    Corrupt(String),
    #[error("module '{0}' not found")]
    ModuleNotFound(String),
    #[error("module '{0}' is already running")]
    AlreadyRunning(String),
    #[error("module '{0}' is not running")]
    NotRunning(String),
    #[error("module '{module}' rejected {command}: {reason}")]
    CommandRejected {
        module: String,
        command: &'static str,
        reason: String,
    },
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::ModuleNotFound(_))
    }
}
