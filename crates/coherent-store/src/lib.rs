//! Settings store backends and on-disk layout for Coherent.
//!
//! This crate provides the storage layer: the `SettingsBackend` trait consumed
//! by settings change units, a file-backed `FileSettingsStore` holding one
//! properties file per store with atomic replacement and per-store advisory
//! locks, an in-memory `MemorySettingsStore` for tests, the `properties` codec,
//! and `StoreLayout` for the directory structure under the Coherent root.

pub mod layout;
pub mod memory;
pub mod properties;
pub mod settings;

pub use coherent_schema::Settings;
pub use layout::{StoreLayout, STORE_FORMAT_VERSION};
pub use memory::MemorySettingsStore;
pub use settings::{FileSettingsStore, SettingsBackend, SettingsLockGuard};

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Fsync a directory so that a preceding `rename()` is durable.
///
/// POSIX does not guarantee rename durability without syncing the parent
/// directory, even though ext4 in `data=ordered` mode usually provides it.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

/// Replace `dest` with `content` atomically.
///
/// The bytes go to a temporary file in `dir` (which must be on the same
/// filesystem as `dest`), are synced, and the file is renamed over `dest`.
/// Readers observe either the old or the new content, never a mix, and a
/// failure before the rename leaves `dest` untouched.
pub fn write_atomic(dir: &Path, dest: &Path, content: &[u8]) -> Result<(), StoreError> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings store '{0}' is locked by another process")]
    Locked(String),
    #[error("settings store not found: {0}")]
    NotFound(String),
    #[error("invalid settings store id '{id}': {reason}")]
    InvalidId { id: String, reason: String },
    #[error("malformed settings store '{id}' at line {line}: {reason}")]
    Malformed {
        id: String,
        line: usize,
        reason: String,
    },
    #[error("store format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("settings backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
