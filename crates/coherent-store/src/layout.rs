use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current layout format version. Incremented on incompatible layout changes.
pub const STORE_FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "version";

/// Directory layout under the Coherent root.
///
/// ```text
/// <root>/version          layout format marker
/// <root>/coherent.lock    transaction lock
/// <root>/modules.json     file module registry
/// <root>/settings/<id>    one properties file per settings store
/// <root>/settings/<id>.lock  per-store write lock, removed with the store
/// ```
///
/// Subdirectories are created lazily on [`initialize`](Self::initialize).
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreVersion {
    format_version: u32,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn settings_dir(&self) -> PathBuf {
        self.root.join("settings")
    }

    #[inline]
    pub fn settings_path(&self, store_id: &str) -> PathBuf {
        self.settings_dir().join(store_id)
    }

    /// Advisory lock guarding writes to a single settings store.
    #[inline]
    pub fn settings_lock_path(&self, store_id: &str) -> PathBuf {
        self.settings_dir().join(format!("{store_id}.lock"))
    }

    #[inline]
    pub fn registry_file(&self) -> PathBuf {
        self.root.join("modules.json")
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join("coherent.lock")
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.settings_dir())?;

        let version_path = self.root.join(VERSION_FILE);
        if version_path.exists() {
            self.verify_version()?;
        } else {
            let ver = StoreVersion {
                format_version: STORE_FORMAT_VERSION,
            };
            let content = serde_json::to_string_pretty(&ver)?;
            crate::write_atomic(&self.root, &version_path, content.as_bytes())?;
        }

        Ok(())
    }

    pub fn verify_version(&self) -> Result<(), StoreError> {
        let content = fs::read_to_string(self.root.join(VERSION_FILE))?;
        let ver: StoreVersion = serde_json::from_str(&content)?;

        if ver.format_version != STORE_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: STORE_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        Ok(())
    }
}
