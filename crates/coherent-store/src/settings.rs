use crate::layout::StoreLayout;
use crate::{properties, Settings, StoreError};
use coherent_schema::validate_store_id;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use tracing::debug;

/// Backend holding key-value settings stores, addressed by store id.
///
/// Implementations must make `write` and `delete` all-or-nothing: when they
/// return an error the store is left exactly as it was.
pub trait SettingsBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Current content, or `None` when the store does not exist.
    fn read(&self, store_id: &str) -> Result<Option<Settings>, StoreError>;

    /// Create or fully replace a store.
    fn write(&self, store_id: &str, settings: &Settings) -> Result<(), StoreError>;

    /// Remove a store. Fails with [`StoreError::NotFound`] when it is absent.
    fn delete(&self, store_id: &str) -> Result<(), StoreError>;

    /// Ids of all existing stores, sorted.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    fn exists(&self, store_id: &str) -> Result<bool, StoreError> {
        Ok(self.read(store_id)?.is_some())
    }
}

fn check_id(store_id: &str) -> Result<(), StoreError> {
    validate_store_id(store_id).map_err(|e| StoreError::InvalidId {
        id: store_id.to_owned(),
        reason: e.to_string(),
    })
}

/// Exclusive advisory lock on one settings store.
///
/// While held, writes and deletes of that store through any
/// [`FileSettingsStore`] fail with [`StoreError::Locked`]. Released on drop.
pub struct SettingsLockGuard {
    lock_file: File,
}

impl SettingsLockGuard {
    pub fn try_acquire(layout: &StoreLayout, store_id: &str) -> Result<Self, StoreError> {
        check_id(store_id)?;
        fs::create_dir_all(layout.settings_dir())?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(layout.settings_lock_path(store_id))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { lock_file: file }),
            Err(_) => Err(StoreError::Locked(store_id.to_owned())),
        }
    }
}

impl Drop for SettingsLockGuard {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

/// Settings stores kept as properties files under `<root>/settings/`.
pub struct FileSettingsStore {
    layout: StoreLayout,
}

impl FileSettingsStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }
}

impl SettingsBackend for FileSettingsStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn read(&self, store_id: &str) -> Result<Option<Settings>, StoreError> {
        check_id(store_id)?;
        let path = self.layout.settings_path(store_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        properties::parse(store_id, &content).map(Some)
    }

    fn write(&self, store_id: &str, settings: &Settings) -> Result<(), StoreError> {
        let _guard = SettingsLockGuard::try_acquire(&self.layout, store_id)?;
        let dir = self.layout.settings_dir();
        let content = properties::render(settings);
        crate::write_atomic(&dir, &self.layout.settings_path(store_id), content.as_bytes())?;
        debug!("wrote settings store {store_id} ({} keys)", settings.len());
        Ok(())
    }

    fn delete(&self, store_id: &str) -> Result<(), StoreError> {
        let _guard = SettingsLockGuard::try_acquire(&self.layout, store_id)?;
        let path = self.layout.settings_path(store_id);
        if !path.exists() {
            return Err(StoreError::NotFound(store_id.to_owned()));
        }
        fs::remove_file(&path)?;
        // The lock file goes with the store; the guard still holds it.
        match fs::remove_file(self.layout.settings_lock_path(store_id)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        crate::fsync_dir(&self.layout.settings_dir())?;
        debug!("deleted settings store {store_id}");
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.layout.settings_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            // Lock files, temp files and anything else that is not a valid id.
            if validate_store_id(name).is_ok() {
                ids.push(name.to_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, FileSettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, FileSettingsStore::new(layout))
    }

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn write_then_read() {
        let (_dir, store) = test_store();
        let content = settings(&[("timeout", "10"), ("retries", "3")]);
        store.write("auth.properties", &content).unwrap();
        assert_eq!(store.read("auth.properties").unwrap(), Some(content));
    }

    #[test]
    fn read_missing_is_none() {
        let (_dir, store) = test_store();
        assert_eq!(store.read("absent.properties").unwrap(), None);
        assert!(!store.exists("absent.properties").unwrap());
    }

    #[test]
    fn write_replaces_whole_content() {
        let (_dir, store) = test_store();
        store
            .write("a.properties", &settings(&[("old", "1")]))
            .unwrap();
        store
            .write("a.properties", &settings(&[("new", "2")]))
            .unwrap();
        assert_eq!(
            store.read("a.properties").unwrap(),
            Some(settings(&[("new", "2")]))
        );
    }

    #[test]
    fn file_format_is_properties() {
        let (dir, store) = test_store();
        store
            .write("auth.properties", &settings(&[("timeout", "30")]))
            .unwrap();
        let raw = fs::read_to_string(dir.path().join("settings").join("auth.properties")).unwrap();
        assert_eq!(raw, "timeout=30\n");
    }

    #[test]
    fn delete_removes_store() {
        let (_dir, store) = test_store();
        store.write("a.properties", &settings(&[("k", "v")])).unwrap();
        store.delete("a.properties").unwrap();
        assert!(!store.exists("a.properties").unwrap());
    }

    #[test]
    fn delete_removes_lock_file() {
        let (_dir, store) = test_store();
        store.write("a.properties", &settings(&[("k", "v")])).unwrap();
        let lock_path = store.layout().settings_lock_path("a.properties");
        assert!(lock_path.exists());

        store.delete("a.properties").unwrap();
        assert!(!lock_path.exists());
        store.write("a.properties", &settings(&[("k", "v")])).unwrap();
        assert!(store.exists("a.properties").unwrap());
    }

    #[test]
    fn delete_missing_is_not_found() {
        let (_dir, store) = test_store();
        let err = store.delete("a.properties").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn invalid_id_rejected() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.read("../escape").unwrap_err(),
            StoreError::InvalidId { .. }
        ));
        assert!(store.write("", &Settings::new()).is_err());
    }

    #[test]
    fn locked_store_rejects_write_and_keeps_content() {
        let (_dir, store) = test_store();
        let original = settings(&[("timeout", "10")]);
        store.write("auth.properties", &original).unwrap();

        let _held = SettingsLockGuard::try_acquire(store.layout(), "auth.properties").unwrap();
        let err = store
            .write("auth.properties", &settings(&[("timeout", "30")]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Locked(_)));
        assert!(matches!(
            store.delete("auth.properties").unwrap_err(),
            StoreError::Locked(_)
        ));
        assert_eq!(store.read("auth.properties").unwrap(), Some(original));
    }

    #[test]
    fn lock_released_on_drop() {
        let (_dir, store) = test_store();
        {
            let _held = SettingsLockGuard::try_acquire(store.layout(), "a.properties").unwrap();
            assert!(SettingsLockGuard::try_acquire(store.layout(), "a.properties").is_err());
        }
        store.write("a.properties", &settings(&[("k", "v")])).unwrap();
    }

    #[test]
    fn list_skips_lock_and_temp_files() {
        let (dir, store) = test_store();
        store.write("b.properties", &settings(&[("k", "v")])).unwrap();
        store.write("a.cfg", &settings(&[("k", "v")])).unwrap();
        fs::write(dir.path().join("settings").join(".tmpXYZ"), "junk").unwrap();
        assert_eq!(
            store.list().unwrap(),
            vec!["a.cfg".to_owned(), "b.properties".to_owned()]
        );
    }

    #[test]
    fn malformed_file_surfaces_error() {
        let (dir, store) = test_store();
        fs::write(
            dir.path().join("settings").join("bad.properties"),
            "no separator here\n",
        )
        .unwrap();
        assert!(matches!(
            store.read("bad.properties").unwrap_err(),
            StoreError::Malformed { .. }
        ));
    }
}
