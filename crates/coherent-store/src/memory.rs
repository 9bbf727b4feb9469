use crate::settings::SettingsBackend;
use crate::{Settings, StoreError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    stores: BTreeMap<String, Settings>,
    locked: BTreeSet<String>,
}

/// In-memory settings backend.
///
/// Locking a store id makes every write and delete of it fail with
/// [`StoreError::Locked`], which is how tests inject backend failures.
#[derive(Default)]
pub struct MemorySettingsStore {
    inner: Mutex<Inner>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store. Intended for test setup, so it ignores locks.
    #[must_use]
    pub fn with_store(self, store_id: &str, settings: Settings) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.stores.insert(store_id.to_owned(), settings);
        }
        self
    }

    pub fn lock(&self, store_id: &str) -> Result<(), StoreError> {
        self.state()?.locked.insert(store_id.to_owned());
        Ok(())
    }

    pub fn unlock(&self, store_id: &str) -> Result<(), StoreError> {
        self.state()?.locked.remove(store_id);
        Ok(())
    }

    fn state(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {e}")))
    }
}

impl SettingsBackend for MemorySettingsStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn read(&self, store_id: &str) -> Result<Option<Settings>, StoreError> {
        Ok(self.state()?.stores.get(store_id).cloned())
    }

    fn write(&self, store_id: &str, settings: &Settings) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.locked.contains(store_id) {
            return Err(StoreError::Locked(store_id.to_owned()));
        }
        state.stores.insert(store_id.to_owned(), settings.clone());
        Ok(())
    }

    fn delete(&self, store_id: &str) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.locked.contains(store_id) {
            return Err(StoreError::Locked(store_id.to_owned()));
        }
        state
            .stores
            .remove(store_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(store_id.to_owned()))
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.state()?.stores.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(k: &str, v: &str) -> Settings {
        let mut s = Settings::new();
        s.insert(k.to_owned(), v.to_owned());
        s
    }

    #[test]
    fn memory_store_lifecycle() {
        let store = MemorySettingsStore::new();
        assert_eq!(store.read("a").unwrap(), None);

        store.write("a", &one("k", "v")).unwrap();
        assert_eq!(store.read("a").unwrap(), Some(one("k", "v")));
        assert_eq!(store.list().unwrap(), vec!["a".to_owned()]);

        store.delete("a").unwrap();
        assert!(store.delete("a").unwrap_err().is_not_found());
    }

    #[test]
    fn locked_store_refuses_mutation() {
        let store = MemorySettingsStore::new().with_store("a", one("k", "v"));
        store.lock("a").unwrap();
        assert!(matches!(
            store.write("a", &Settings::new()).unwrap_err(),
            StoreError::Locked(_)
        ));
        assert!(matches!(
            store.delete("a").unwrap_err(),
            StoreError::Locked(_)
        ));
        assert_eq!(store.read("a").unwrap(), Some(one("k", "v")));

        store.unlock("a").unwrap();
        store.delete("a").unwrap();
    }
}
