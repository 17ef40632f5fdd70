use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{CredentialStore, StoreError, StoreMap, StoredValue};

/// In-memory store for deterministic tests. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<StoreMap>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, StoreMap> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.map().get_string(key)
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        self.map().get_bool(key, default)
    }

    fn put_batch(&self, entries: &[(&str, StoredValue)]) -> Result<(), StoreError> {
        self.map().put_batch(entries);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.map().clear();
        Ok(())
    }

    fn entries(&self) -> Result<BTreeMap<String, StoredValue>, StoreError> {
        Ok(self.map().snapshot())
    }
}
