//! Key/value persistence seam between the credential core and the host.
//!
//! Two implementations share one set of map semantics ([`StoreMap`]):
//! [`EncryptedFileStore`] for production and [`MemoryStore`] for tests.

mod encrypted;
mod memory;

pub use encrypted::{EncryptedFileStore, StoreKey};
pub use memory::MemoryStore;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Bool(bool),
    String(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read credential store at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write credential store at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credential store at {path} is corrupt or sealed with a different key")]
    Corrupt { path: PathBuf },
    #[error("failed to encode credential store: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("stored value for `{key}` has the wrong type")]
    TypeMismatch { key: String },
    #[error("stored value for `{key}` is malformed")]
    Malformed { key: String },
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Durable key/value storage for credential material.
///
/// Implementations must give read-after-write consistency within a process and
/// must never partially apply a [`put_batch`](Self::put_batch) that they
/// report as failed.
pub trait CredentialStore: Send + Sync {
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn put_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.put_batch(&[(key, StoredValue::String(value.to_string()))])
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError>;

    fn put_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.put_batch(&[(key, StoredValue::Bool(value))])
    }

    /// Write several entries as one unit: all of them land or none do.
    fn put_batch(&self, entries: &[(&str, StoredValue)]) -> Result<(), StoreError>;

    /// Remove every key in this store.
    fn clear(&self) -> Result<(), StoreError>;

    /// Snapshot of all entries. Diagnostics and tests only.
    fn entries(&self) -> Result<BTreeMap<String, StoredValue>, StoreError>;

    /// File that holds this store on disk, if any. The wipe never touches it.
    fn backing_path(&self) -> Option<&Path> {
        None
    }
}

/// Map semantics shared by both store implementations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct StoreMap(BTreeMap<String, StoredValue>);

impl StoreMap {
    pub(crate) fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(StoredValue::String(value)) => Ok(Some(value.clone())),
            Some(StoredValue::Bool(_)) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
            }),
        }
    }

    pub(crate) fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        match self.0.get(key) {
            None => Ok(default),
            Some(StoredValue::Bool(value)) => Ok(*value),
            Some(StoredValue::String(_)) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
            }),
        }
    }

    pub(crate) fn put_batch(&mut self, entries: &[(&str, StoredValue)]) {
        for (key, value) in entries {
            self.0.insert((*key).to_string(), value.clone());
        }
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }

    pub(crate) fn snapshot(&self) -> BTreeMap<String, StoredValue> {
        self.0.clone()
    }
}
