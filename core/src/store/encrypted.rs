//! At-rest encrypted store backed by a single file.
//!
//! # File format
//!
//! ```text
//! magic "CGS1" (4) || nonce (24) || XChaCha20-Poly1305(JSON map, aad = magic)
//! ```
//!
//! The whole map is re-sealed under a fresh nonce on every write and persisted
//! with an atomic temp + rename, so a digest is never on disk without its salt.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use covergate_utils::{atomic_write, ensure_owner_only_file, prepare_secure_path, recover_bak_file};
use zeroize::Zeroizing;

use super::{CredentialStore, StoreError, StoreMap, StoredValue};

const MAGIC: &[u8; 4] = b"CGS1";
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
pub const STORE_KEY_LEN: usize = 32;

/// Host-held sealing key for the credential file.
///
/// The host is expected to keep this in platform key storage; covergate never
/// writes it to disk.
#[derive(Clone)]
pub struct StoreKey(Zeroizing<[u8; STORE_KEY_LEN]>);

impl StoreKey {
    #[must_use]
    pub fn from_bytes(bytes: [u8; STORE_KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    #[must_use]
    pub fn generate() -> Self {
        Self::from_bytes(rand::random::<[u8; STORE_KEY_LEN]>())
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(self.0.as_slice()))
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoreKey(<redacted>)")
    }
}

pub struct EncryptedFileStore {
    path: PathBuf,
    cipher: XChaCha20Poly1305,
    map: Mutex<StoreMap>,
}

impl fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedFileStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EncryptedFileStore {
    /// Open the store at `path`, creating an empty one if the file is absent.
    ///
    /// An existing file that fails to authenticate is a hard error; it is
    /// never treated as empty.
    pub fn open(path: impl Into<PathBuf>, key: &StoreKey) -> Result<Self, StoreError> {
        let path = path.into();
        recover_bak_file(&path);
        prepare_secure_path(&path).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;

        let cipher = key.cipher();
        let map = if path.exists() {
            ensure_owner_only_file(&path).map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;
            let sealed = std::fs::read(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            open_sealed(&cipher, &path, &sealed)?
        } else {
            tracing::debug!(path = %path.display(), "Credential store absent; starting empty");
            StoreMap::default()
        };

        Ok(Self {
            path,
            cipher,
            map: Mutex::new(map),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn map(&self) -> MutexGuard<'_, StoreMap> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `edit` to a copy of the map, persist it, and only then publish it.
    fn update(&self, edit: impl FnOnce(&mut StoreMap)) -> Result<(), StoreError> {
        let mut guard = self.map();
        let mut next = guard.clone();
        edit(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, map: &StoreMap) -> Result<(), StoreError> {
        let plaintext = Zeroizing::new(serde_json::to_vec(map)?);
        let nonce = rand::random::<[u8; NONCE_LEN]>();
        let ciphertext = self
            .cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_slice(),
                    aad: MAGIC,
                },
            )
            .map_err(|_| StoreError::Unavailable("failed to seal credential store".into()))?;

        let mut sealed = Vec::with_capacity(MAGIC.len() + NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(MAGIC);
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        atomic_write(&self.path, &sealed).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

fn open_sealed(
    cipher: &XChaCha20Poly1305,
    path: &Path,
    sealed: &[u8],
) -> Result<StoreMap, StoreError> {
    let corrupt = || StoreError::Corrupt {
        path: path.to_path_buf(),
    };

    if sealed.len() < MAGIC.len() + NONCE_LEN + TAG_LEN || !sealed.starts_with(MAGIC) {
        tracing::warn!(path = %path.display(), len = sealed.len(), "Credential store header invalid");
        return Err(corrupt());
    }
    let (nonce, ciphertext) = sealed[MAGIC.len()..].split_at(NONCE_LEN);

    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: MAGIC,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| {
            tracing::warn!(path = %path.display(), "Credential store failed authentication");
            corrupt()
        })?;

    serde_json::from_slice(&plaintext).map_err(|e| {
        tracing::warn!(path = %path.display(), "Credential store payload unreadable: {e}");
        corrupt()
    })
}

impl CredentialStore for EncryptedFileStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.map().get_string(key)
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        self.map().get_bool(key, default)
    }

    fn put_batch(&self, entries: &[(&str, StoredValue)]) -> Result<(), StoreError> {
        self.update(|map| map.put_batch(entries))
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.update(StoreMap::clear)
    }

    fn entries(&self) -> Result<BTreeMap<String, StoredValue>, StoreError> {
        Ok(self.map().snapshot())
    }

    fn backing_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
