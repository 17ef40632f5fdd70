//! The three credential roles and their persisted digests.
//!
//! This is the only component that talks to the [`CredentialStore`]. Every
//! store access goes through one mutex so a digest write can never interleave
//! with another writer's salt write. Derivation always happens outside it.
//!
//! A second, outer mutex serializes whole check-then-write sequences, so two
//! enrollments cannot both pass a collision check and then both write.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use covergate_types::{PinCode, Role};

use crate::hasher::PinHasher;
use crate::store::{CredentialStore, StoreError, StoredValue};

const KEY_PIN_CONFIGURED: &str = "pin_configured";

fn hash_key(role: Role) -> &'static str {
    match role {
        Role::Real => "pin_real_hash",
        Role::Decoy => "pin_decoy_hash",
        Role::Panic => "pin_panic_hash",
    }
}

fn salt_key(role: Role) -> &'static str {
    match role {
        Role::Real => "pin_real_salt",
        Role::Decoy => "pin_decoy_salt",
        Role::Panic => "pin_panic_salt",
    }
}

/// A role's stored digest and salt, exactly as read back.
#[derive(Clone)]
pub struct Credential {
    pub role: Role,
    pub digest: Vec<u8>,
    pub salt: Vec<u8>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

pub struct CredentialRegistry<S> {
    store: Arc<S>,
    hasher: PinHasher,
    // Lock order: `writes` before `io`.
    writes: Mutex<()>,
    io: Mutex<()>,
}

impl<S> fmt::Debug for CredentialRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRegistry").finish_non_exhaustive()
    }
}

impl<S: CredentialStore> CredentialRegistry<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            hasher: PinHasher::new(),
            writes: Mutex::new(()),
            io: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn hasher(&self) -> PinHasher {
        self.hasher
    }

    fn io(&self) -> MutexGuard<'_, ()> {
        self.io.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Held across a check-then-write sequence. Reads stay available to
    /// classification while it is held.
    pub(crate) fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True once a Real code has been set. Gates first-run setup.
    pub fn is_configured(&self) -> Result<bool, StoreError> {
        let _io = self.io();
        self.store.get_bool(KEY_PIN_CONFIGURED, false)
    }

    pub fn set_real(&self, code: &PinCode) -> Result<(), StoreError> {
        self.set(Role::Real, code)
    }

    pub fn set_decoy(&self, code: &PinCode) -> Result<(), StoreError> {
        self.set(Role::Decoy, code)
    }

    pub fn set_panic(&self, code: &PinCode) -> Result<(), StoreError> {
        self.set(Role::Panic, code)
    }

    /// Hash `code` and overwrite `role`'s credential.
    ///
    /// Does not check other roles for collisions; see
    /// [`CoverGate::enroll`](crate::CoverGate::enroll).
    pub fn set(&self, role: Role, code: &PinCode) -> Result<(), StoreError> {
        let _writes = self.write_lock();
        self.set_locked(role, code)
    }

    /// [`set`](Self::set) for a caller already holding [`write_lock`](Self::write_lock).
    ///
    /// Digest, salt, and (for `Real`) the configured flag land in one write.
    pub(crate) fn set_locked(&self, role: Role, code: &PinCode) -> Result<(), StoreError> {
        let (digest, salt) = self.hasher.hash(code);
        let mut batch = vec![
            (hash_key(role), StoredValue::String(STANDARD.encode(digest.as_bytes()))),
            (salt_key(role), StoredValue::String(STANDARD.encode(salt.as_bytes()))),
        ];
        if role == Role::Real {
            batch.push((KEY_PIN_CONFIGURED, StoredValue::Bool(true)));
        }

        let _io = self.io();
        self.store.put_batch(&batch)?;
        tracing::info!(role = %role, "Credential updated");
        Ok(())
    }

    pub fn is_role_configured(&self, role: Role) -> Result<bool, StoreError> {
        let _io = self.io();
        Ok(self.store.get_string(hash_key(role))?.is_some())
    }

    pub fn is_decoy_configured(&self) -> Result<bool, StoreError> {
        self.is_role_configured(Role::Decoy)
    }

    pub fn is_panic_configured(&self) -> Result<bool, StoreError> {
        self.is_role_configured(Role::Panic)
    }

    /// Read back `role`'s credential. `None` when the role was never set.
    ///
    /// A digest without its salt, or undecodable material, is a storage fault.
    pub fn credential(&self, role: Role) -> Result<Option<Credential>, StoreError> {
        let _io = self.io();
        self.read_credential(role)
    }

    /// Every configured credential in precedence order, read under one lock
    /// so a concurrent `set` cannot produce a mixed view.
    pub fn credentials(&self) -> Result<Vec<Credential>, StoreError> {
        let _io = self.io();
        let mut out = Vec::with_capacity(Role::ALL.len());
        for role in Role::ALL {
            if let Some(credential) = self.read_credential(role)? {
                out.push(credential);
            }
        }
        Ok(out)
    }

    fn read_credential(&self, role: Role) -> Result<Option<Credential>, StoreError> {
        let digest = self.store.get_string(hash_key(role))?;
        let salt = self.store.get_string(salt_key(role))?;

        match (digest, salt) {
            (None, None) => Ok(None),
            (Some(digest), Some(salt)) => {
                let digest = decode(hash_key(role), &digest)?;
                let salt = decode(salt_key(role), &salt)?;
                Ok(Some(Credential { role, digest, salt }))
            }
            (Some(_), None) => Err(StoreError::Malformed {
                key: salt_key(role).to_string(),
            }),
            (None, Some(_)) => Err(StoreError::Malformed {
                key: hash_key(role).to_string(),
            }),
        }
    }

    /// Whether `code` is accepted by `role`. An unconfigured role never matches.
    pub fn matches(&self, role: Role, code: &PinCode) -> Result<bool, StoreError> {
        Ok(self
            .credential(role)?
            .is_some_and(|c| self.hasher.verify(code, &c.digest, &c.salt)))
    }

    /// Factory reset: every credential and the configured flag.
    ///
    /// Distinct from the destructive wipe, which leaves credentials in place.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        let _writes = self.write_lock();
        let _io = self.io();
        self.store.clear()?;
        tracing::info!("All credentials cleared");
        Ok(())
    }
}

fn decode(key: &str, value: &str) -> Result<Vec<u8>, StoreError> {
    STANDARD.decode(value).map_err(|_| StoreError::Malformed {
        key: key.to_string(),
    })
}
