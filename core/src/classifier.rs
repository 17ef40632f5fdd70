//! Maps a candidate code to one of four outcomes.
//!
//! Precedence is fixed: Real, then Decoy, then Panic (reported as `Wipe`),
//! else `Wrong`. If setup-time collision checks were ever bypassed and two
//! roles accept the same code, Real wins and Panic loses, so a guessed code
//! is least likely to destroy data.
//!
//! Each configured role that is reached costs one full derivation. Unconfigured
//! roles are skipped; that reveals only how many roles exist.

use std::fmt;
use std::sync::Arc;

use covergate_types::{ClassificationOutcome, PinCode};

use crate::registry::CredentialRegistry;
use crate::store::{CredentialStore, StoreError};

pub struct PinClassifier<S> {
    registry: Arc<CredentialRegistry<S>>,
}

impl<S> Clone for PinClassifier<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S> fmt::Debug for PinClassifier<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinClassifier").finish_non_exhaustive()
    }
}

impl<S: CredentialStore> PinClassifier<S> {
    #[must_use]
    pub fn new(registry: Arc<CredentialRegistry<S>>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CredentialRegistry<S>> {
        &self.registry
    }

    /// Classify `code` against the current registry contents.
    ///
    /// Blocks for one derivation per configured role checked. A storage fault
    /// is returned as an error and never degrades to an outcome.
    pub fn evaluate(&self, code: &PinCode) -> Result<ClassificationOutcome, StoreError> {
        let hasher = self.registry.hasher();
        for credential in self.registry.credentials()? {
            if hasher.verify(code, &credential.digest, &credential.salt) {
                return Ok(credential.role.outcome());
            }
        }
        Ok(ClassificationOutcome::Wrong)
    }
}

impl<S: CredentialStore + 'static> PinClassifier<S> {
    /// [`evaluate`](Self::evaluate) on the blocking pool.
    pub async fn evaluate_async(
        &self,
        code: PinCode,
    ) -> Result<ClassificationOutcome, StoreError> {
        let classifier = self.clone();
        tokio::task::spawn_blocking(move || classifier.evaluate(&code))
            .await
            .map_err(|e| {
                tracing::error!("Classification task failed: {e}");
                StoreError::Unavailable("classification task failed".into())
            })?
    }
}
