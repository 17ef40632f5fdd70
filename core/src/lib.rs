//! Credential core for covergate.
//!
//! A cover interface collects a numeric code and hands it to a [`CoverGate`].
//! The code is classified against three stored credentials: the real code
//! reveals the protected state, the decoy code dismisses the cover as if an
//! ordinary action succeeded, and the panic code does the same and then wipes
//! the application's data and ends the process.
//!
//! Pieces are usable on their own: [`PinHasher`] for stretching and
//! verification, [`CredentialRegistry`] over any [`CredentialStore`],
//! [`PinClassifier`], [`SessionGate`], and [`WipeExecutor`].

mod classifier;
pub mod config;
mod gate;
mod hasher;
mod registry;
mod session;
pub mod store;
pub mod wipe;

pub use classifier::PinClassifier;
pub use config::{ConfigError, GateConfig};
pub use gate::{CoverGate, EnrollError, OpenError, SubmitError};
pub use hasher::{DIGEST_LEN, Digest, PBKDF2_ITERATIONS, PinHasher, SALT_LEN, Salt, constant_time_eq};
pub use registry::{Credential, CredentialRegistry};
pub use session::{SessionError, SessionGate};
pub use store::{CredentialStore, EncryptedFileStore, MemoryStore, StoreError, StoreKey, StoredValue};
pub use wipe::{
    ProcessExit, Terminator, WipeExecutor, WipeHandle, WipePlan, WipeReport, WipeTargetKind,
};

pub use covergate_types::{
    ClassificationOutcome, CodeError, CodePolicy, CoverFeedback, LifecycleEvent, PinCode, Role,
    SessionEvent, SessionState,
};
