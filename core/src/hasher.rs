//! Code stretching and timing-safe verification.
//!
//! PBKDF2-HMAC-SHA-256, 200,000 iterations, 256-bit output, 32-byte random salt.
//! These parameters are compiled in: a digest written by one build must verify
//! under every other build, so none of them are configurable.

use std::fmt;

use covergate_types::PinCode;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

pub const PBKDF2_ITERATIONS: u32 = 200_000;
pub const DIGEST_LEN: usize = 32;
pub const SALT_LEN: usize = 32;

/// Stretched output of [`PinHasher::derive`].
#[derive(Clone, PartialEq, Eq)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

// A digest of a short numeric code is cheap to brute-force offline, so keep it out of logs.
impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Digest(<redacted>)")
    }
}

/// Per-credential random salt.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    /// Fresh salt from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::random::<[u8; SALT_LEN]>())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(<redacted>)")
    }
}

/// Stateless; every call is a pure function of its inputs (plus the RNG for `hash`).
#[derive(Debug, Clone, Copy, Default)]
pub struct PinHasher;

impl PinHasher {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Deliberately slow. Run it off any thread that handles input.
    #[must_use]
    pub fn derive(&self, code: &PinCode, salt: &[u8]) -> Digest {
        let mut out = [0u8; DIGEST_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(code.as_bytes(), salt, PBKDF2_ITERATIONS, &mut out);
        Digest(out)
    }

    #[must_use]
    pub fn hash(&self, code: &PinCode) -> (Digest, Salt) {
        let salt = Salt::generate();
        let digest = self.derive(code, salt.as_bytes());
        (digest, salt)
    }

    /// Recompute and compare. A stored digest of the wrong width never matches.
    #[must_use]
    pub fn verify(&self, code: &PinCode, digest: &[u8], salt: &[u8]) -> bool {
        let candidate = Zeroizing::new(self.derive(code, salt).0);
        constant_time_eq(candidate.as_slice(), digest)
    }
}

/// Compare two byte strings in time that depends only on their lengths.
///
/// Unequal lengths return early; lengths here are fixed by the format, so that
/// leaks nothing.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
