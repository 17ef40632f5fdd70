//! Candidate codes entered on the cover keypad.

use std::fmt;

use thiserror::Error;
use zeroize::Zeroizing;

/// Length bounds and alphabet for codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodePolicy {
    pub min_len: usize,
    pub max_len: usize,
}

impl CodePolicy {
    pub const DEFAULT_MIN_LEN: usize = 4;
    pub const DEFAULT_MAX_LEN: usize = 12;

    pub fn new(min_len: usize, max_len: usize) -> Result<Self, CodeError> {
        if min_len == 0 || min_len > max_len {
            return Err(CodeError::InvalidPolicy { min_len, max_len });
        }
        Ok(Self { min_len, max_len })
    }
}

impl Default for CodePolicy {
    fn default() -> Self {
        Self {
            min_len: Self::DEFAULT_MIN_LEN,
            max_len: Self::DEFAULT_MAX_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    #[error("code must contain only the digits 0-9")]
    NonDigit,
    #[error("code must be between {min} and {max} digits, got {len}")]
    Length { len: usize, min: usize, max: usize },
    #[error("invalid code policy: min {min_len}, max {max_len}")]
    InvalidPolicy { min_len: usize, max_len: usize },
}

/// A validated numeric code.
///
/// The digits are wiped from memory on drop and never printed by `Debug`.
/// There is deliberately no `Display` impl.
#[derive(Clone)]
pub struct PinCode(Zeroizing<String>);

impl PinCode {
    /// Validate against the default policy.
    pub fn new(raw: impl Into<String>) -> Result<Self, CodeError> {
        Self::with_policy(raw, CodePolicy::default())
    }

    pub fn with_policy(raw: impl Into<String>, policy: CodePolicy) -> Result<Self, CodeError> {
        let raw = Zeroizing::new(raw.into());
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodeError::NonDigit);
        }
        let len = raw.len();
        if len < policy.min_len || len > policy.max_len {
            return Err(CodeError::Length {
                len,
                min: policy.min_len,
                max: policy.max_len,
            });
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for PinCode {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes() == other.0.as_bytes()
    }
}

impl Eq for PinCode {}

impl TryFrom<&str> for PinCode {
    type Error = CodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for PinCode {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// Manual Debug impl to prevent leaking codes in logs.
impl fmt::Debug for PinCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PinCode(<redacted>, len={})", self.len())
    }
}
