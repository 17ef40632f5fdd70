//! Core domain types for covergate.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer: the credential core, the host's
//! presentation layer, and tests.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod code;
mod session;

pub use code::{CodeError, CodePolicy, PinCode};
pub use session::{CoverFeedback, LifecycleEvent, SessionEvent, SessionState};

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Credential Roles
// ============================================================================

/// The intended meaning of a configured code.
///
/// Order of declaration is the classification precedence: a code accepted by
/// more than one role resolves to the earliest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Opens the protected state.
    Real,
    /// Dismisses the cover dialog as if an ordinary action succeeded.
    Decoy,
    /// Dismisses the cover dialog the same way, then destroys protected data.
    Panic,
}

impl Role {
    /// All roles in precedence order.
    pub const ALL: [Role; 3] = [Role::Real, Role::Decoy, Role::Panic];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Real => "real",
            Role::Decoy => "decoy",
            Role::Panic => "panic",
        }
    }

    /// Classification produced when a candidate code matches this role.
    #[must_use]
    pub const fn outcome(self) -> ClassificationOutcome {
        match self {
            Role::Real => ClassificationOutcome::Real,
            Role::Decoy => ClassificationOutcome::Decoy,
            Role::Panic => ClassificationOutcome::Wipe,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Result of evaluating a candidate code. A plain tag, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassificationOutcome {
    Real,
    Decoy,
    Wipe,
    Wrong,
}

impl ClassificationOutcome {
    /// The role whose code produced this outcome, if any.
    #[must_use]
    pub const fn role(self) -> Option<Role> {
        match self {
            ClassificationOutcome::Real => Some(Role::Real),
            ClassificationOutcome::Decoy => Some(Role::Decoy),
            ClassificationOutcome::Wipe => Some(Role::Panic),
            ClassificationOutcome::Wrong => None,
        }
    }

    /// What the cover interface shows for this outcome.
    ///
    /// `Decoy` and `Wipe` map to the same acknowledgement so an observer
    /// cannot tell them apart.
    #[must_use]
    pub const fn feedback(self) -> CoverFeedback {
        match self {
            ClassificationOutcome::Real => CoverFeedback::Reveal,
            ClassificationOutcome::Decoy | ClassificationOutcome::Wipe => {
                CoverFeedback::Acknowledge
            }
            ClassificationOutcome::Wrong => CoverFeedback::Reject,
        }
    }
}
