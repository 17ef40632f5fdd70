//! Session states and the events that drive them.

use std::fmt;

use crate::ClassificationOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Cover interface shown; protected state hidden.
    #[default]
    Locked,
    /// Protected state revealed.
    Unlocked,
    /// Destructive wipe triggered. Terminal.
    Wiped,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionState::Locked => "locked",
            SessionState::Unlocked => "unlocked",
            SessionState::Wiped => "wiped",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, SessionState::Wiped)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Foregrounded,
    Backgrounded,
    Paused,
    Stopped,
    /// The user pressed the always-visible exit control while unlocked.
    QuickExit,
}

impl LifecycleEvent {
    /// Whether this event hides the protected state.
    #[must_use]
    pub const fn locks(self) -> bool {
        !matches!(self, LifecycleEvent::Foregrounded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    Classified(ClassificationOutcome),
    Lifecycle(LifecycleEvent),
}

impl From<ClassificationOutcome> for SessionEvent {
    fn from(outcome: ClassificationOutcome) -> Self {
        SessionEvent::Classified(outcome)
    }
}

impl From<LifecycleEvent> for SessionEvent {
    fn from(event: LifecycleEvent) -> Self {
        SessionEvent::Lifecycle(event)
    }
}

/// What the cover interface should do after a code is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoverFeedback {
    /// Reveal the protected state.
    Reveal,
    /// Show the benign confirmation ("Event saved") and dismiss the dialog.
    Acknowledge,
    /// Clear the entry in place and let the user try again.
    Reject,
}
