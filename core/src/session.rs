//! Whether the protected state is currently visible.
//!
//! `Locked` is the initial state. Only a `Real` classification unlocks, any
//! hiding lifecycle event locks again, and `Wipe` moves to the terminal
//! `Wiped` state from anywhere. Foregrounding never unlocks.
//!
//! Every hiding event also advances a lock epoch. A classification that was
//! started before the latest hiding event cannot unlock.

use std::sync::atomic::{AtomicU64, Ordering};

use covergate_types::{ClassificationOutcome, SessionEvent, SessionState};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session was wiped; no further events are accepted")]
    Wiped,
}

/// Owner of the session state.
///
/// Observers hold a [`watch::Receiver`] from [`subscribe`](Self::subscribe)
/// and are woken only on actual transitions.
#[derive(Debug)]
pub struct SessionGate {
    state: watch::Sender<SessionState>,
    // Only advanced while the watch value is held for writing.
    epoch: AtomicU64,
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionGate {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Locked);
        Self {
            state,
            epoch: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current lock epoch. Capture it before classifying a code and pass it
    /// to [`handle_classified`](Self::handle_classified).
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Apply `event` and return the resulting state.
    pub fn handle(&self, event: impl Into<SessionEvent>) -> Result<SessionState, SessionError> {
        self.apply(event.into(), None)
    }

    /// Apply a classification that started at lock epoch `since`.
    ///
    /// A `Real` outcome is dropped if the session was hidden in the meantime.
    /// Every other outcome applies as usual.
    pub fn handle_classified(
        &self,
        outcome: ClassificationOutcome,
        since: u64,
    ) -> Result<SessionState, SessionError> {
        self.apply(SessionEvent::Classified(outcome), Some(since))
    }

    fn apply(
        &self,
        event: SessionEvent,
        since: Option<u64>,
    ) -> Result<SessionState, SessionError> {
        let mut result = Ok(SessionState::Locked);
        self.state.send_if_modified(|state| {
            if state.is_terminal() {
                result = Err(SessionError::Wiped);
                return false;
            }
            if let SessionEvent::Lifecycle(lifecycle) = event
                && lifecycle.locks()
            {
                self.epoch.fetch_add(1, Ordering::SeqCst);
            }
            let stale = since.is_some_and(|since| since != self.epoch.load(Ordering::SeqCst));
            if stale && event == SessionEvent::Classified(ClassificationOutcome::Real) {
                tracing::debug!("Unlock dropped: session was hidden during classification");
                result = Ok(*state);
                return false;
            }
            let next = transition(*state, event);
            result = Ok(next);
            if next == *state {
                return false;
            }
            if next == SessionState::Locked {
                tracing::debug!("Session locked");
            }
            *state = next;
            true
        });
        result
    }
}

fn transition(state: SessionState, event: SessionEvent) -> SessionState {
    match (state, event) {
        (_, SessionEvent::Classified(ClassificationOutcome::Wipe)) => SessionState::Wiped,
        (SessionState::Locked, SessionEvent::Classified(ClassificationOutcome::Real)) => {
            SessionState::Unlocked
        }
        (SessionState::Unlocked, SessionEvent::Lifecycle(event)) if event.locks() => {
            SessionState::Locked
        }
        (state, _) => state,
    }
}
