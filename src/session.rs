//! Session store: identity and sequence tracking for resume.

use log::warn;

use crate::models::User;

/// An established gateway session, created on the session-ready dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Server-assigned session identifier, required for resume.
    pub session_id: String,
    /// The authenticated user, set once on successful handshake.
    pub user: User,
}

/// Tracks the active session and the last dispatched sequence number.
///
/// The sequence number is monotonically non-decreasing for the lifetime of
/// a session and deliberately survives reconnect attempts so a resume can
/// pick up where the stream left off. It resets only when the session
/// itself is cleared.
#[derive(Debug, Default)]
pub(crate) struct SessionTracker {
    session: Option<Session>,
    last_sequence: Option<u64>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dispatched sequence number, ignoring regressions.
    pub fn observe_sequence(&mut self, seq: u64) {
        match self.last_sequence {
            Some(last) if seq < last => {
                warn!("ignoring sequence regression: {} < {}", seq, last);
            }
            _ => self.last_sequence = Some(seq),
        }
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Install a freshly established session.
    pub fn establish(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.session_id.as_str())
    }

    /// Drop the session and its sequence. Used on logout, fatal close, and
    /// non-resumable invalid-session.
    pub fn clear(&mut self) {
        self.session = None;
        self.last_sequence = None;
    }
}
