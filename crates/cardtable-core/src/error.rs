// Error taxonomy for the synchronization layer.

use std::fmt;

use thiserror::Error;

/// Why the authority ended our session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    RoomClosed,
    InvalidSession,
    /// The viewer quit the game; the authority redirected to `destination`.
    Quit { destination: String },
}

impl SessionEnd {
    /// Where the client should navigate after clearing local state.
    pub fn destination(&self) -> &str {
        match self {
            SessionEnd::RoomClosed | SessionEnd::InvalidSession => "/",
            SessionEnd::Quit { destination } => destination,
        }
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::RoomClosed => f.write_str("room closed"),
            SessionEnd::InvalidSession => f.write_str("invalid session"),
            SessionEnd::Quit { destination } => write!(f, "quit (redirected to {destination})"),
        }
    }
}

/// Checks made locally before an intent is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    MissingDrawSource,
    EmptySelection,
    /// The turn lock disallows the action right now.
    NotAllowed,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::MissingDrawSource => f.write_str("Choose draw source."),
            Precondition::EmptySelection => f.write_str("Select cards to play."),
            Precondition::NotAllowed => f.write_str("Not your turn."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Terminal: local state must be cleared and the client redirected.
    #[error("session ended: {0}")]
    SessionInvalidated(SessionEnd),

    /// The authority refused an intent. Recoverable.
    #[error("{message}")]
    IntentRejected { message: String },

    /// Network or decode failure. Retried on the next poll.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Caught before any request was sent.
    #[error("{0}")]
    LocalPrecondition(Precondition),

    /// No player in the snapshot carries a revealed hand.
    #[error("snapshot has no player with a revealed hand")]
    ViewerMissing,
}

impl SyncError {
    pub fn rejected(message: impl Into<String>) -> Self {
        SyncError::IntentRejected {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncError::SessionInvalidated(_))
    }
}
