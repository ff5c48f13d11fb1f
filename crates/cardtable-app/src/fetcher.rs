// Snapshot fetcher: one `GET /state`, classified into the sync error model.

use std::sync::Arc;

use cardtable_core::error::{SessionEnd, SyncError};
use cardtable_core::protocol::{Snapshot, StateResponse, INVALID_SESSION, ROOM_CLOSED};

use crate::authority::Authority;

#[derive(Clone)]
pub struct SnapshotFetcher {
    authority: Arc<dyn Authority>,
}

impl SnapshotFetcher {
    pub fn new(authority: Arc<dyn Authority>) -> Self {
        Self { authority }
    }

    /// Fetch the current table.
    ///
    /// `Room closed` and `Invalid session` end the session. Everything else
    /// that is not a snapshot, including authority errors such as
    /// `Game not started`, is a transport failure and will be retried.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, SyncError> {
        match self.authority.fetch_state().await {
            Ok(StateResponse::Snapshot(snapshot)) => Ok(*snapshot),
            Ok(StateResponse::Error { error }) => Err(classify_error(&error)),
            Err(e) => Err(SyncError::Transport(e.to_string())),
        }
    }
}

fn classify_error(error: &str) -> SyncError {
    match error {
        ROOM_CLOSED => SyncError::SessionInvalidated(SessionEnd::RoomClosed),
        INVALID_SESSION => SyncError::SessionInvalidated(SessionEnd::InvalidSession),
        other => SyncError::Transport(other.to_string()),
    }
}
