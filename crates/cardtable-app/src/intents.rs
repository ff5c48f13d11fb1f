// Intent submitter: turns user intents into authority requests and maps the
// replies onto the sync error model.
//
// Nothing here mutates local state. The session loop decides what to clear
// and when to refresh based on the result.

use std::sync::Arc;

use cardtable_core::card::CardCode;
use cardtable_core::error::{SessionEnd, SyncError};
use cardtable_core::protocol::{LobbyReadyResponse, ReadyResponse};
use cardtable_core::selection::Selection;
use tracing::{info, warn};

use crate::authority::{Authority, AuthorityError, Reply};

/// Shown when the authority refuses a play without saying why.
pub const INVALID_MOVE: &str = "Invalid move.";
/// Shown whenever ending the round fails.
pub const END_ROUND_FAILED: &str = "Could not end round.";
pub const READY_FAILED: &str = "Could not update ready state.";
pub const JOIN_FAILED: &str = "Could not join room.";

#[derive(Clone)]
pub struct IntentSubmitter {
    authority: Arc<dyn Authority>,
}

impl IntentSubmitter {
    pub fn new(authority: Arc<dyn Authority>) -> Self {
        Self { authority }
    }

    /// Submit the selected cards and draw source.
    ///
    /// Local preconditions are checked first and fail without contacting
    /// the authority.
    pub async fn play(&self, selection: &Selection, hand: &[CardCode]) -> Result<(), SyncError> {
        let request = selection.build_play_request(hand)?;
        info!(
            "Playing {} card(s), drawing from {}",
            request.cards.len(),
            request.draw
        );

        match self.authority.play(&request).await.map_err(transport)? {
            Reply::Accepted(()) => Ok(()),
            Reply::Rejected(reason) => {
                let message = reason.unwrap_or_else(|| INVALID_MOVE.to_string());
                warn!("Play rejected: {message}");
                Err(SyncError::rejected(message))
            }
            // The authority bounces requests for a room that no longer exists.
            Reply::Redirected { .. } => Err(SyncError::SessionInvalidated(SessionEnd::RoomClosed)),
        }
    }

    pub async fn end_round(&self) -> Result<(), SyncError> {
        info!("Ending round");
        match self.authority.end_round().await.map_err(transport)? {
            Reply::Accepted(()) => Ok(()),
            Reply::Rejected(reason) => {
                warn!("End round rejected: {}", reason.as_deref().unwrap_or("no reason"));
                Err(SyncError::rejected(END_ROUND_FAILED))
            }
            Reply::Redirected { .. } => Err(SyncError::SessionInvalidated(SessionEnd::RoomClosed)),
        }
    }

    /// Flip the viewer's ready flag for the next round.
    pub async fn toggle_ready(&self) -> Result<ReadyResponse, SyncError> {
        match self.authority.ready_next_round().await.map_err(transport)? {
            Reply::Accepted(response) => {
                info!(
                    "Ready set now {:?} (all ready: {})",
                    response.ready, response.all_ready
                );
                Ok(response)
            }
            Reply::Rejected(reason) => {
                let message = reason.unwrap_or_else(|| READY_FAILED.to_string());
                warn!("Ready toggle rejected: {message}");
                Err(SyncError::rejected(message))
            }
            Reply::Redirected { .. } => Err(SyncError::SessionInvalidated(SessionEnd::RoomClosed)),
        }
    }

    /// Close the room for everyone.
    ///
    /// Returns the session end to act on when the authority redirected, and
    /// `None` when there is no room to close or nothing happened.
    pub async fn quit(&self, room_code: Option<&str>) -> Result<Option<SessionEnd>, SyncError> {
        let Some(room) = room_code else {
            info!("Quit requested with no known room; ignoring");
            return Ok(None);
        };

        info!("Deleting room {room}");
        match self.authority.delete_room(room).await.map_err(transport)? {
            Reply::Redirected { location } => Ok(Some(SessionEnd::Quit {
                destination: location,
            })),
            other => {
                warn!("Delete room {room} was not redirected: {other:?}");
                Ok(None)
            }
        }
    }

    /// Join `room` as `name`. The authority answers with a redirect either
    /// to the room page (joined) or back to the landing page (refused).
    pub async fn join(&self, room: &str, name: &str) -> Result<(), SyncError> {
        info!("Joining room {room} as {name}");
        match self.authority.join_room(room, name).await.map_err(transport)? {
            Reply::Redirected { location } if is_room_page(&location, room) => Ok(()),
            Reply::Accepted(()) => Ok(()),
            Reply::Redirected { location } => {
                warn!("Join refused, redirected to {location}");
                Err(SyncError::rejected(JOIN_FAILED))
            }
            Reply::Rejected(reason) => Err(SyncError::rejected(
                reason.unwrap_or_else(|| JOIN_FAILED.to_string()),
            )),
        }
    }

    /// Toggle readiness in the lobby, before the first deal.
    pub async fn lobby_ready(&self, room: &str) -> Result<LobbyReadyResponse, SyncError> {
        match self.authority.toggle_lobby_ready(room).await.map_err(transport)? {
            Reply::Accepted(response) => {
                info!("Lobby ready: {response:?}");
                Ok(response)
            }
            Reply::Rejected(reason) => Err(SyncError::rejected(
                reason.unwrap_or_else(|| READY_FAILED.to_string()),
            )),
            Reply::Redirected { .. } => Err(SyncError::SessionInvalidated(SessionEnd::RoomClosed)),
        }
    }
}

/// Whether a join redirect landed on `/join/{room}` for exactly this room.
fn is_room_page(location: &str, room: &str) -> bool {
    reqwest::Url::parse(location)
        .map(|url| url.path() == format!("/join/{room}"))
        .unwrap_or(false)
}

fn transport(e: AuthorityError) -> SyncError {
    warn!("Intent request failed: {e}");
    SyncError::Transport(e.to_string())
}
