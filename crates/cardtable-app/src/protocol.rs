// Messages exchanged between the session loop and the renderer.

use cardtable_core::error::SessionEnd;
use cardtable_core::protocol::DrawSource;
use cardtable_core::view::ViewModel;

/// Input from the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Select or deselect the hand card at this index.
    ToggleCard(usize),
    ToggleDrawSource(DrawSource),
    Play,
    EndRound,
    /// The ready button on the round summary.
    ToggleReady,
    /// Readiness in the lobby, before the game has been dealt.
    ToggleLobbyReady,
    AcknowledgeNotice,
    /// Close the room for every player.
    QuitGame,
    /// Leave the client; the room stays open.
    Exit,
}

/// Output to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    View(Box<ViewModel>),
    /// A message for the player: a rejected intent or a failed local check.
    Notice(String),
    /// Lobby status while no game has been dealt yet.
    Lobby { ready: bool, started: bool },
    /// The session is over; the client should leave the table.
    SessionEnded(SessionEnd),
}
