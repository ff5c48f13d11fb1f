// Keyboard input handling and command dispatch.
//
// Translates crossterm key events into UserCommand messages for the session
// loop, or into local ViewState changes (cursor movement, the quit dialog).

use cardtable_app::protocol::UserCommand;
use cardtable_core::protocol::DrawSource;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::ViewState;

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key press should be forwarded to the
/// session loop. Returns `None` when it was handled locally or ignored.
pub fn handle_key(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    // crossterm reports release events on some platforms.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    if key_event.modifiers.contains(KeyModifiers::CONTROL) && key_event.code == KeyCode::Char('c') {
        return Some(UserCommand::Exit);
    }

    // Any key answers the previous notice.
    view_state.notice = None;

    if view_state.confirm_quit {
        return handle_confirm_quit(key_event, view_state);
    }

    let notice_open = view_state
        .table
        .as_ref()
        .is_some_and(|v| v.game_over_notice.is_some());
    if notice_open {
        return match key_event.code {
            KeyCode::Char('o') | KeyCode::Enter | KeyCode::Esc => Some(UserCommand::AcknowledgeNotice),
            KeyCode::Char('q') => Some(UserCommand::Exit),
            _ => None,
        };
    }

    match key_event.code {
        KeyCode::Left => {
            view_state.cursor = view_state.cursor.saturating_sub(1);
            None
        }
        KeyCode::Right => {
            if view_state.cursor + 1 < view_state.hand_len() {
                view_state.cursor += 1;
            }
            None
        }
        KeyCode::Char(' ') => {
            (view_state.hand_len() > 0).then_some(UserCommand::ToggleCard(view_state.cursor))
        }
        KeyCode::Char(c @ '1'..='9') => {
            let index = (c as usize) - ('1' as usize);
            if index < view_state.hand_len() {
                view_state.cursor = index;
                Some(UserCommand::ToggleCard(index))
            } else {
                None
            }
        }
        KeyCode::Char('d') => Some(UserCommand::ToggleDrawSource(DrawSource::Deck)),
        KeyCode::Char('p') => Some(UserCommand::ToggleDrawSource(DrawSource::Pile)),
        KeyCode::Enter => Some(UserCommand::Play),
        KeyCode::Char('e') => Some(UserCommand::EndRound),
        KeyCode::Char('r') => Some(UserCommand::ToggleReady),
        KeyCode::Char('l') => Some(UserCommand::ToggleLobbyReady),
        KeyCode::Char('Q') => {
            view_state.confirm_quit = true;
            None
        }
        KeyCode::Char('q') => Some(UserCommand::Exit),
        _ => None,
    }
}

/// In the quit dialog `y` closes the room, `n` or `Esc` cancels, and every
/// other key is swallowed.
fn handle_confirm_quit(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            view_state.confirm_quit = false;
            Some(UserCommand::QuitGame)
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            view_state.confirm_quit = false;
            None
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
