// Terminal table: layout, input handling, and widget rendering.
//
// The TUI owns a `ViewState` holding the latest view model from the session
// loop plus purely local state (hand cursor, pending notice, quit dialog).
// The session loop pushes `UiUpdate` messages over an mpsc channel; the TUI
// applies them to `ViewState` and re-renders at ~30 fps.

pub mod input;
pub mod layout;
pub mod widgets;

use std::time::Duration;

use cardtable_app::protocol::{UiUpdate, UserCommand};
use cardtable_core::error::SessionEnd;
use cardtable_core::view::ViewModel;
use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use tokio::sync::mpsc;
use tracing::debug;

use layout::{build_layout, AppLayout};

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// Lobby readiness, reported before the first deal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LobbyStatus {
    pub ready: bool,
    pub started: bool,
}

/// TUI-local state for rendering.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    /// Latest reconciled table, once a game is running.
    pub table: Option<ViewModel>,
    /// Index of the highlighted hand card.
    pub cursor: usize,
    /// Last rejection or local check message. Cleared on the next key press.
    pub notice: Option<String>,
    pub lobby: LobbyStatus,
    /// Quit-game confirmation dialog is open.
    pub confirm_quit: bool,
    /// Set once the session loop reports the session is over.
    pub ended: Option<SessionEnd>,
    /// Room from the configuration, shown until a view arrives.
    configured_room: Option<String>,
}

impl ViewState {
    pub fn new(configured_room: Option<String>) -> Self {
        ViewState {
            configured_room,
            ..Default::default()
        }
    }

    pub fn room_code(&self) -> Option<&str> {
        self.table
            .as_ref()
            .and_then(|v| v.room_code.as_deref())
            .or(self.configured_room.as_deref())
    }

    pub fn hand_len(&self) -> usize {
        self.table.as_ref().map_or(0, |v| v.viewer.hand.len())
    }

    /// Keep the cursor on a card after the hand shrinks.
    fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.hand_len().saturating_sub(1));
    }
}

// ---------------------------------------------------------------------------
// UiUpdate processing
// ---------------------------------------------------------------------------

/// Apply a single UiUpdate to the ViewState.
pub fn apply_ui_update(state: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::View(view) => {
            state.table = Some(*view);
            state.clamp_cursor();
        }
        UiUpdate::Notice(message) => {
            state.notice = Some(message);
        }
        UiUpdate::Lobby { ready, started } => {
            state.lobby = LobbyStatus { ready, started };
            if started {
                state.notice = Some("Game starting.".to_string());
            }
        }
        UiUpdate::SessionEnded(end) => {
            state.ended = Some(end);
        }
    }
}

// ---------------------------------------------------------------------------
// Render frame
// ---------------------------------------------------------------------------

/// Render the complete table frame.
pub fn render_frame(frame: &mut Frame, state: &ViewState) {
    let layout = build_layout(frame.area());

    widgets::status_bar::render(frame, layout.status_bar, state);
    render_help_bar(frame, &layout, state);

    let Some(view) = &state.table else {
        render_waiting(frame, &layout, state);
        if state.confirm_quit {
            widgets::quit_confirm::render(frame, frame.area());
        }
        return;
    };

    widgets::table::render(frame, layout.table, view);
    widgets::action_log::render(frame, layout.action_log, &view.log);
    widgets::hand::render(frame, layout.hand, view, state.cursor);

    // Overlays, lowest first.
    if let Some(summary) = &view.round_summary {
        widgets::round_summary::render(frame, layout.table, summary, &view.ready_players);
    }
    if let Some(notice) = &view.game_over_notice {
        widgets::game_over::render(frame, frame.area(), notice);
    }
    if state.confirm_quit {
        widgets::quit_confirm::render(frame, frame.area());
    }
}

fn render_waiting(frame: &mut Frame, layout: &AppLayout, state: &ViewState) {
    let ready = if state.lobby.ready {
        "You are ready. Press l to cancel."
    } else {
        "Press l when you are ready to start."
    };
    let paragraph = Paragraph::new(vec![
        Line::raw(""),
        Line::raw("  Waiting for the game to start..."),
        Line::raw(""),
        Line::raw(format!("  {ready}")),
    ])
    .style(Style::default().fg(Color::Gray))
    .block(Block::default().borders(Borders::ALL).title("Lobby"));
    frame.render_widget(paragraph, layout.table);
}

fn render_help_bar(frame: &mut Frame, layout: &AppLayout, state: &ViewState) {
    let text = help_text(state);
    let paragraph = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::DIM),
    )))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, layout.help_bar);
}

/// Key hints for whatever currently has focus.
pub fn help_text(state: &ViewState) -> &'static str {
    if state.confirm_quit {
        return " y:Close room | n/Esc:Cancel";
    }
    match &state.table {
        None => " l:Lobby ready | Q:Quit game | q:Exit",
        Some(view) if view.game_over_notice.is_some() => " o/Enter:OK | q:Exit",
        Some(view) if view.round_summary.is_some() => " r:Toggle ready | Q:Quit game | q:Exit",
        Some(_) => {
            " ←/→:Move | Space:Select | d:Deck | p:Pile | Enter:Play | e:End round | Q:Quit game | q:Exit"
        }
    }
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI event loop.
///
/// 1. Initializes the terminal (raw mode, alternate screen).
/// 2. Installs a panic hook to restore the terminal on crash.
/// 3. Runs an async select loop: UI updates, keyboard input, render ticks.
/// 4. Restores the terminal on exit.
///
/// Returns once the player exits or the session loop reports the session
/// is over (or goes away).
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
    configured_room: Option<String>,
) -> anyhow::Result<ViewState> {
    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view_state = ViewState::new(configured_room);
    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let result = loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(update) => {
                        apply_ui_update(&mut view_state, update);
                        if view_state.ended.is_some() {
                            break Ok(());
                        }
                    }
                    None => {
                        debug!("UI channel closed");
                        break Ok(());
                    }
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, &mut view_state) {
                            let exit = cmd == UserCommand::Exit;
                            let _ = cmd_tx.send(cmd).await;
                            if exit {
                                break Ok(());
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(anyhow::Error::from(e).context("terminal input failed")),
                    None => break Ok(()),
                }
            }

            _ = render_tick.tick() => {
                if let Err(e) = terminal.draw(|frame| render_frame(frame, &view_state)) {
                    break Err(anyhow::Error::from(e).context("failed to draw frame"));
                }
            }
        }
    };

    ratatui::restore();
    result.map(|()| view_state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cardtable_core::action_log::{ActionLogEntry, LogItem, LogItemKind};
    use cardtable_core::card::CardCode;
    use cardtable_core::popup::RoundSummary;
    use cardtable_core::selection::Selection;
    use cardtable_core::turn_lock;
    use cardtable_core::view::{OpponentView, PileView, Seat, ViewerView};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    /// Ada to move, holding four cards, against Bo on the left seat.
    pub(crate) fn sample_view() -> ViewModel {
        ViewModel {
            viewer: ViewerView {
                name: "Ada".into(),
                hand: ["A♠", "5♥", "5♣", "K♦"]
                    .into_iter()
                    .map(CardCode::from)
                    .collect(),
                hand_value: Some(21),
                score: 3,
                color: "#8fd4ff".into(),
            },
            opponents: vec![OpponentView {
                name: "Bo".into(),
                card_count: 4,
                score: 12,
                color: "#ffadad".into(),
                seat: Some(Seat::Left),
                is_current: false,
            }],
            current_player: "Ada".into(),
            pile: PileView::Top("7♣".into()),
            deck_count: Some(40),
            round_ended: false,
            game_over: false,
            ready_players: vec![],
            log: vec![ActionLogEntry {
                player: "Bo".into(),
                score: 12,
                color: "#ffadad".into(),
                items: vec![LogItem {
                    kind: LogItemKind::Played,
                    cards: vec!["7♣".into()],
                }],
            }],
            lock: turn_lock::enforce("Ada", "Ada", false, Some(21)),
            round_summary: None,
            game_over_notice: None,
            selection: Selection::new(),
            room_code: Some("ROOM".into()),
        }
    }

    fn screen(state: &ViewState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 36)).unwrap();
        terminal.draw(|frame| render_frame(frame, state)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn view_state_default_is_lobby() {
        let state = ViewState::new(Some("ROOM".into()));
        assert!(state.table.is_none());
        assert_eq!(state.room_code(), Some("ROOM"));
        assert_eq!(state.cursor, 0);
        assert!(!state.confirm_quit);
        assert!(state.ended.is_none());
    }

    #[test]
    fn view_update_clamps_cursor() {
        let mut state = ViewState::new(None);
        state.cursor = 9;
        apply_ui_update(&mut state, UiUpdate::View(Box::new(sample_view())));
        assert_eq!(state.cursor, 3);

        let mut shorter = sample_view();
        shorter.viewer.hand.truncate(1);
        apply_ui_update(&mut state, UiUpdate::View(Box::new(shorter)));
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn notices_and_lobby_updates() {
        let mut state = ViewState::new(None);
        apply_ui_update(&mut state, UiUpdate::Notice("Invalid move.".into()));
        assert_eq!(state.notice.as_deref(), Some("Invalid move."));

        apply_ui_update(
            &mut state,
            UiUpdate::Lobby {
                ready: true,
                started: false,
            },
        );
        assert!(state.lobby.ready);
        assert!(!state.lobby.started);
    }

    #[test]
    fn session_end_is_recorded() {
        let mut state = ViewState::new(None);
        apply_ui_update(&mut state, UiUpdate::SessionEnded(SessionEnd::RoomClosed));
        assert_eq!(state.ended, Some(SessionEnd::RoomClosed));
    }

    #[test]
    fn frame_shows_lobby_before_first_view() {
        let state = ViewState::new(Some("ROOM".into()));
        let screen = screen(&state);
        assert!(screen.contains("Waiting for the game to start"));
        assert!(screen.contains("Room ROOM"));
    }

    #[test]
    fn frame_shows_table_hand_and_log() {
        let mut state = ViewState::new(None);
        apply_ui_update(&mut state, UiUpdate::View(Box::new(sample_view())));
        let screen = screen(&state);
        assert!(screen.contains("Action Log"));
        assert!(screen.contains("[K♦]"));
        assert!(screen.contains("Bo"));
        assert!(screen.contains("Value 21"));
    }

    #[test]
    fn frame_overlays_round_summary() {
        let mut view = sample_view();
        view.round_ended = true;
        view.round_summary = Some(RoundSummary {
            html: "<p>Ada takes the round</p>".into(),
            viewer_ready: false,
            game_over: false,
        });
        let mut state = ViewState::new(None);
        state.table = Some(view);
        let screen = screen(&state);
        assert!(screen.contains("Ada takes the round"));
        assert!(screen.contains("I'm Ready"));
        assert_eq!(help_text(&state), " r:Toggle ready | Q:Quit game | q:Exit");
    }

    #[test]
    fn help_follows_focus() {
        let mut state = ViewState::new(None);
        assert!(help_text(&state).starts_with(" l:Lobby ready"));
        state.table = Some(sample_view());
        assert!(help_text(&state).contains("Enter:Play"));
        state.confirm_quit = true;
        assert!(help_text(&state).starts_with(" y:Close room"));
    }
}
