// Status bar widget: room, turn indicator, deck size and the latest notice.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let paragraph = Paragraph::new(status_line(state)).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

pub fn status_line(state: &ViewState) -> Line<'static> {
    let sep = || Span::styled(" | ", Style::default().fg(Color::Gray));
    let mut spans = Vec::new();

    let room = state
        .room_code()
        .map(|r| format!(" Room {r}"))
        .unwrap_or_else(|| " No room".to_string());
    spans.push(Span::styled(room, Style::default().fg(Color::White)));

    match &state.table {
        Some(view) => {
            spans.push(sep());
            let turn_style = if view.lock.is_your_turn {
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            let turn = if view.lock.is_your_turn {
                "Your turn".to_string()
            } else {
                view.turn_label()
            };
            spans.push(Span::styled(turn, turn_style));

            if let Some(count) = view.deck_count {
                spans.push(sep());
                spans.push(Span::raw(format!("Deck {count}")));
            }
        }
        None => {
            spans.push(sep());
            let lobby = if state.lobby.ready {
                "Waiting for the game to start (you are ready)"
            } else {
                "Waiting for the game to start"
            };
            spans.push(Span::styled(lobby, Style::default().fg(Color::Gray)));
        }
    }

    if let Some(notice) = &state.notice {
        spans.push(sep());
        spans.push(Span::styled(
            notice.clone(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }

    spans.into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
