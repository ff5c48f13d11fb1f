// Table widget: opponent seats around the discard pile and deck.

use cardtable_core::protocol::DrawSource;
use cardtable_core::view::{OpponentView, PileView, Seat, ViewModel};
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use ratatui::Frame;

use super::cards::{card_backs, card_span, card_spans};
use super::hex_color;
use crate::tui::layout::build_table_layout;

pub fn render(frame: &mut Frame, area: Rect, view: &ViewModel) {
    let table = build_table_layout(area);

    for (seat, rect) in [
        (Seat::Top, table.top),
        (Seat::Left, table.left),
        (Seat::Right, table.right),
    ] {
        if let Some(opponent) = view.opponent_at(seat) {
            frame.render_widget(seat_panel(opponent), rect);
        }
    }

    frame.render_widget(center_panel(view), table.center);

    let unseated: Vec<&OpponentView> = view.opponents.iter().filter(|o| o.seat.is_none()).collect();
    if !unseated.is_empty() {
        frame.render_widget(Paragraph::new(overflow_line(&unseated)), table.overflow);
    }
}

fn seat_panel(opponent: &OpponentView) -> Paragraph<'static> {
    let color = hex_color(&opponent.color);
    let (border_type, border_style) = if opponent.is_current {
        (
            BorderType::Thick,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )
    } else {
        (BorderType::Plain, Style::default().fg(Color::DarkGray))
    };

    let title = Span::styled(
        format!(" {} ", opponent.name),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    );

    Paragraph::new(vec![
        Line::from(vec![
            card_backs(opponent.card_count),
            Span::raw(format!(" {} card(s)", opponent.card_count)),
        ]),
        Line::from(format!("Score {}", opponent.score)),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(border_type)
            .border_style(border_style)
            .title(title),
    )
}

fn center_panel(view: &ViewModel) -> Paragraph<'static> {
    let picked = view.selection.draw_source();
    let mut lines = vec![Line::raw("")];

    let mut pile = vec![source_label("Pile", picked == Some(DrawSource::Pile))];
    pile.extend(pile_spans(&view.pile));
    lines.push(Line::from(pile));

    let deck_count = view
        .deck_count
        .map(|n| format!(" ({n})"))
        .unwrap_or_default();
    lines.push(Line::from(vec![
        source_label("Deck", picked == Some(DrawSource::Deck)),
        card_backs(1),
        Span::raw(deck_count),
    ]));

    lines.push(Line::raw(""));
    if view.game_over {
        lines.push(status_line("Game over"));
    } else if view.round_ended {
        lines.push(status_line("Round over"));
    }

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(view.turn_label()))
}

/// The pile as cards: the last play fanned out, or just the top card.
pub fn pile_spans(pile: &PileView) -> Vec<Span<'static>> {
    match pile {
        PileView::Played(cards) => card_spans(cards),
        PileView::Top(card) => vec![card_span(card)],
        PileView::FaceDown => vec![card_backs(1)],
    }
}

fn source_label(name: &str, picked: bool) -> Span<'static> {
    if picked {
        Span::styled(
            format!("▶ {name}: "),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::raw(format!("  {name}: "))
    }
}

fn status_line(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ))
}

fn overflow_line(unseated: &[&OpponentView]) -> Line<'static> {
    let mut spans = vec![Span::styled(" Also seated: ", Style::default().fg(Color::Gray))];
    for (i, opponent) in unseated.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(", "));
        }
        spans.push(Span::styled(
            opponent.name.clone(),
            Style::default().fg(hex_color(&opponent.color)),
        ));
        spans.push(Span::raw(format!(
            " ({} cards, {})",
            opponent.card_count, opponent.score
        )));
    }
    spans.into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
