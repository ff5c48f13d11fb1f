// Hand widget: the viewer's cards with cursor and selection order.
//
// Selected cards carry their 1-based play order above them; the cursor card
// is drawn reversed.

use cardtable_core::view::ViewModel;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use ratatui::Frame;

use super::cards::{card_color, card_label};
use super::hex_color;

pub fn render(frame: &mut Frame, area: Rect, view: &ViewModel, cursor: usize) {
    let viewer = &view.viewer;
    let color = hex_color(&viewer.color);

    let value = viewer
        .hand_value
        .map(|v| format!(" | Value {v}"))
        .unwrap_or_default();
    let title = Span::styled(
        format!(" {} | Score {}{value} ", viewer.name, viewer.score),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    );

    let border_type = if view.lock.is_your_turn {
        BorderType::Thick
    } else {
        BorderType::Plain
    };

    let (order_line, card_line) = card_rows(view, cursor);
    let lines = vec![order_line, card_line, Line::raw(""), hint_line(view)];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(border_type)
            .border_style(Style::default().fg(color))
            .title(title),
    );
    frame.render_widget(paragraph, area);
}

/// The selection-order badges and the cards themselves, column-aligned.
pub fn card_rows(view: &ViewModel, cursor: usize) -> (Line<'static>, Line<'static>) {
    let mut badges = vec![Span::raw(" ")];
    let mut cards = vec![Span::raw(" ")];

    for (i, card) in view.viewer.hand.iter().enumerate() {
        let label = format!("[{}]", card_label(card));
        let width = label.chars().count();
        let position = view.selection.position_of(i);

        let badge = position.map(|p| p.to_string()).unwrap_or_default();
        badges.push(Span::styled(
            format!("{badge:^width$} "),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));

        let mut style = Style::default().fg(card_color(card));
        if position.is_some() {
            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        }
        if i == cursor {
            style = style.add_modifier(Modifier::REVERSED);
        }
        cards.push(Span::styled(label, style));
        cards.push(Span::raw(" "));
    }

    (badges.into(), cards.into())
}

fn hint_line(view: &ViewModel) -> Line<'static> {
    let dim = Style::default().fg(Color::Gray);
    if view.round_ended {
        return Line::from(Span::styled(" Round over.", dim));
    }
    if !view.lock.is_your_turn {
        return Line::from(Span::styled(
            format!(" Waiting for {}.", view.current_player),
            dim,
        ));
    }

    let draw = match view.selection.draw_source() {
        Some(source) => Span::styled(
            format!(" Draw from {source}."),
            Style::default().fg(Color::Yellow),
        ),
        None => Span::styled(" Choose draw source (d/p).", dim),
    };
    let end = if view.lock.can_end_round {
        Span::styled("  End round available (e).", Style::default().fg(Color::Green))
    } else {
        Span::raw("")
    };
    Line::from(vec![Span::styled(" Your turn.", Style::default().fg(Color::Green)), draw, end])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
