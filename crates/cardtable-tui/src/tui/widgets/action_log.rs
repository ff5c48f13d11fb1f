// Action log widget: the most recent turns, newest first.
//
// Each entry: "{player} ({score}) played [9♥] [9♣], drew [??]" in the
// player's seat color.

use cardtable_core::action_log::ActionLogEntry;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use ratatui::Frame;

use super::cards::card_spans;
use super::hex_color;

/// Render the log. `entries` are expected newest first.
pub fn render(frame: &mut Frame, area: Rect, entries: &[ActionLogEntry]) {
    let block = Block::default().borders(Borders::ALL).title("Action Log");

    if entries.is_empty() {
        let paragraph = Paragraph::new("  No actions yet.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = entries
        .iter()
        .map(|entry| ListItem::new(vec![entry_line(entry), Line::raw("")]))
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

pub fn entry_line(entry: &ActionLogEntry) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            entry.player.clone(),
            Style::default()
                .fg(hex_color(&entry.color))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" ({})", entry.score),
            Style::default().fg(Color::Gray),
        ),
    ];

    for (i, item) in entry.items.iter().enumerate() {
        let sep = if i == 0 { " " } else { ", " };
        spans.push(Span::raw(format!("{sep}{} ", item.kind.label())));
        spans.extend(card_spans(&item.cards));
    }

    if entry.items.is_empty() {
        spans.push(Span::styled(
            " passed",
            Style::default().fg(Color::DarkGray),
        ));
    }

    spans.into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
