// Round summary overlay.
//
// Shown while the round is over. Carries the authority's summary text, who
// is ready, and the ready toggle label.

use cardtable_core::popup::RoundSummary;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use super::{centered_rect, html_to_text};

const DIALOG_WIDTH: u16 = 56;

pub fn render(frame: &mut Frame, area: Rect, summary: &RoundSummary, ready_players: &[String]) {
    let lines = summary_lines(summary, ready_players);
    let height = u16::try_from(lines.len()).unwrap_or(u16::MAX).saturating_add(2);
    let dialog_area = centered_rect(DIALOG_WIDTH, height, area);

    frame.render_widget(Clear, dialog_area);

    let title = if summary.game_over {
        " Game Over "
    } else {
        " Round Over "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, dialog_area);
}

pub fn summary_lines(summary: &RoundSummary, ready_players: &[String]) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = html_to_text(&summary.html)
        .lines()
        .map(|l| Line::raw(format!(" {l}")))
        .collect();

    lines.push(Line::raw(""));
    let ready = if ready_players.is_empty() {
        "nobody yet".to_string()
    } else {
        ready_players.join(", ")
    };
    lines.push(Line::from(Span::styled(
        format!(" Ready: {ready}"),
        Style::default().fg(Color::Gray),
    )));

    let button_style = if summary.viewer_ready {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    };
    lines.push(Line::from(vec![
        Span::styled(" r", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(": "),
        Span::styled(summary.ready_label(), button_style),
    ]));
    lines
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
