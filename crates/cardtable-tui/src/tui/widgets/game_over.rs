// Game-over notice overlay. Stays up until the player acknowledges it.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use super::{centered_rect, html_to_text};

const DIALOG_WIDTH: u16 = 48;

pub fn render(frame: &mut Frame, area: Rect, notice_html: &str) {
    let mut lines: Vec<Line> = html_to_text(notice_html)
        .lines()
        .map(|l| Line::raw(format!(" {l}")))
        .collect();
    lines.push(Line::raw(""));
    lines.push(Line::from(vec![
        Span::styled(" o", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(": OK"),
    ]));

    let height = u16::try_from(lines.len()).unwrap_or(u16::MAX).saturating_add(2);
    let dialog_area = centered_rect(DIALOG_WIDTH, height, area);
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(Span::styled(
            " Game Over ",
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ));

    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .style(Style::default().bg(Color::Black)),
        dialog_area,
    );
}
