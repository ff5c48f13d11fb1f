// TUI widget modules for each table panel, plus the small helpers they share.

pub mod action_log;
pub mod cards;
pub mod game_over;
pub mod hand;
pub mod quit_confirm;
pub mod round_summary;
pub mod status_bar;
pub mod table;

use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::Color;

/// Parse a `#rrggbb` player color, falling back to gray.
pub fn hex_color(hex: &str) -> Color {
    hex.parse::<Color>().unwrap_or(Color::Gray)
}

/// Compute a centered rectangle of the given size within `area`, clamped to
/// the available space.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::vertical([Constraint::Length(height.min(area.height))])
        .flex(Flex::Center)
        .split(area);

    Layout::horizontal([Constraint::Length(width.min(area.width))])
        .flex(Flex::Center)
        .split(vertical[0])[0]
}

/// Flatten the authority's popup markup into plain lines.
///
/// Block-level closing tags and `<br>` become line breaks, every other tag
/// is dropped, and the handful of entities the authority emits are decoded.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('>') else {
            // Unterminated tag: keep the text as-is.
            out.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let tag = rest[open + 1..open + close].trim().to_ascii_lowercase();
        if breaks_line(&tag) && !out.ends_with('\n') && !out.is_empty() {
            out.push('\n');
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn breaks_line(tag: &str) -> bool {
    let name = tag
        .trim_end_matches('/')
        .split_whitespace()
        .next()
        .unwrap_or("");
    matches!(
        name,
        "br" | "/p" | "/div" | "/li" | "/tr" | "/h1" | "/h2" | "/h3" | "/h4" | "/table" | "/ul"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
