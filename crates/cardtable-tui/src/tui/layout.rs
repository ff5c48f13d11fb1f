// Screen layout: panel arrangement and sizing.
//
// +--------------------------------------------------+
// | Status Bar (1 row)                                |
// +-----------------------------------+--------------+
// | Table (70%)                        | Action Log   |
// |   top seat                         | (30%)        |
// |   left seat | pile / deck | right  |              |
// +-----------------------------------+--------------+
// | Hand (6 rows)                                     |
// +--------------------------------------------------+
// | Help Bar (1 row)                                  |
// +--------------------------------------------------+

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Resolved screen areas for each zone.
#[derive(Debug, Clone)]
pub struct AppLayout {
    /// Room, turn indicator and notices.
    pub status_bar: Rect,
    /// Opponent seats around the pile and deck.
    pub table: Rect,
    pub action_log: Rect,
    /// The viewer's cards.
    pub hand: Rect,
    pub help_bar: Rect,
}

/// Areas inside the table zone.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub top: Rect,
    pub left: Rect,
    pub center: Rect,
    pub right: Rect,
    /// Players beyond the three named seats.
    pub overflow: Rect,
}

pub fn build_layout(area: Rect) -> AppLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Min(10),   // table + log
            Constraint::Length(6), // hand
            Constraint::Length(1), // help bar
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(vertical[1]);

    AppLayout {
        status_bar: vertical[0],
        table: horizontal[0],
        action_log: horizontal[1],
        hand: vertical[2],
        help_bar: vertical[3],
    }
}

/// Split the table zone into seats. The top seat sits above the pile, the
/// left and right seats flank it.
pub fn build_table_layout(area: Rect) -> TableLayout {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(area);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(50),
            Constraint::Percentage(25),
        ])
        .split(rows[1]);

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(50),
            Constraint::Percentage(25),
        ])
        .split(rows[0])[1];

    TableLayout {
        top,
        left: middle[0],
        center: middle[1],
        right: middle[2],
        overflow: rows[2],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
