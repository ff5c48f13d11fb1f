// Action log: the capped, deduplicated history of recent turns.
//
// The authority only reports the most recent action, so history is rebuilt
// client-side: every time a new action identity appears, one entry is
// appended. Entries are stored oldest-to-newest and shown newest-first.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::card::CardCode;
use crate::protocol::{ActionId, DrawSource, LastAction, Snapshot};

/// Maximum number of entries kept; older entries are evicted first.
pub const LOG_CAPACITY: usize = 5;

/// Display colors assigned by seat order.
pub const PLAYER_COLORS: [&str; 5] = ["#8fd4ff", "#ffadad", "#ffe083", "#afffaf", "#d1aaff"];

/// Color used for an actor who is no longer in the player list.
pub const UNSEATED_COLOR: &str = "#cccccc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogItemKind {
    Played,
    Drew,
}

impl LogItemKind {
    pub fn label(self) -> &'static str {
        match self {
            LogItemKind::Played => "played",
            LogItemKind::Drew => "drew",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogItem {
    #[serde(rename = "type")]
    pub kind: LogItemKind,
    pub cards: Vec<CardCode>,
}

/// One observed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub player: String,
    /// The actor's score at the time the action was observed.
    pub score: i64,
    pub color: String,
    pub items: Vec<LogItem>,
}

impl ActionLogEntry {
    /// Build the entry for `action` as seen by `viewer`.
    ///
    /// Pile draws are public. Deck draws show the real card only to the
    /// player who drew it; everyone else sees the concealment marker.
    pub fn from_action(action: &LastAction, snapshot: &Snapshot, viewer: &str) -> Self {
        let mut items = Vec::new();

        if !action.played.is_empty() {
            items.push(LogItem {
                kind: LogItemKind::Played,
                cards: action.played.clone(),
            });
        }

        match action.draw_source {
            Some(DrawSource::Pile) => items.push(LogItem {
                kind: LogItemKind::Drew,
                cards: vec![drawn_or_concealed(action)],
            }),
            Some(DrawSource::Deck) => {
                let card = if action.player == viewer {
                    drawn_or_concealed(action)
                } else {
                    CardCode::concealed()
                };
                items.push(LogItem {
                    kind: LogItemKind::Drew,
                    cards: vec![card],
                });
            }
            None => {}
        }

        ActionLogEntry {
            player: action.player.clone(),
            score: snapshot.score_of(&action.player),
            color: player_color(snapshot, &action.player).to_string(),
            items,
        }
    }
}

/// A missing drawn card is rendered as hidden rather than dropped.
fn drawn_or_concealed(action: &LastAction) -> CardCode {
    action
        .drawn_card
        .clone()
        .unwrap_or_else(CardCode::concealed)
}

/// Deterministic color from the player's position in the snapshot.
pub fn player_color(snapshot: &Snapshot, name: &str) -> &'static str {
    snapshot
        .players
        .iter()
        .position(|p| p.name == name)
        .map(|idx| PLAYER_COLORS[idx % PLAYER_COLORS.len()])
        .unwrap_or(UNSEATED_COLOR)
}

// ---------------------------------------------------------------------------
// ActionLog
// ---------------------------------------------------------------------------

/// The persisted log plus the identity of the last action it recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionLog {
    entries: VecDeque<ActionLogEntry>,
    last_action_id: Option<ActionId>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted parts, enforcing the capacity.
    pub fn restore(entries: Vec<ActionLogEntry>, last_action_id: Option<ActionId>) -> Self {
        let mut log = ActionLog {
            entries: entries.into(),
            last_action_id,
        };
        log.evict();
        log
    }

    /// Append `entry` unless `id` matches the last recorded action.
    /// Returns whether the log changed.
    pub fn record(&mut self, id: ActionId, entry: ActionLogEntry) -> bool {
        if self.last_action_id.as_ref() == Some(&id) {
            return false;
        }
        self.last_action_id = Some(id);
        self.entries.push_back(entry);
        self.evict();
        true
    }

    /// Drop every entry and forget the dedup identity.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_action_id = None;
    }

    pub fn is_seen(&self, id: &ActionId) -> bool {
        self.last_action_id.as_ref() == Some(id)
    }

    pub fn last_action_id(&self) -> Option<&ActionId> {
        self.last_action_id.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries oldest first (storage order).
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &ActionLogEntry> {
        self.entries.iter()
    }

    /// Entries newest first (display order).
    pub fn newest_first(&self) -> Vec<ActionLogEntry> {
        self.entries.iter().rev().cloned().collect()
    }

    fn evict(&mut self) {
        while self.entries.len() > LOG_CAPACITY {
            self.entries.pop_front();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
