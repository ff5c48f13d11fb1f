// View model: everything a renderer needs for one frame of the table.
//
// Built by the reconciler; renderers only read it.

use serde::Serialize;

use crate::action_log::ActionLogEntry;
use crate::card::CardCode;
use crate::popup::RoundSummary;
use crate::selection::Selection;
use crate::turn_lock::TurnLock;

/// Where an opponent sits around the table, in rotated order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Seat {
    Left,
    Right,
    Top,
}

impl Seat {
    pub const ORDER: [Seat; 3] = [Seat::Left, Seat::Right, Seat::Top];

    pub fn for_index(idx: usize) -> Option<Seat> {
        Self::ORDER.get(idx).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewerView {
    pub name: String,
    pub hand: Vec<CardCode>,
    pub hand_value: Option<u32>,
    pub score: i64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpponentView {
    pub name: String,
    pub card_count: usize,
    pub score: i64,
    pub color: String,
    /// `None` for opponents past the third; they are not drawn at the table.
    pub seat: Option<Seat>,
    pub is_current: bool,
}

/// What the discard pile shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "cards", rename_all = "snake_case")]
pub enum PileView {
    /// The cards from the most recent play, fanned out.
    Played(Vec<CardCode>),
    /// Nothing played yet this round; the authority's top card.
    Top(CardCode),
    FaceDown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    pub viewer: ViewerView,
    /// Rotated so the player after the viewer comes first.
    pub opponents: Vec<OpponentView>,
    pub current_player: String,
    pub pile: PileView,
    pub deck_count: Option<u32>,
    pub round_ended: bool,
    pub game_over: bool,
    pub ready_players: Vec<String>,
    /// Newest first.
    pub log: Vec<ActionLogEntry>,
    pub lock: TurnLock,
    pub round_summary: Option<RoundSummary>,
    pub game_over_notice: Option<String>,
    pub selection: Selection,
    pub room_code: Option<String>,
}

impl ViewModel {
    /// Text for the turn indicator.
    pub fn turn_label(&self) -> String {
        format!("Turn: {}", self.current_player)
    }

    pub fn opponent_at(&self, seat: Seat) -> Option<&OpponentView> {
        self.opponents.iter().find(|o| o.seat == Some(seat))
    }
}
