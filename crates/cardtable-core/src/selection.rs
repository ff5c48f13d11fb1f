// Selection: the cards and draw source picked for the next move.
//
// Lives for a single move and is never persisted. Indices refer to positions
// in the viewer's hand; their order is the order cards will be played in.

use serde::Serialize;

use crate::card::CardCode;
use crate::error::{Precondition, SyncError};
use crate::protocol::{DrawSource, PlayRequest};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    order: Vec<usize>,
    draw_source: Option<DrawSource>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `index` at the end of the play order, or remove it if already
    /// selected (the remaining cards keep their relative order).
    pub fn toggle_card(&mut self, index: usize) {
        if let Some(pos) = self.order.iter().position(|&i| i == index) {
            self.order.remove(pos);
        } else {
            self.order.push(index);
        }
    }

    /// Choose `source`, or deselect it if it is already chosen.
    pub fn toggle_draw_source(&mut self, source: DrawSource) {
        self.draw_source = if self.draw_source == Some(source) {
            None
        } else {
            Some(source)
        };
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.draw_source = None;
    }

    /// Drop indices that no longer point into a hand of `hand_len` cards.
    pub fn retain_within(&mut self, hand_len: usize) {
        self.order.retain(|&i| i < hand_len);
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn draw_source(&self) -> Option<DrawSource> {
        self.draw_source
    }

    /// 1-based play position of `index`, if selected.
    pub fn position_of(&self, index: usize) -> Option<usize> {
        self.order.iter().position(|&i| i == index).map(|p| p + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty() && self.draw_source.is_none()
    }

    /// Build the play payload against the viewer's current hand.
    ///
    /// The draw source is checked before the cards, matching the prompt
    /// order players see.
    pub fn build_play_request(&self, hand: &[CardCode]) -> Result<PlayRequest, SyncError> {
        let draw = self
            .draw_source
            .ok_or(SyncError::LocalPrecondition(Precondition::MissingDrawSource))?;

        let cards: Vec<CardCode> = self
            .order
            .iter()
            .filter_map(|&i| hand.get(i).cloned())
            .collect();
        if cards.is_empty() {
            return Err(SyncError::LocalPrecondition(Precondition::EmptySelection));
        }

        Ok(PlayRequest { cards, draw })
    }
}
