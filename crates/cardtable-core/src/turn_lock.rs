// Turn lock: which table interactions are enabled for the viewer.
//
// Purely a UI convenience. The authority validates every intent anyway.

use serde::Serialize;

/// Largest server-computed hand value that still allows ending the round.
pub const END_ROUND_HAND_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TurnLock {
    pub is_your_turn: bool,
    pub can_play: bool,
    pub can_end_round: bool,
    /// Clicking the deck or pile to choose a draw source.
    pub can_pick_draw_source: bool,
    /// Selecting hand cards. Stays enabled after the round ends so the
    /// viewer can still inspect and reorder cards.
    pub can_select_cards: bool,
}

/// Compute the lock from the viewer's name, the player to move, the
/// round-ended flag and the server-provided hand value.
pub fn enforce(
    viewer: &str,
    current_player: &str,
    round_ended: bool,
    hand_value: Option<u32>,
) -> TurnLock {
    let is_your_turn = viewer == current_player;
    let hand_small_enough = hand_value.is_none_or(|v| v <= END_ROUND_HAND_LIMIT);

    TurnLock {
        is_your_turn,
        can_play: is_your_turn && !round_ended,
        can_end_round: round_ended || (is_your_turn && hand_small_enough),
        can_pick_draw_source: is_your_turn && !round_ended,
        can_select_cards: is_your_turn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_players_turn_disables_play_and_draw() {
        for round_ended in [false, true] {
            let lock = enforce("A", "B", round_ended, Some(3));
            assert!(!lock.is_your_turn);
            assert!(!lock.can_play);
            assert!(!lock.can_pick_draw_source);
            assert!(!lock.can_select_cards);
        }
    }

    #[test]
    fn hand_value_above_limit_blocks_end_round() {
        let lock = enforce("A", "A", false, Some(6));
        assert!(lock.can_play);
        assert!(!lock.can_end_round);
    }

    #[test]
    fn hand_value_at_limit_allows_end_round() {
        let lock = enforce("A", "A", false, Some(5));
        assert!(lock.can_end_round);
    }

    #[test]
    fn unknown_hand_value_does_not_block() {
        let lock = enforce("A", "A", false, None);
        assert!(lock.can_end_round);
    }

    #[test]
    fn round_end_always_allows_acknowledging() {
        let lock = enforce("A", "B", true, Some(40));
        assert!(lock.can_end_round);
    }

    #[test]
    fn round_end_keeps_card_selection_but_not_draws() {
        let lock = enforce("A", "A", true, Some(2));
        assert!(!lock.can_play);
        assert!(!lock.can_pick_draw_source);
        assert!(lock.can_select_cards);
    }
}
