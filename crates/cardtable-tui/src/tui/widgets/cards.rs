// Card rendering helpers shared by the hand, table and log widgets.

use cardtable_core::card::{CardCode, CardFace};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;

/// Short label for a card, e.g. `10♥`, `JK`, or `??` for a face-down card.
pub fn card_label(card: &CardCode) -> String {
    match card.face() {
        CardFace::FaceDown => "??".to_string(),
        CardFace::Joker { .. } => "JK".to_string(),
        CardFace::Standard { .. } | CardFace::Unknown(_) => card.as_str().to_string(),
    }
}

pub fn card_color(card: &CardCode) -> Color {
    match card.face() {
        CardFace::Standard { suit, .. } if suit.is_red() => Color::LightRed,
        CardFace::Standard { .. } => Color::White,
        CardFace::Joker { .. } => Color::Magenta,
        CardFace::FaceDown | CardFace::Unknown(_) => Color::DarkGray,
    }
}

/// A bracketed card, e.g. `[K♦]`.
pub fn card_span(card: &CardCode) -> Span<'static> {
    Span::styled(
        format!("[{}]", card_label(card)),
        Style::default().fg(card_color(card)),
    )
}

/// Card spans separated by spaces.
pub fn card_spans(cards: &[CardCode]) -> Vec<Span<'static>> {
    let mut spans = Vec::with_capacity(cards.len() * 2);
    for (i, card) in cards.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        spans.push(card_span(card));
    }
    spans
}

/// A row of face-down card backs, capped so large hands stay on one line.
pub fn card_backs(count: usize) -> Span<'static> {
    const MAX_SHOWN: usize = 8;
    let shown = "▮".repeat(count.min(MAX_SHOWN));
    let text = if count > MAX_SHOWN {
        format!("{shown}+{}", count - MAX_SHOWN)
    } else {
        shown
    };
    Span::styled(
        text,
        Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(card_label(&"10♥".into()), "10♥");
        assert_eq!(card_label(&CardCode::concealed()), "??");
        assert_eq!(card_label(&"JOKER♥".into()), "JK");
    }

    #[test]
    fn red_suits_are_red() {
        assert_eq!(card_color(&"5♥".into()), Color::LightRed);
        assert_eq!(card_color(&"5♦".into()), Color::LightRed);
        assert_eq!(card_color(&"5♠".into()), Color::White);
        assert_eq!(card_color(&CardCode::concealed()), Color::DarkGray);
    }

    #[test]
    fn spans_are_separated() {
        let spans = card_spans(&["A♠".into(), "2♣".into()]);
        let text: String = spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "[A♠] [2♣]");
    }

    #[test]
    fn backs_cap_long_hands() {
        assert_eq!(card_backs(3).content, "▮▮▮");
        assert_eq!(card_backs(10).content, "▮▮▮▮▮▮▮▮+2");
    }
}
