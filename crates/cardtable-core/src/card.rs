// Card codes: the compact tokens the authority uses for cards.
//
// The reconciler treats codes as opaque comparable values. `face()` is only
// used by renderers that need a rank/suit breakdown.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder the authority (and the action log) uses for a hidden card.
pub const CONCEALED: &str = "🂠";

/// Prefix shared by both joker codes (`JOKER♠`, `JOKER♥`).
const JOKER_PREFIX: &str = "JOKER";

/// An opaque card token such as `"10♦"`, `"K♣"` or `"JOKER♥"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardCode(String);

impl CardCode {
    pub fn new(code: impl Into<String>) -> Self {
        CardCode(code.into())
    }

    /// The concealment marker shown in place of a hidden card.
    pub fn concealed() -> Self {
        CardCode(CONCEALED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the concealment marker and for the empty code the authority
    /// sends when the pile is face-down.
    pub fn is_face_down(&self) -> bool {
        self.0.is_empty() || self.0 == CONCEALED
    }

    /// Break the code into its visual parts.
    pub fn face(&self) -> CardFace {
        if self.is_face_down() {
            return CardFace::FaceDown;
        }
        if let Some(variant) = self.0.strip_prefix(JOKER_PREFIX) {
            return CardFace::Joker {
                variant: variant.to_string(),
            };
        }

        // Suit is always the final character; everything before it is the
        // rank, which covers the two-character "10".
        let mut chars = self.0.chars();
        let Some(suit_char) = chars.next_back() else {
            return CardFace::Unknown(self.0.clone());
        };
        let rank = chars.as_str();
        match (Rank::parse(rank), Suit::from_char(suit_char)) {
            (Some(rank), Some(suit)) => CardFace::Standard { rank, suit },
            _ => CardFace::Unknown(self.0.clone()),
        }
    }
}

impl fmt::Display for CardCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardCode {
    fn from(s: &str) -> Self {
        CardCode(s.to_string())
    }
}

/// The visual breakdown of a card code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardFace {
    Standard { rank: Rank, suit: Suit },
    Joker { variant: String },
    FaceDown,
    /// A code this client does not recognise; rendered verbatim.
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

impl Rank {
    fn parse(s: &str) -> Option<Self> {
        let rank = match s {
            "A" => Rank::Ace,
            "2" => Rank::Two,
            "3" => Rank::Three,
            "4" => Rank::Four,
            "5" => Rank::Five,
            "6" => Rank::Six,
            "7" => Rank::Seven,
            "8" => Rank::Eight,
            "9" => Rank::Nine,
            "10" => Rank::Ten,
            "J" => Rank::Jack,
            "Q" => Rank::Queen,
            "K" => Rank::King,
            _ => return None,
        };
        Some(rank)
    }

    /// Long display name ("Ace", "10", "Queen").
    pub fn name(self) -> &'static str {
        match self {
            Rank::Ace => "Ace",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "Jack",
            Rank::Queen => "Queen",
            Rank::King => "King",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Suit {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '♠' => Some(Suit::Spades),
            '♥' => Some(Suit::Hearts),
            '♦' => Some(Suit::Diamonds),
            '♣' => Some(Suit::Clubs),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Suit::Spades => "Spades",
            Suit::Hearts => "Hearts",
            Suit::Diamonds => "Diamonds",
            Suit::Clubs => "Clubs",
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Suit::Spades => '♠',
            Suit::Hearts => '♥',
            Suit::Diamonds => '♦',
            Suit::Clubs => '♣',
        }
    }

    pub fn is_red(self) -> bool {
        matches!(self, Suit::Hearts | Suit::Diamonds)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
