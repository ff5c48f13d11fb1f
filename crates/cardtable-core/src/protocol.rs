// Wire types exchanged with the authority.
//
// Field names follow the authority's JSON: the snapshot itself is camelCase,
// while the nested player and last-action records use snake_case keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::card::CardCode;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One full poll response describing the table. Superseded wholesale by the
/// next poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub players: Vec<Player>,
    pub current_player: String,
    /// Top card of the discard pile; `None` or a face-down code when empty.
    #[serde(default)]
    pub pile_top: Option<CardCode>,
    /// Cards left in the draw deck, when the authority reports it.
    #[serde(default)]
    pub deck_count: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub round_ended: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ready_players: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub game_over: bool,
    /// HTML fragment summarising the finished round.
    #[serde(default)]
    pub round_summary_popup: Option<String>,
    /// HTML fragment announcing the winners; sent once per viewer.
    #[serde(default)]
    pub game_over_notice: Option<String>,
    #[serde(default)]
    pub last_action: Option<LastAction>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scores: BTreeMap<String, i64>,
}

impl Snapshot {
    /// The round summary fragment, treating an empty string as absent.
    pub fn round_summary(&self) -> Option<&str> {
        self.round_summary_popup
            .as_deref()
            .filter(|html| !html.trim().is_empty())
    }

    /// The game-over notice fragment, treating an empty string as absent.
    pub fn game_over_notice(&self) -> Option<&str> {
        self.game_over_notice
            .as_deref()
            .filter(|html| !html.trim().is_empty())
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    /// Score for `name`: the player's own score field first, then the
    /// scores table, then zero.
    pub fn score_of(&self, name: &str) -> i64 {
        self.player(name)
            .and_then(|p| p.score)
            .or_else(|| self.scores.get(name).copied())
            .unwrap_or(0)
    }
}

/// A seat at the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub hand: Hand,
    /// Server-computed total of the viewer's hand; absent for opponents.
    #[serde(default)]
    pub hand_value: Option<u32>,
    #[serde(default)]
    pub score: Option<i64>,
}

/// A hand is either concealed (opponents: only the count is known) or
/// revealed (the viewer). Which form is present identifies the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Hand {
    Concealed(u32),
    Revealed(Vec<CardCode>),
}

impl Hand {
    pub fn len(&self) -> usize {
        match self {
            Hand::Concealed(count) => *count as usize,
            Hand::Revealed(cards) => cards.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cards(&self) -> Option<&[CardCode]> {
        match self {
            Hand::Concealed(_) => None,
            Hand::Revealed(cards) => Some(cards),
        }
    }
}

// ---------------------------------------------------------------------------
// Last action
// ---------------------------------------------------------------------------

/// Where a player takes their replacement card from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawSource {
    Pile,
    Deck,
}

impl DrawSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DrawSource::Pile => "pile",
            DrawSource::Deck => "deck",
        }
    }
}

impl fmt::Display for DrawSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authority's record of the most recently completed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastAction {
    pub player: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub played: Vec<CardCode>,
    #[serde(default)]
    pub draw_source: Option<DrawSource>,
    /// Revealed only to the drawing player for deck draws.
    #[serde(default)]
    pub drawn_card: Option<CardCode>,
}

/// Stable identity of a [`LastAction`], used to deduplicate log entries
/// across polls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Canonical serialization of the action. `serde_json::Value` objects
    /// keep their keys sorted, so the result does not depend on the order
    /// fields arrived in.
    pub fn of(action: &LastAction) -> Self {
        let canonical = serde_json::json!({
            "player": action.player,
            "played": action.played,
            "draw_source": action.draw_source,
            "drawn_card": action.drawn_card,
        });
        ActionId(canonical.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Responses and requests
// ---------------------------------------------------------------------------

/// Body of `GET /state`: either a snapshot or an error marker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StateResponse {
    Error { error: String },
    Snapshot(Box<Snapshot>),
}

/// Error strings that mean the session or room is gone for good.
pub const ROOM_CLOSED: &str = "Room closed";
pub const INVALID_SESSION: &str = "Invalid session";

/// Body of `POST /play`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRequest {
    pub cards: Vec<CardCode>,
    pub draw: DrawSource,
}

/// Body of `POST /ready-next-round`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ready: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub all_ready: bool,
}

impl ReadyResponse {
    pub fn includes(&self, name: &str) -> bool {
        self.ready.iter().any(|n| n == name)
    }
}

/// Body of `POST /toggle-ready/{room}` in the lobby, before a game exists.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LobbyReadyResponse {
    /// Everyone was ready; the game has been dealt.
    Started { status: String },
    /// The viewer's new lobby readiness.
    Toggled { ready: bool },
}

/// Generic `{ "error": "..." }` body returned by rejected intents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Deserialize `null` the same way as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_state_json() -> serde_json::Value {
        json!({
            "players": [
                {"name": "A", "hand": ["A♠", "10♦", "JOKER♥"], "hand_value": 11, "score": 12},
                {"name": "B", "hand": 5, "hand_value": null, "score": 30}
            ],
            "pileTop": "K♣",
            "deckCount": 31,
            "currentPlayer": "A",
            "lastAction": {
                "player": "B",
                "played": ["3♠"],
                "drawn_card": null,
                "draw_source": "deck"
            },
            "scores": {"A": 12, "B": 30},
            "roundEnded": false,
            "readyPlayers": [],
            "roundSummaryPopup": "",
            "gameOver": false,
            "gameOverNotice": null
        })
    }

    #[test]
    fn parses_full_snapshot() {
        let resp: StateResponse = serde_json::from_value(sample_state_json()).unwrap();
        let StateResponse::Snapshot(snap) = resp else {
            panic!("expected snapshot");
        };
        assert_eq!(snap.players.len(), 2);
        assert_eq!(
            snap.players[0].hand,
            Hand::Revealed(vec!["A♠".into(), "10♦".into(), "JOKER♥".into()])
        );
        assert_eq!(snap.players[1].hand, Hand::Concealed(5));
        assert_eq!(snap.players[0].hand_value, Some(11));
        assert_eq!(snap.players[1].hand_value, None);
        assert_eq!(snap.deck_count, Some(31));
        assert_eq!(snap.current_player, "A");
        let action = snap.last_action.as_ref().unwrap();
        assert_eq!(action.draw_source, Some(DrawSource::Deck));
        assert!(action.drawn_card.is_none());
        assert_eq!(snap.round_summary(), None);
        assert_eq!(snap.game_over_notice(), None);
    }

    #[test]
    fn parses_error_body() {
        let resp: StateResponse = serde_json::from_value(json!({"error": "Room closed"})).unwrap();
        assert_eq!(
            resp,
            StateResponse::Error {
                error: ROOM_CLOSED.to_string()
            }
        );
    }

    #[test]
    fn tolerates_minimal_snapshot() {
        let resp: StateResponse = serde_json::from_value(json!({
            "players": [{"name": "A", "hand": []}],
            "currentPlayer": "A",
            "readyPlayers": null,
            "lastAction": null
        }))
        .unwrap();
        let StateResponse::Snapshot(snap) = resp else {
            panic!("expected snapshot");
        };
        assert!(!snap.round_ended);
        assert!(snap.ready_players.is_empty());
        assert!(snap.scores.is_empty());
        assert!(snap.last_action.is_none());
    }

    #[test]
    fn score_falls_back_to_scores_table() {
        let mut snap = match serde_json::from_value(sample_state_json()).unwrap() {
            StateResponse::Snapshot(s) => *s,
            StateResponse::Error { .. } => panic!("expected snapshot"),
        };
        assert_eq!(snap.score_of("B"), 30);
        snap.players[1].score = None;
        snap.scores.insert("B".into(), 44);
        assert_eq!(snap.score_of("B"), 44);
        assert_eq!(snap.score_of("nobody"), 0);
    }

    #[test]
    fn action_id_ignores_wire_field_order() {
        let a: LastAction = serde_json::from_str(
            r#"{"player":"A","played":["2♠"],"draw_source":"pile","drawn_card":"K♦"}"#,
        )
        .unwrap();
        let b: LastAction = serde_json::from_str(
            r#"{"drawn_card":"K♦","draw_source":"pile","played":["2♠"],"player":"A"}"#,
        )
        .unwrap();
        assert_eq!(ActionId::of(&a), ActionId::of(&b));
    }

    #[test]
    fn action_id_differs_on_any_field() {
        let base = LastAction {
            player: "A".into(),
            played: vec!["2♠".into()],
            draw_source: Some(DrawSource::Pile),
            drawn_card: Some("K♦".into()),
        };
        let mut other = base.clone();
        other.drawn_card = Some("Q♦".into());
        assert_ne!(ActionId::of(&base), ActionId::of(&other));
    }

    #[test]
    fn play_request_wire_shape() {
        let req = PlayRequest {
            cards: vec!["5♥".into(), "5♣".into()],
            draw: DrawSource::Pile,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"cards": ["5♥", "5♣"], "draw": "pile"})
        );
    }

    #[test]
    fn ready_response_membership() {
        let resp: ReadyResponse =
            serde_json::from_value(json!({"ready": ["A"], "all_ready": false, "scores": {}}))
                .unwrap();
        assert!(resp.includes("A"));
        assert!(!resp.includes("B"));
        assert!(!resp.all_ready);
    }

    #[test]
    fn lobby_ready_variants() {
        let started: LobbyReadyResponse =
            serde_json::from_value(json!({"status": "started"})).unwrap();
        assert!(matches!(started, LobbyReadyResponse::Started { .. }));
        let toggled: LobbyReadyResponse = serde_json::from_value(json!({"ready": true})).unwrap();
        assert_eq!(toggled, LobbyReadyResponse::Toggled { ready: true });
    }
}
