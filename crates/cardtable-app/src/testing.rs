// Scripted in-process authority, used by unit and integration tests.
//
// Responses are queued per endpoint. When the state queue runs dry the last
// state is repeated, which models a table where nothing is happening.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use cardtable_core::card::CardCode;
use cardtable_core::protocol::{
    Hand, LobbyReadyResponse, PlayRequest, Player, ReadyResponse, Snapshot, StateResponse,
};

use crate::authority::{Authority, AuthorityError, Reply};

/// Every request the fake has received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchState,
    Play(PlayRequest),
    EndRound,
    ReadyNextRound,
    DeleteRoom(String),
    JoinRoom { room: String, name: String },
    ToggleLobbyReady(String),
}

type StateResult = Result<StateResponse, String>;

#[derive(Default)]
struct Script {
    states: VecDeque<StateResult>,
    last_state: Option<StateResult>,
    state_delay: Option<Duration>,
    play: VecDeque<Reply<()>>,
    end_round: VecDeque<Reply<()>>,
    ready: VecDeque<Reply<ReadyResponse>>,
    delete_room: VecDeque<Reply<()>>,
    join_room: VecDeque<Reply<()>>,
    lobby_ready: VecDeque<Reply<LobbyReadyResponse>>,
    calls: Vec<Call>,
}

#[derive(Default)]
pub struct FakeAuthority {
    script: Mutex<Script>,
}

impl FakeAuthority {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a `/state` answer. `Err` becomes a transport failure.
    pub fn push_state(&self, state: Result<StateResponse, &str>) {
        self.script()
            .states
            .push_back(state.map_err(str::to_string));
    }

    pub fn push_snapshot(&self, snapshot: Snapshot) {
        self.push_state(Ok(StateResponse::Snapshot(Box::new(snapshot))));
    }

    /// Make every `/state` request take `delay` before answering.
    pub fn set_state_delay(&self, delay: Duration) {
        self.script().state_delay = Some(delay);
    }

    pub fn push_play(&self, reply: Reply<()>) {
        self.script().play.push_back(reply);
    }

    pub fn push_end_round(&self, reply: Reply<()>) {
        self.script().end_round.push_back(reply);
    }

    pub fn push_ready(&self, reply: Reply<ReadyResponse>) {
        self.script().ready.push_back(reply);
    }

    pub fn push_delete_room(&self, reply: Reply<()>) {
        self.script().delete_room.push_back(reply);
    }

    pub fn push_join_room(&self, reply: Reply<()>) {
        self.script().join_room.push_back(reply);
    }

    pub fn push_lobby_ready(&self, reply: Reply<LobbyReadyResponse>) {
        self.script().lobby_ready.push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script().calls.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.script()
            .calls
            .iter()
            .filter(|c| **c == Call::FetchState)
            .count()
    }

    fn record(&self, call: Call) {
        self.script().calls.push(call);
    }
}

#[async_trait]
impl Authority for FakeAuthority {
    async fn fetch_state(&self) -> Result<StateResponse, AuthorityError> {
        self.record(Call::FetchState);
        let (next, delay) = {
            let mut script = self.script();
            let next = match script.states.pop_front() {
                Some(state) => {
                    script.last_state = Some(state.clone());
                    Some(state)
                }
                None => script.last_state.clone(),
            };
            (next, script.state_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match next {
            Some(Ok(state)) => Ok(state),
            Some(Err(message)) => Err(AuthorityError::Decode {
                path: "/state".into(),
                message,
            }),
            None => Err(AuthorityError::Decode {
                path: "/state".into(),
                message: "no scripted state".into(),
            }),
        }
    }

    async fn play(&self, request: &PlayRequest) -> Result<Reply<()>, AuthorityError> {
        self.record(Call::Play(request.clone()));
        Ok(self.script().play.pop_front().unwrap_or(Reply::Accepted(())))
    }

    async fn end_round(&self) -> Result<Reply<()>, AuthorityError> {
        self.record(Call::EndRound);
        Ok(self
            .script()
            .end_round
            .pop_front()
            .unwrap_or(Reply::Accepted(())))
    }

    async fn ready_next_round(&self) -> Result<Reply<ReadyResponse>, AuthorityError> {
        self.record(Call::ReadyNextRound);
        Ok(self.script().ready.pop_front().unwrap_or_else(|| {
            Reply::Accepted(ReadyResponse {
                ready: vec![],
                all_ready: false,
            })
        }))
    }

    async fn delete_room(&self, room: &str) -> Result<Reply<()>, AuthorityError> {
        self.record(Call::DeleteRoom(room.to_string()));
        Ok(self
            .script()
            .delete_room
            .pop_front()
            .unwrap_or_else(|| Reply::Redirected {
                location: "http://authority.test/".into(),
            }))
    }

    async fn join_room(&self, room: &str, name: &str) -> Result<Reply<()>, AuthorityError> {
        self.record(Call::JoinRoom {
            room: room.to_string(),
            name: name.to_string(),
        });
        Ok(self
            .script()
            .join_room
            .pop_front()
            .unwrap_or_else(|| Reply::Redirected {
                location: format!("http://authority.test/join/{room}"),
            }))
    }

    async fn toggle_lobby_ready(
        &self,
        room: &str,
    ) -> Result<Reply<LobbyReadyResponse>, AuthorityError> {
        self.record(Call::ToggleLobbyReady(room.to_string()));
        Ok(self
            .script()
            .lobby_ready
            .pop_front()
            .unwrap_or(Reply::Accepted(LobbyReadyResponse::Toggled { ready: true })))
    }
}

/// Viewer `A` holding four cards against `B`, with `A` to move and no
/// action yet.
pub fn sample_snapshot() -> Snapshot {
    Snapshot {
        players: vec![
            Player {
                name: "A".into(),
                hand: Hand::Revealed(
                    ["A♠", "5♥", "5♣", "K♦"]
                        .into_iter()
                        .map(CardCode::from)
                        .collect(),
                ),
                hand_value: Some(21),
                score: Some(0),
            },
            Player {
                name: "B".into(),
                hand: Hand::Concealed(4),
                hand_value: None,
                score: Some(0),
            },
        ],
        current_player: "A".into(),
        pile_top: Some("7♣".into()),
        deck_count: Some(40),
        round_ended: false,
        ready_players: vec![],
        game_over: false,
        round_summary_popup: None,
        game_over_notice: None,
        last_action: None,
        scores: Default::default(),
    }
}
