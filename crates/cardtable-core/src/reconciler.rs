// Reconciler: turns each polled snapshot into an updated local state and a
// fresh view model.
//
// The authority only ever sends full snapshots, so everything that looks
// like history (the action log, the last-played fan, popup visibility) is
// derived here by comparing against what was seen before.
//
// A cycle runs against a working copy of the state. Nothing is committed if
// the cycle fails, and the store is only written when the log changed.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::action_log::{player_color, ActionLog, ActionLogEntry};
use crate::card::CardCode;
use crate::error::SyncError;
use crate::popup::{PopupLifecycle, ReadyOutcome};
use crate::protocol::{ActionId, Hand, ReadyResponse, Snapshot};
use crate::selection::Selection;
use crate::store::{PersistedSession, SessionStore};
use crate::turn_lock;
use crate::view::{OpponentView, PileView, Seat, ViewModel, ViewerView};

/// Local state carried between cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationState {
    pub log: ActionLog,
    pub previous_round_ended: bool,
    /// Cards shown fanned on the pile; empty means show the pile top.
    pub last_played: Vec<CardCode>,
    pub popups: PopupLifecycle,
    pub room_code: Option<String>,
    /// Name of the viewer as of the last successful cycle.
    pub viewer: Option<String>,
}

impl ReconciliationState {
    fn from_persisted(session: PersistedSession) -> Self {
        ReconciliationState {
            log: ActionLog::restore(session.action_log, session.last_action_id),
            room_code: session.room_code,
            ..Default::default()
        }
    }

    fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            last_action_id: self.log.last_action_id().cloned(),
            action_log: self.log.entries().cloned().collect(),
            room_code: self.room_code.clone(),
        }
    }
}

pub struct Reconciler<S: SessionStore> {
    store: S,
    state: ReconciliationState,
}

impl<S: SessionStore> Reconciler<S> {
    /// Build a reconciler, restoring whatever the store holds.
    pub fn new(store: S) -> Result<Self> {
        let persisted = store.load()?;
        if !persisted.action_log.is_empty() {
            info!(
                "Restored {} action log entries (room {:?})",
                persisted.action_log.len(),
                persisted.room_code
            );
        }
        Ok(Reconciler {
            store,
            state: ReconciliationState::from_persisted(persisted),
        })
    }

    pub fn state(&self) -> &ReconciliationState {
        &self.state
    }

    pub fn room_code(&self) -> Option<&str> {
        self.state.room_code.as_deref()
    }

    pub fn viewer(&self) -> Option<&str> {
        self.state.viewer.as_deref()
    }

    /// Run one reconciliation cycle.
    ///
    /// On success the new state is committed, `selection` is pruned to the
    /// current hand, and the view model is returned. On error nothing
    /// changes.
    pub fn reconcile(
        &mut self,
        snapshot: &Snapshot,
        selection: &mut Selection,
    ) -> Result<ViewModel, SyncError> {
        let mut working = self.state.clone();

        // 1. Round-restart edge.
        let restart = working.previous_round_ended && !snapshot.round_ended;
        working.previous_round_ended = snapshot.round_ended;
        if restart {
            info!("Round restarted; clearing action log");
            working.last_played.clear();
            working.log.clear();
        }

        // 2. Popups. The viewer lookup is needed for the ready state captured
        //    when the summary opens; a missing viewer fails the cycle below.
        let viewer_player = snapshot
            .players
            .iter()
            .find(|p| matches!(p.hand, Hand::Revealed(_)));
        let change = working
            .popups
            .observe(snapshot, viewer_player.map(|p| p.name.as_str()), restart);
        if change.summary_dismissed {
            working.last_played.clear();
        }
        if change.summary_shown {
            debug!("Round summary shown");
        }
        if change.notice_shown {
            info!("Game over notice received");
        }

        // 3. Identity.
        let viewer = viewer_player.ok_or(SyncError::ViewerMissing)?;
        let hand: &[CardCode] = viewer.hand.cards().unwrap_or_default();

        // 4. Action-log delta.
        if let Some(action) = &snapshot.last_action {
            let id = ActionId::of(action);
            if !working.log.is_seen(&id) {
                let entry = ActionLogEntry::from_action(action, snapshot, &viewer.name);
                info!("New action by {}: {} item(s)", entry.player, entry.items.len());
                working.log.record(id, entry);
            }
        }

        // 5. Last played.
        if !restart {
            if let Some(action) = &snapshot.last_action {
                working.last_played = action.played.clone();
            }
        }

        // Commit.
        let log_changed = working.log != self.state.log;
        working.viewer = Some(viewer.name.clone());
        self.state = working;
        if log_changed {
            self.persist();
        }

        // 6. View model.
        selection.retain_within(hand.len());
        Ok(self.build_view(snapshot, &viewer.name, hand, viewer.hand_value, selection))
    }

    fn build_view(
        &self,
        snapshot: &Snapshot,
        viewer_name: &str,
        hand: &[CardCode],
        hand_value: Option<u32>,
        selection: &Selection,
    ) -> ViewModel {
        let players = &snapshot.players;
        let viewer_idx = players
            .iter()
            .position(|p| p.name == viewer_name)
            .unwrap_or(0);
        let rotated = players[viewer_idx + 1..]
            .iter()
            .chain(players[..viewer_idx].iter());

        let opponents = rotated
            .enumerate()
            .map(|(idx, p)| OpponentView {
                name: p.name.clone(),
                card_count: p.hand.len(),
                score: snapshot.score_of(&p.name),
                color: player_color(snapshot, &p.name).to_string(),
                seat: Seat::for_index(idx),
                is_current: p.name == snapshot.current_player,
            })
            .collect();

        let pile = if !self.state.last_played.is_empty() {
            PileView::Played(self.state.last_played.clone())
        } else {
            match &snapshot.pile_top {
                Some(top) if !top.is_face_down() => PileView::Top(top.clone()),
                _ => PileView::FaceDown,
            }
        };

        ViewModel {
            viewer: ViewerView {
                name: viewer_name.to_string(),
                hand: hand.to_vec(),
                hand_value,
                score: snapshot.score_of(viewer_name),
                color: player_color(snapshot, viewer_name).to_string(),
            },
            opponents,
            current_player: snapshot.current_player.clone(),
            pile,
            deck_count: snapshot.deck_count,
            round_ended: snapshot.round_ended,
            game_over: snapshot.game_over,
            ready_players: snapshot.ready_players.clone(),
            log: self.state.log.newest_first(),
            lock: turn_lock::enforce(
                viewer_name,
                &snapshot.current_player,
                snapshot.round_ended,
                hand_value,
            ),
            round_summary: self.state.popups.round_summary().cloned(),
            game_over_notice: self.state.popups.game_over_notice().map(str::to_string),
            selection: selection.clone(),
            room_code: self.state.room_code.clone(),
        }
    }

    // ---- out-of-cycle mutations ----

    /// Drop the action log and its dedup identity, then persist.
    pub fn clear_log(&mut self) {
        if self.state.log.is_empty() && self.state.log.last_action_id().is_none() {
            return;
        }
        self.state.log.clear();
        self.persist();
    }

    /// Apply a ready-toggle response. When everyone is ready the summary is
    /// gone and the log is cleared.
    pub fn apply_ready(&mut self, response: &ReadyResponse) -> ReadyOutcome {
        let viewer = self.state.viewer.clone().unwrap_or_default();
        let outcome = self.state.popups.apply_ready(response, &viewer);
        if outcome.all_ready {
            info!("All players ready");
            self.clear_log();
        }
        outcome
    }

    pub fn acknowledge_notice(&mut self) -> bool {
        self.state.popups.acknowledge_notice()
    }

    /// Remember the room this session belongs to.
    pub fn set_room_code(&mut self, code: impl Into<String>) {
        let code = code.into();
        if self.state.room_code.as_deref() == Some(code.as_str()) {
            return;
        }
        self.state.room_code = Some(code);
        self.persist();
    }

    /// Forget everything, locally and in the store. Used when the session
    /// ends for any reason.
    pub fn reset(&mut self) {
        self.state = ReconciliationState::default();
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear session store: {e:#}");
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.state.to_persisted()) {
            warn!("Failed to persist session state: {e:#}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
