// Session loop: the single task that owns reconciliation.
//
// Poll results and user commands arrive on two channels and are handled one
// at a time, so the reconciler and the persisted store have exactly one
// mutator. View updates go out to the renderer over a third channel.

use cardtable_core::card::CardCode;
use cardtable_core::error::{Precondition, SessionEnd, SyncError};
use cardtable_core::protocol::{LobbyReadyResponse, Snapshot};
use cardtable_core::reconciler::Reconciler;
use cardtable_core::selection::Selection;
use cardtable_core::store::SessionStore;
use cardtable_core::turn_lock::TurnLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::intents::IntentSubmitter;
use crate::poller::{FetchOutcome, PollerHandle};
use crate::protocol::{UiUpdate, UserCommand};

/// Consecutive transport failures before the first warning.
pub const TRANSPORT_WARN_AFTER: u32 = 5;
/// After the first warning, warn again every this many failures.
pub const TRANSPORT_WARN_EVERY: u32 = 50;

/// Why the session loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionExit {
    /// The player closed the client.
    UserExit,
    /// The authority ended the session, or the player quit the game.
    Ended(SessionEnd),
    /// The poller went away.
    PollerGone,
}

/// What the loop should do after handling one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// Reconcile again right away, outside the poll cycle.
    Refresh,
    Exit(SessionExit),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session<S: SessionStore> {
    reconciler: Reconciler<S>,
    intents: IntentSubmitter,
    selection: Selection,
    /// Most recent snapshot, re-reconciled after local changes.
    snapshot: Option<Snapshot>,
    lock: TurnLock,
    hand: Vec<CardCode>,
    transport_failures: u32,
}

impl<S: SessionStore> Session<S> {
    pub fn new(reconciler: Reconciler<S>, intents: IntentSubmitter) -> Self {
        Session {
            reconciler,
            intents,
            selection: Selection::new(),
            snapshot: None,
            lock: TurnLock::default(),
            hand: Vec::new(),
            transport_failures: 0,
        }
    }

    pub fn reconciler(&self) -> &Reconciler<S> {
        &self.reconciler
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn transport_failures(&self) -> u32 {
        self.transport_failures
    }

    /// Join a room. Switching to a different room discards the state kept
    /// for the old one.
    pub async fn join(&mut self, room: &str, name: &str) -> Result<(), SyncError> {
        self.intents.join(room, name).await?;
        if self.reconciler.room_code() != Some(room) {
            if self.reconciler.room_code().is_some() {
                info!("Switching rooms; discarding saved session");
            }
            self.reconciler.reset();
            self.reconciler.set_room_code(room);
        }
        Ok(())
    }

    // ---- poll results ----

    pub async fn handle_fetch(&mut self, outcome: FetchOutcome, ui_tx: &mpsc::Sender<UiUpdate>) -> Step {
        match outcome {
            Ok(snapshot) => {
                if self.transport_failures >= TRANSPORT_WARN_AFTER {
                    info!(
                        "Authority reachable again after {} failed polls",
                        self.transport_failures
                    );
                }
                self.transport_failures = 0;
                self.snapshot = Some(snapshot);
                self.render(ui_tx).await;
                Step::Continue
            }
            Err(SyncError::SessionInvalidated(end)) => self.end_session(end, ui_tx).await,
            Err(SyncError::Transport(message)) => {
                self.transport_failures += 1;
                let n = self.transport_failures;
                if n == TRANSPORT_WARN_AFTER || (n > TRANSPORT_WARN_AFTER && n % TRANSPORT_WARN_EVERY == 0) {
                    warn!("{n} consecutive failed polls, latest: {message}");
                } else {
                    debug!("Poll failed ({n}): {message}");
                }
                Step::Continue
            }
            Err(other) => {
                warn!("Unexpected poll error: {other}");
                Step::Continue
            }
        }
    }

    // ---- user commands ----

    pub async fn handle_command(&mut self, cmd: UserCommand, ui_tx: &mpsc::Sender<UiUpdate>) -> Step {
        match cmd {
            UserCommand::ToggleCard(index) => {
                if !self.lock.can_select_cards || index >= self.hand.len() {
                    debug!("Ignoring card toggle {index}");
                    return Step::Continue;
                }
                self.selection.toggle_card(index);
                self.render(ui_tx).await;
                Step::Continue
            }
            UserCommand::ToggleDrawSource(source) => {
                if !self.lock.can_pick_draw_source {
                    debug!("Ignoring draw source {source}");
                    return Step::Continue;
                }
                self.selection.toggle_draw_source(source);
                self.render(ui_tx).await;
                Step::Continue
            }
            UserCommand::Play => self.play(ui_tx).await,
            UserCommand::EndRound => self.end_round(ui_tx).await,
            UserCommand::ToggleReady => self.toggle_ready(ui_tx).await,
            UserCommand::ToggleLobbyReady => self.toggle_lobby_ready(ui_tx).await,
            UserCommand::AcknowledgeNotice => {
                if self.reconciler.acknowledge_notice() {
                    self.render(ui_tx).await;
                }
                Step::Continue
            }
            UserCommand::QuitGame => {
                let room = self.reconciler.room_code().map(str::to_string);
                match self.intents.quit(room.as_deref()).await {
                    Ok(Some(end)) => self.end_session(end, ui_tx).await,
                    Ok(None) => Step::Continue,
                    Err(e) => self.surface(e, ui_tx).await,
                }
            }
            UserCommand::Exit => {
                info!("Exit requested");
                Step::Exit(SessionExit::UserExit)
            }
        }
    }

    async fn play(&mut self, ui_tx: &mpsc::Sender<UiUpdate>) -> Step {
        if !self.lock.can_play {
            return self
                .surface(SyncError::LocalPrecondition(Precondition::NotAllowed), ui_tx)
                .await;
        }

        match self.intents.play(&self.selection, &self.hand).await {
            Ok(()) => {
                self.selection.clear();
                self.render(ui_tx).await;
                Step::Refresh
            }
            // Nothing was sent; keep the selection so the player can fix it.
            Err(e @ SyncError::LocalPrecondition(_)) => self.surface(e, ui_tx).await,
            Err(e) => {
                self.selection.clear();
                self.render(ui_tx).await;
                match self.surface(e, ui_tx).await {
                    Step::Continue => Step::Refresh,
                    other => other,
                }
            }
        }
    }

    async fn end_round(&mut self, ui_tx: &mpsc::Sender<UiUpdate>) -> Step {
        if !self.lock.can_end_round {
            return self
                .surface(SyncError::LocalPrecondition(Precondition::NotAllowed), ui_tx)
                .await;
        }

        match self.intents.end_round().await {
            Ok(()) => {
                self.selection.clear();
                self.reconciler.clear_log();
                // The cached snapshot predates the round end; wait for the
                // refresh instead of re-reconciling it.
                self.snapshot = None;
                Step::Refresh
            }
            Err(e) => self.surface(e, ui_tx).await,
        }
    }

    async fn toggle_ready(&mut self, ui_tx: &mpsc::Sender<UiUpdate>) -> Step {
        if self.reconciler.state().popups.round_summary().is_none() {
            debug!("Ready toggle with no round summary showing; ignoring");
            return Step::Continue;
        }

        match self.intents.toggle_ready().await {
            Ok(response) => {
                let outcome = self.reconciler.apply_ready(&response);
                if outcome.all_ready {
                    self.snapshot = None;
                    Step::Refresh
                } else {
                    self.render(ui_tx).await;
                    Step::Continue
                }
            }
            Err(e) => self.surface(e, ui_tx).await,
        }
    }

    async fn toggle_lobby_ready(&mut self, ui_tx: &mpsc::Sender<UiUpdate>) -> Step {
        let Some(room) = self.reconciler.room_code().map(str::to_string) else {
            let _ = ui_tx.send(UiUpdate::Notice("No room to get ready in.".into())).await;
            return Step::Continue;
        };

        match self.intents.lobby_ready(&room).await {
            Ok(LobbyReadyResponse::Started { .. }) => {
                let _ = ui_tx
                    .send(UiUpdate::Lobby {
                        ready: true,
                        started: true,
                    })
                    .await;
                Step::Refresh
            }
            Ok(LobbyReadyResponse::Toggled { ready }) => {
                let _ = ui_tx
                    .send(UiUpdate::Lobby {
                        ready,
                        started: false,
                    })
                    .await;
                Step::Continue
            }
            Err(e) => self.surface(e, ui_tx).await,
        }
    }

    // ---- helpers ----

    /// Reconcile the cached snapshot and push the view to the renderer.
    async fn render(&mut self, ui_tx: &mpsc::Sender<UiUpdate>) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        match self.reconciler.reconcile(snapshot, &mut self.selection) {
            Ok(view) => {
                // The notice is delivered once; a re-render of the same
                // snapshot must not show it again after acknowledgment.
                if let Some(cached) = self.snapshot.as_mut() {
                    cached.game_over_notice = None;
                }
                self.lock = view.lock;
                self.hand = view.viewer.hand.clone();
                let _ = ui_tx.send(UiUpdate::View(Box::new(view))).await;
            }
            Err(e) => warn!("Reconciliation failed: {e}"),
        }
    }

    /// Route an intent error: terminal errors end the session, rejections
    /// and local checks become notices, transport failures stay in the log.
    async fn surface(&mut self, error: SyncError, ui_tx: &mpsc::Sender<UiUpdate>) -> Step {
        match error {
            SyncError::SessionInvalidated(end) => self.end_session(end, ui_tx).await,
            SyncError::IntentRejected { message } => {
                let _ = ui_tx.send(UiUpdate::Notice(message)).await;
                Step::Continue
            }
            SyncError::LocalPrecondition(p) => {
                let _ = ui_tx.send(UiUpdate::Notice(p.to_string())).await;
                Step::Continue
            }
            SyncError::Transport(_) | SyncError::ViewerMissing => Step::Continue,
        }
    }

    async fn end_session(&mut self, end: SessionEnd, ui_tx: &mpsc::Sender<UiUpdate>) -> Step {
        info!("Session ended: {end}");
        self.reconciler.reset();
        self.selection.clear();
        self.snapshot = None;
        let _ = ui_tx.send(UiUpdate::SessionEnded(end.clone())).await;
        Step::Exit(SessionExit::Ended(end))
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the session until the player exits or the session ends.
///
/// Listens on two channels using `tokio::select!`:
/// 1. Poll results from the poller
/// 2. User commands from the renderer
///
/// Stops the poller on the way out.
pub async fn run<S: SessionStore>(
    mut session: Session<S>,
    mut fetch_rx: mpsc::Receiver<FetchOutcome>,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    poller: PollerHandle,
) -> SessionExit {
    info!("Session loop started");

    let exit = loop {
        let step = tokio::select! {
            outcome = fetch_rx.recv() => match outcome {
                Some(outcome) => session.handle_fetch(outcome, &ui_tx).await,
                None => {
                    info!("Poller channel closed");
                    Step::Exit(SessionExit::PollerGone)
                }
            },
            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => session.handle_command(cmd, &ui_tx).await,
                None => {
                    info!("Command channel closed, shutting down");
                    Step::Exit(SessionExit::UserExit)
                }
            },
        };

        match step {
            Step::Continue => {}
            Step::Refresh => poller.refresh(),
            Step::Exit(exit) => break exit,
        }
    };

    poller.shutdown().await;
    info!("Session loop finished: {exit:?}");
    exit
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::Reply;
    use crate::testing::{sample_snapshot, Call, FakeAuthority};
    use cardtable_core::protocol::{DrawSource, LastAction, ReadyResponse};
    use cardtable_core::store::{MemoryStore, PersistedSession};
    use std::sync::Arc;

    struct Harness {
        fake: Arc<FakeAuthority>,
        store: Arc<MemoryStore>,
        session: Session<Arc<MemoryStore>>,
        ui_tx: mpsc::Sender<UiUpdate>,
        ui_rx: mpsc::Receiver<UiUpdate>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_store(MemoryStore::new())
        }

        fn with_store(store: MemoryStore) -> Self {
            let fake = FakeAuthority::new();
            let store = Arc::new(store);
            let reconciler = Reconciler::new(Arc::clone(&store)).unwrap();
            let session = Session::new(reconciler, IntentSubmitter::new(fake.clone()));
            let (ui_tx, ui_rx) = mpsc::channel(64);
            Harness {
                fake,
                store,
                session,
                ui_tx,
                ui_rx,
            }
        }

        async fn fetch(&mut self, outcome: FetchOutcome) -> Step {
            self.session.handle_fetch(outcome, &self.ui_tx).await
        }

        async fn command(&mut self, cmd: UserCommand) -> Step {
            self.session.handle_command(cmd, &self.ui_tx).await
        }

        fn drain(&mut self) -> Vec<UiUpdate> {
            let mut out = Vec::new();
            while let Ok(update) = self.ui_rx.try_recv() {
                out.push(update);
            }
            out
        }

        fn notices(&mut self) -> Vec<String> {
            self.drain()
                .into_iter()
                .filter_map(|u| match u {
                    UiUpdate::Notice(n) => Some(n),
                    _ => None,
                })
                .collect()
        }
    }

    fn snapshot_with_action() -> Snapshot {
        let mut snap = sample_snapshot();
        snap.last_action = Some(LastAction {
            player: "B".into(),
            played: vec!["9♥".into()],
            draw_source: Some(DrawSource::Deck),
            drawn_card: None,
        });
        snap
    }

    #[tokio::test]
    async fn snapshot_produces_view() {
        let mut h = Harness::new();
        assert_eq!(h.fetch(Ok(snapshot_with_action())).await, Step::Continue);
        let updates = h.drain();
        match &updates[..] {
            [UiUpdate::View(view)] => {
                assert_eq!(view.viewer.name, "A");
                assert_eq!(view.log.len(), 1);
            }
            other => panic!("unexpected updates: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failures_are_silent_and_counted() {
        let mut h = Harness::new();
        for _ in 0..7 {
            h.fetch(Err(SyncError::Transport("timeout".into()))).await;
        }
        assert_eq!(h.session.transport_failures(), 7);
        assert!(h.drain().is_empty());
        h.fetch(Ok(sample_snapshot())).await;
        assert_eq!(h.session.transport_failures(), 0);
    }

    #[tokio::test]
    async fn invalidation_clears_store_and_ends() {
        let mut h = Harness::with_store(MemoryStore::with_session(PersistedSession {
            room_code: Some("ROOM".into()),
            ..Default::default()
        }));
        let step = h
            .fetch(Err(SyncError::SessionInvalidated(SessionEnd::RoomClosed)))
            .await;
        assert_eq!(step, Step::Exit(SessionExit::Ended(SessionEnd::RoomClosed)));
        assert_eq!(h.store.load().unwrap(), PersistedSession::default());
        assert_eq!(
            h.drain(),
            vec![UiUpdate::SessionEnded(SessionEnd::RoomClosed)]
        );
    }

    #[tokio::test]
    async fn play_success_clears_selection_and_refreshes() {
        let mut h = Harness::new();
        h.fetch(Ok(sample_snapshot())).await;
        h.command(UserCommand::ToggleCard(1)).await;
        h.command(UserCommand::ToggleDrawSource(DrawSource::Deck)).await;
        assert_eq!(h.session.selection().order(), &[1]);

        assert_eq!(h.command(UserCommand::Play).await, Step::Refresh);
        assert!(h.session.selection().is_empty());
        assert!(matches!(h.fake.calls().last(), Some(Call::Play(_))));
    }

    #[tokio::test]
    async fn play_missing_draw_source_keeps_selection() {
        let mut h = Harness::new();
        h.fetch(Ok(sample_snapshot())).await;
        h.command(UserCommand::ToggleCard(0)).await;
        h.drain();

        assert_eq!(h.command(UserCommand::Play).await, Step::Continue);
        assert_eq!(h.notices(), vec!["Choose draw source.".to_string()]);
        assert_eq!(h.session.selection().order(), &[0]);
        assert!(h.fake.calls().is_empty());
    }

    #[tokio::test]
    async fn play_rejection_clears_selection_and_surfaces_reason() {
        let mut h = Harness::new();
        h.fake.push_play(Reply::Rejected(Some("Cards must match".into())));
        h.fetch(Ok(sample_snapshot())).await;
        h.command(UserCommand::ToggleCard(0)).await;
        h.command(UserCommand::ToggleCard(3)).await;
        h.command(UserCommand::ToggleDrawSource(DrawSource::Pile)).await;
        h.drain();

        h.command(UserCommand::Play).await;
        assert!(h.session.selection().is_empty());
        assert_eq!(h.notices(), vec!["Cards must match".to_string()]);
    }

    #[tokio::test]
    async fn not_your_turn_blocks_selection_and_play() {
        let mut h = Harness::new();
        let mut snap = sample_snapshot();
        snap.current_player = "B".into();
        h.fetch(Ok(snap)).await;
        h.command(UserCommand::ToggleCard(0)).await;
        h.command(UserCommand::ToggleDrawSource(DrawSource::Pile)).await;
        assert!(h.session.selection().is_empty());
        h.drain();

        h.command(UserCommand::Play).await;
        assert_eq!(h.notices(), vec!["Not your turn.".to_string()]);
    }

    #[tokio::test]
    async fn end_round_success_clears_log_and_refreshes() {
        let mut h = Harness::new();
        let mut snap = snapshot_with_action();
        snap.players[0].hand_value = Some(4);
        h.fetch(Ok(snap)).await;
        assert_eq!(h.session.reconciler().state().log.len(), 1);

        assert_eq!(h.command(UserCommand::EndRound).await, Step::Refresh);
        assert!(h.session.reconciler().state().log.is_empty());
        assert!(h.store.load().unwrap().action_log.is_empty());
    }

    #[tokio::test]
    async fn end_round_rejection_message() {
        let mut h = Harness::new();
        h.fake.push_end_round(Reply::Rejected(None));
        let mut snap = sample_snapshot();
        snap.players[0].hand_value = None;
        h.fetch(Ok(snap)).await;
        h.drain();
        h.command(UserCommand::EndRound).await;
        assert_eq!(h.notices(), vec!["Could not end round.".to_string()]);
    }

    #[tokio::test]
    async fn end_round_blocked_by_hand_value() {
        let mut h = Harness::new();
        h.fetch(Ok(sample_snapshot())).await; // hand_value 21
        h.drain();
        h.command(UserCommand::EndRound).await;
        assert!(h.fake.calls().is_empty());
        assert_eq!(h.notices().len(), 1);
    }

    #[tokio::test]
    async fn ready_toggle_updates_label_then_all_ready_refreshes() {
        let mut h = Harness::new();
        let mut snap = snapshot_with_action();
        snap.round_ended = true;
        snap.round_summary_popup = Some("<p>Round over</p>".into());
        h.fetch(Ok(snap)).await;
        h.drain();

        h.fake.push_ready(Reply::Accepted(ReadyResponse {
            ready: vec!["A".into()],
            all_ready: false,
        }));
        assert_eq!(h.command(UserCommand::ToggleReady).await, Step::Continue);
        match h.drain().last() {
            Some(UiUpdate::View(view)) => {
                assert_eq!(view.round_summary.as_ref().unwrap().ready_label(), "Cancel Ready")
            }
            other => panic!("expected a view, got {other:?}"),
        }

        h.fake.push_ready(Reply::Accepted(ReadyResponse {
            ready: vec!["A".into(), "B".into()],
            all_ready: true,
        }));
        assert_eq!(h.command(UserCommand::ToggleReady).await, Step::Refresh);
        assert!(h.session.reconciler().state().log.is_empty());
        assert!(h.session.reconciler().state().popups.round_summary().is_none());
    }

    #[tokio::test]
    async fn quit_ends_session_with_destination() {
        let mut h = Harness::with_store(MemoryStore::with_session(PersistedSession {
            room_code: Some("ROOM".into()),
            ..Default::default()
        }));
        let step = h.command(UserCommand::QuitGame).await;
        let Step::Exit(SessionExit::Ended(end)) = step else {
            panic!("expected session end, got {step:?}");
        };
        assert_eq!(end.destination(), "http://authority.test/");
        assert_eq!(h.store.load().unwrap(), PersistedSession::default());
    }

    #[tokio::test]
    async fn quit_without_room_is_ignored() {
        let mut h = Harness::new();
        assert_eq!(h.command(UserCommand::QuitGame).await, Step::Continue);
        assert!(h.fake.calls().is_empty());
    }

    #[tokio::test]
    async fn join_new_room_discards_old_session() {
        let mut h = Harness::with_store(MemoryStore::with_session(PersistedSession {
            room_code: Some("OLD".into()),
            ..Default::default()
        }));
        h.session.join("NEW", "Ada").await.unwrap();
        assert_eq!(h.session.reconciler().room_code(), Some("NEW"));
        assert_eq!(h.store.load().unwrap().room_code.as_deref(), Some("NEW"));
    }

    #[tokio::test]
    async fn game_over_notice_needs_acknowledgment() {
        let mut h = Harness::new();
        let mut snap = sample_snapshot();
        snap.game_over_notice = Some("<p>A wins</p>".into());
        h.fetch(Ok(snap)).await;
        h.fetch(Ok(sample_snapshot())).await;
        assert!(h.session.reconciler().state().popups.game_over_notice().is_some());
        h.command(UserCommand::AcknowledgeNotice).await;
        assert!(h.session.reconciler().state().popups.game_over_notice().is_none());
    }

    #[tokio::test]
    async fn acknowledged_notice_stays_dismissed_on_rerender() {
        let mut h = Harness::new();
        let mut snap = sample_snapshot();
        snap.game_over_notice = Some("<p>A wins</p>".into());
        h.fetch(Ok(snap)).await;
        h.drain();

        h.command(UserCommand::AcknowledgeNotice).await;
        // Local changes re-render the cached snapshot before the next poll.
        h.command(UserCommand::ToggleCard(0)).await;

        assert!(h.session.reconciler().state().popups.game_over_notice().is_none());
        let last_view = h
            .drain()
            .into_iter()
            .filter_map(|u| match u {
                UiUpdate::View(view) => Some(view),
                _ => None,
            })
            .last()
            .expect("acknowledgment should re-render");
        assert!(last_view.game_over_notice.is_none());
    }

    #[tokio::test]
    async fn lobby_ready_reports_start() {
        let mut h = Harness::with_store(MemoryStore::with_session(PersistedSession {
            room_code: Some("ROOM".into()),
            ..Default::default()
        }));
        h.fake.push_lobby_ready(Reply::Accepted(LobbyReadyResponse::Started {
            status: "started".into(),
        }));
        assert_eq!(h.command(UserCommand::ToggleLobbyReady).await, Step::Refresh);
        assert_eq!(
            h.drain(),
            vec![UiUpdate::Lobby {
                ready: true,
                started: true
            }]
        );
    }
}
