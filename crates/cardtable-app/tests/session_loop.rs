// Integration tests for the session loop.
//
// These drive the real poller and session loop against the scripted
// authority, with paused tokio time, and check what reaches the renderer
// and what survives in the store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cardtable_app::fetcher::SnapshotFetcher;
use cardtable_app::intents::IntentSubmitter;
use cardtable_app::poller;
use cardtable_app::protocol::{UiUpdate, UserCommand};
use cardtable_app::session::{self, Session, SessionExit};
use cardtable_app::testing::{sample_snapshot, Call, FakeAuthority};
use cardtable_core::error::SessionEnd;
use cardtable_core::protocol::{DrawSource, LastAction, Snapshot, StateResponse, ROOM_CLOSED};
use cardtable_core::reconciler::Reconciler;
use cardtable_core::store::{MemoryStore, SessionStore, SqliteStore};
use cardtable_core::view::ViewModel;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ===========================================================================
// Test helpers
// ===========================================================================

const PERIOD: Duration = Duration::from_millis(500);

struct Running {
    cmd_tx: mpsc::Sender<UserCommand>,
    ui_rx: mpsc::Receiver<UiUpdate>,
    task: JoinHandle<SessionExit>,
}

impl Running {
    /// Wait for the next view, skipping notices.
    async fn next_view(&mut self) -> ViewModel {
        loop {
            match self.ui_rx.recv().await {
                Some(UiUpdate::View(view)) => return *view,
                Some(_) => continue,
                None => panic!("session loop closed the ui channel"),
            }
        }
    }

    async fn send(&self, cmd: UserCommand) {
        self.cmd_tx.send(cmd).await.unwrap();
    }
}

async fn start<S: SessionStore + 'static>(fake: Arc<FakeAuthority>, store: S, room: &str) -> Running {
    let reconciler = Reconciler::new(store).unwrap();
    let mut session = Session::new(reconciler, IntentSubmitter::new(fake.clone()));
    session.join(room, "A").await.unwrap();

    let (fetch_tx, fetch_rx) = mpsc::channel(16);
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (ui_tx, ui_rx) = mpsc::channel(64);
    let handle = poller::spawn(SnapshotFetcher::new(fake), PERIOD, fetch_tx);
    let task = tokio::spawn(session::run(session, fetch_rx, cmd_rx, ui_tx, handle));

    Running { cmd_tx, ui_rx, task }
}

fn action(player: &str, played: &[&str]) -> LastAction {
    LastAction {
        player: player.into(),
        played: played.iter().map(|c| (*c).into()).collect(),
        draw_source: Some(DrawSource::Deck),
        drawn_card: None,
    }
}

fn with_action(player: &str, played: &[&str]) -> Snapshot {
    let mut snap = sample_snapshot();
    snap.last_action = Some(action(player, played));
    snap
}

fn temp_db(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cardtable_it_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir.join("session.db")
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn repeated_snapshots_log_each_action_once() {
    let fake = FakeAuthority::new();
    fake.push_snapshot(with_action("B", &["9♥"]));
    fake.push_snapshot(with_action("B", &["9♥"]));
    fake.push_snapshot(with_action("B", &["Q♠", "Q♥"]));

    let mut run = start(fake.clone(), MemoryStore::new(), "ROOM").await;

    assert_eq!(run.next_view().await.log.len(), 1);
    assert_eq!(run.next_view().await.log.len(), 1);
    let view = run.next_view().await;
    assert_eq!(view.log.len(), 2);
    assert_eq!(view.log[0].items[0].cards.len(), 2);

    run.send(UserCommand::Exit).await;
    assert_eq!(run.task.await.unwrap(), SessionExit::UserExit);
}

#[tokio::test(start_paused = true)]
async fn play_triggers_immediate_refresh() {
    let fake = FakeAuthority::new();
    fake.push_snapshot(sample_snapshot());

    let mut run = start(fake.clone(), MemoryStore::new(), "ROOM").await;
    run.next_view().await;

    run.send(UserCommand::ToggleCard(1)).await;
    run.send(UserCommand::ToggleCard(2)).await;
    run.send(UserCommand::ToggleDrawSource(DrawSource::Pile)).await;
    let view = run.next_view().await;
    assert_eq!(view.selection.order(), &[1]);
    let view = run.next_view().await;
    assert_eq!(view.selection.order(), &[1, 2]);
    let view = run.next_view().await;
    assert_eq!(view.selection.draw_source(), Some(DrawSource::Pile));

    let fetches_before = fake.fetch_count();
    run.send(UserCommand::Play).await;
    let view = run.next_view().await;
    assert!(view.selection.is_empty());

    // The refresh arrives well before the next periodic tick.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fake.fetch_count(), fetches_before + 1);
    assert!(fake.calls().iter().any(|c| matches!(c, Call::Play(_))));

    run.send(UserCommand::Exit).await;
    run.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn room_closed_ends_session_and_clears_store() {
    let path = temp_db("room_closed");
    let store = Arc::new(SqliteStore::open(path.to_str().unwrap()).unwrap());

    let fake = FakeAuthority::new();
    fake.push_snapshot(with_action("B", &["9♥"]));
    fake.push_state(Ok(StateResponse::Error {
        error: ROOM_CLOSED.into(),
    }));

    let mut run = start(fake.clone(), Arc::clone(&store), "ROOM").await;
    run.next_view().await;
    assert_eq!(store.load().unwrap().action_log.len(), 1);

    match run.ui_rx.recv().await {
        Some(UiUpdate::SessionEnded(end)) => assert_eq!(end, SessionEnd::RoomClosed),
        other => panic!("expected session end, got {other:?}"),
    }
    assert_eq!(
        run.task.await.unwrap(),
        SessionExit::Ended(SessionEnd::RoomClosed)
    );

    let persisted = store.load().unwrap();
    assert!(persisted.action_log.is_empty());
    assert!(persisted.room_code.is_none());
}

#[tokio::test(start_paused = true)]
async fn log_survives_restart() {
    let path = temp_db("restart");

    {
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        let fake = FakeAuthority::new();
        fake.push_snapshot(with_action("B", &["9♥"]));
        let mut run = start(fake, store, "ROOM").await;
        assert_eq!(run.next_view().await.log.len(), 1);
        run.send(UserCommand::Exit).await;
        run.task.await.unwrap();
    }

    // Same action again after a restart: restored, not duplicated.
    let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
    let fake = FakeAuthority::new();
    fake.push_snapshot(with_action("B", &["9♥"]));
    let mut run = start(fake, store, "ROOM").await;
    let view = run.next_view().await;
    assert_eq!(view.log.len(), 1);
    assert_eq!(view.room_code.as_deref(), Some("ROOM"));

    run.send(UserCommand::Exit).await;
    run.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn quit_game_deletes_room_and_ends() {
    let fake = FakeAuthority::new();
    fake.push_snapshot(sample_snapshot());

    let mut run = start(fake.clone(), MemoryStore::new(), "ROOM").await;
    run.next_view().await;
    run.send(UserCommand::QuitGame).await;

    let exit = run.task.await.unwrap();
    let SessionExit::Ended(end) = exit else {
        panic!("expected session end, got {exit:?}");
    };
    assert_eq!(end.destination(), "http://authority.test/");
    assert!(fake.calls().contains(&Call::DeleteRoom("ROOM".into())));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_renderer_stops_everything() {
    let fake = FakeAuthority::new();
    fake.push_snapshot(sample_snapshot());

    let run = start(fake.clone(), MemoryStore::new(), "ROOM").await;
    drop(run.cmd_tx);
    assert_eq!(run.task.await.unwrap(), SessionExit::UserExit);

    let fetches = fake.fetch_count();
    tokio::time::sleep(PERIOD * 4).await;
    assert_eq!(fake.fetch_count(), fetches);
}
