// Poller: fetches the table on a fixed period and hands each result to the
// session loop.
//
// Fetches are awaited inside the poller task, so at most one is ever in
// flight and results are delivered in the order they were requested. Ticks
// that come due while a fetch is running are skipped.

use std::sync::Arc;
use std::time::Duration;

use cardtable_core::error::SyncError;
use cardtable_core::protocol::Snapshot;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::fetcher::SnapshotFetcher;

/// One poll result, delivered to the session loop.
pub type FetchOutcome = Result<Snapshot, SyncError>;

/// Control surface for a running poller.
pub struct PollerHandle {
    refresh: Arc<Notify>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Fetch now instead of waiting for the next tick. If a fetch is already
    /// running, another one follows as soon as it completes. Requests made
    /// in the meantime are coalesced.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    /// Stop polling. An in-flight fetch is allowed to finish but its result
    /// is dropped.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop and wait for the task to exit.
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.task.await;
    }
}

/// Spawn the poller task. The first fetch happens immediately.
pub fn spawn(
    fetcher: SnapshotFetcher,
    period: Duration,
    out: mpsc::Sender<FetchOutcome>,
) -> PollerHandle {
    let refresh = Arc::new(Notify::new());
    let (stop_tx, stop_rx) = watch::channel(false);
    let task = tokio::spawn(poll_loop(fetcher, period, out, Arc::clone(&refresh), stop_rx));
    PollerHandle {
        refresh,
        stop_tx,
        task,
    }
}

async fn poll_loop(
    fetcher: SnapshotFetcher,
    period: Duration,
    out: mpsc::Sender<FetchOutcome>,
    refresh: Arc<Notify>,
    mut stop_rx: watch::Receiver<bool>,
) {
    info!("Poller started ({} ms period)", period.as_millis());

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            changed = stop_rx.changed() => {
                // A dropped handle counts as a stop.
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
            _ = refresh.notified() => {
                debug!("Out-of-cycle refresh");
                ticker.reset();
            }
            _ = ticker.tick() => {}
        }

        let outcome = fetcher.fetch_snapshot().await;

        if *stop_rx.borrow() {
            debug!("Poller stopped during fetch; dropping result");
            break;
        }
        if out.send(outcome).await.is_err() {
            debug!("Session loop gone; poller exiting");
            break;
        }
    }

    info!("Poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_snapshot, FakeAuthority};

    fn setup() -> (Arc<FakeAuthority>, SnapshotFetcher) {
        let fake = FakeAuthority::new();
        fake.push_snapshot(sample_snapshot());
        let fetcher = SnapshotFetcher::new(fake.clone());
        (fake, fetcher)
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_is_immediate_then_periodic() {
        let (fake, fetcher) = setup();
        let (tx, mut rx) = mpsc::channel(16);
        let handle = spawn(fetcher, Duration::from_millis(500), tx);

        assert!(rx.recv().await.unwrap().is_ok());
        assert_eq!(fake.fetch_count(), 1);

        tokio::time::sleep(Duration::from_millis(1_050)).await;
        while rx.try_recv().is_ok() {}
        assert_eq!(fake.fetch_count(), 3);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_never_overlaps() {
        let (fake, fetcher) = setup();
        fake.set_state_delay(Duration::from_millis(1_200));
        let (tx, mut rx) = mpsc::channel(16);
        let handle = spawn(fetcher, Duration::from_millis(500), tx);

        // Fetches run 0..1200, 1200..2400, 2400..3600. The ticks that came
        // due during each fetch collapse into a single overdue tick.
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(fake.fetch_count(), 3);
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_fetches_out_of_cycle() {
        let (fake, fetcher) = setup();
        let (tx, mut rx) = mpsc::channel(16);
        let handle = spawn(fetcher, Duration::from_secs(10), tx);
        rx.recv().await.unwrap().unwrap();

        handle.refresh();
        rx.recv().await.unwrap().unwrap();
        assert_eq!(fake.fetch_count(), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_task_and_drops_in_flight_result() {
        let (fake, fetcher) = setup();
        fake.set_state_delay(Duration::from_millis(300));
        let (tx, mut rx) = mpsc::channel(16);
        let handle = spawn(fetcher, Duration::from_millis(500), tx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(handle.is_finished());
        assert!(rx.recv().await.is_none());
        assert_eq!(fake.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exits_when_receiver_dropped() {
        let (_fake, fetcher) = setup();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = spawn(fetcher, Duration::from_millis(100), tx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }
}
