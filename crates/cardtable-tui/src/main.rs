// Card table client entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open the session database and restore the saved session
// 4. Build the authority client and join the configured room
// 5. Create mpsc channels
// 6. Spawn the poller and the session loop
// 7. Run the TUI until the player exits or the session ends
// 8. Cleanup on exit

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cardtable_app::authority::{Authority, HttpAuthority};
use cardtable_app::fetcher::SnapshotFetcher;
use cardtable_app::intents::IntentSubmitter;
use cardtable_app::poller;
use cardtable_app::session::{self, Session, SessionExit};
use cardtable_core::config;
use cardtable_core::reconciler::Reconciler;
use cardtable_core::store::SqliteStore;
use cardtable_tui::tui;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("cardtable starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: authority={}, poll every {} ms",
        config.server.base_url,
        config.poll_interval.as_millis()
    );

    // 3. Open the session database
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db_path = config.db_path.to_string_lossy();
    let store = SqliteStore::open(&db_path).context("failed to open session database")?;
    match store.last_saved_at() {
        Ok(Some(saved_at)) => info!("Found session saved at {saved_at}"),
        Ok(None) => info!("No saved session"),
        Err(e) => warn!("Could not read session timestamp: {e:#}"),
    }
    let reconciler = Reconciler::new(store).context("failed to restore session")?;

    // 4. Authority client and room
    let authority: Arc<dyn Authority> = Arc::new(
        HttpAuthority::new(&config.server.base_url).context("failed to build authority client")?,
    );
    let mut session = Session::new(reconciler, IntentSubmitter::new(Arc::clone(&authority)));

    let (room, name) = config
        .session
        .identity()
        .context("set [session] room_code and player_name in config/cardtable.toml")?;
    session
        .join(room, name)
        .await
        .with_context(|| format!("could not join room {room} as {name}"))?;
    let room = session.reconciler().room_code().map(str::to_string);

    // 5. Channels
    let (fetch_tx, fetch_rx) = mpsc::channel(16);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    // 6. Poller and session loop
    let poller = poller::spawn(SnapshotFetcher::new(authority), config.poll_interval, fetch_tx);
    let session_handle = tokio::spawn(session::run(session, fetch_rx, cmd_rx, ui_tx, poller));

    // 7. TUI; blocks until the player exits or the session ends. Dropping
    //    the command sender on return stops the session loop.
    info!("Client ready");
    if let Err(e) = tui::run(ui_rx, cmd_tx, room).await {
        error!("TUI error: {e:#}");
    }

    // 8. Cleanup: wait for the session loop to stop the poller
    let exit = tokio::time::timeout(Duration::from_secs(5), session_handle).await;
    match exit {
        Ok(Ok(SessionExit::Ended(end))) => {
            let destination = end.destination();
            let destination = if destination.starts_with('/') {
                format!("{}{destination}", config.server.base_url)
            } else {
                destination.to_string()
            };
            println!("Session ended ({end}). Continue at {destination}");
        }
        Ok(Ok(other)) => info!("Session loop finished: {other:?}"),
        Ok(Err(e)) => error!("Session loop panicked: {e}"),
        Err(_) => warn!("Session loop did not stop in time"),
    }

    info!("cardtable shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which is used by the TUI).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("cardtable.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cardtable=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
