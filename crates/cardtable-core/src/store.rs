// Persistence port for the per-session client state, plus its SQLite and
// in-memory implementations.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};

use crate::action_log::ActionLogEntry;
use crate::protocol::ActionId;

/// Everything that survives a restart of the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSession {
    pub last_action_id: Option<ActionId>,
    /// Oldest first.
    pub action_log: Vec<ActionLogEntry>,
    pub room_code: Option<String>,
}

/// Load/save/clear of [`PersistedSession`]. The session loop is the only
/// writer.
pub trait SessionStore: Send + Sync {
    /// Returns an empty session when nothing has been saved.
    fn load(&self) -> Result<PersistedSession>;
    fn save(&self, session: &PersistedSession) -> Result<()>;
    /// Drop everything. Called when the session ends.
    fn clear(&self) -> Result<()>;
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn load(&self) -> Result<PersistedSession> {
        (**self).load()
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        (**self).save(session)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store for tests and for running without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<PersistedSession>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: PersistedSession) -> Self {
        MemoryStore {
            inner: Mutex::new(session),
            saves: Mutex::new(0),
        }
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, PersistedSession>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("memory store mutex poisoned"))
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<PersistedSession> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        *self.lock()? = session.clone();
        if let Ok(mut n) = self.saves.lock() {
            *n += 1;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock()? = PersistedSession::default();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQLite store
// ---------------------------------------------------------------------------

const LAST_ACTION_ID_KEY: &str = "last_action_id";
const ACTION_LOG_KEY: &str = "action_log";
const ROOM_CODE_KEY: &str = "room_code";
const SAVED_AT_KEY: &str = "saved_at";

/// SQLite-backed key-value store. Values are JSON text.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the tables exist.
    /// Pass `":memory:"` for an ephemeral database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open session database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS session_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS session_meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create session schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("session database mutex poisoned"))
    }

    /// When the session was last saved, if ever.
    pub fn last_saved_at(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM session_meta WHERE key = ?1",
                params![SAVED_AT_KEY],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query session_meta")?;

        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("bad saved_at timestamp {s:?}"))
        })
        .transpose()
    }

    fn load_value<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM session_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to query session state {key}"))?;

        raw.map(|s| {
            serde_json::from_str(&s).with_context(|| format!("failed to deserialize {key}"))
        })
        .transpose()
    }

    fn save_value<T: Serialize>(tx: &rusqlite::Transaction<'_>, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize {key}"))?;
        tx.execute(
            "INSERT OR REPLACE INTO session_state (key, value) VALUES (?1, ?2)",
            params![key, json],
        )
        .with_context(|| format!("failed to save {key}"))?;
        Ok(())
    }
}

impl SessionStore for SqliteStore {
    fn load(&self) -> Result<PersistedSession> {
        let conn = self.conn()?;
        Ok(PersistedSession {
            last_action_id: Self::load_value::<Option<ActionId>>(&conn, LAST_ACTION_ID_KEY)?
                .flatten(),
            action_log: Self::load_value::<Vec<ActionLogEntry>>(&conn, ACTION_LOG_KEY)?
                .unwrap_or_default(),
            room_code: Self::load_value::<Option<String>>(&conn, ROOM_CODE_KEY)?.flatten(),
        })
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        Self::save_value(&tx, LAST_ACTION_ID_KEY, &session.last_action_id)?;
        Self::save_value(&tx, ACTION_LOG_KEY, &session.action_log)?;
        Self::save_value(&tx, ROOM_CODE_KEY, &session.room_code)?;
        tx.execute(
            "INSERT OR REPLACE INTO session_meta (key, value) VALUES (?1, ?2)",
            params![SAVED_AT_KEY, Utc::now().to_rfc3339()],
        )
        .context("failed to stamp session_meta")?;
        tx.commit().context("failed to commit session save")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        tx.execute("DELETE FROM session_state", [])
            .context("failed to delete session state")?;
        tx.execute("DELETE FROM session_meta", [])
            .context("failed to delete session meta")?;
        tx.commit().context("failed to commit session clear")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
