mod models;
mod session_queries;

pub use models::{SessionRecord, SessionStatus};
pub use session_queries::SessionClaim;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Schema migrations, applied in order; the index + 1 is stored as `user_version`.
const MIGRATIONS: &[(&str, &str)] =
    &[("001_initial", include_str!("../../migrations/001_initial.sql"))];

/// Session history, one row per submitted session.
///
/// The connection sits behind a Mutex; each session writes twice, at submit
/// and when its report is final.
pub struct Database {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open the history database, creating it and its directory if needed.
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open history database at {path}"))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Mutex::new(Connection::open_in_memory()?) })
    }

    /// Bring the schema up to date.
    pub fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn();
        let current: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .context("Failed to read schema version")?;
        let current = usize::try_from(current).unwrap_or_default();

        for (index, (name, sql)) in MIGRATIONS.iter().enumerate().skip(current) {
            info!("Applying migration {}", name);
            let tx = conn.transaction()?;
            tx.execute_batch(sql).with_context(|| format!("Migration {name} failed"))?;
            tx.pragma_update(None, "user_version", index as i64 + 1)?;
            tx.commit()?;
        }

        debug!("History schema at version {}", MIGRATIONS.len().max(current));
        Ok(())
    }

    /// Lock the connection. A panic in another holder does not poison history.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark sessions left `running` by a process that no longer exists as `interrupted`.
    ///
    /// Their reports were never written; the files they moved stay moved and
    /// a fresh plan picks up whatever is left.
    pub fn recover_stale_sessions(&self) -> Result<usize> {
        let conn = self.conn();
        interrupt_dead_sessions(&conn)
    }
}

/// Whether the process that recorded a `running` row is still alive.
fn process_alive(pid: Option<i64>) -> bool {
    pid.is_some_and(|pid| {
        pid == i64::from(std::process::id()) || Path::new(&format!("/proc/{pid}")).exists()
    })
}

fn interrupt_dead_sessions(conn: &Connection) -> Result<usize> {
    let mut stmt = conn.prepare("SELECT id, pid FROM sessions WHERE status = 'running'")?;
    let running = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut interrupted = 0usize;
    for (id, pid) in running {
        if process_alive(pid) {
            continue;
        }
        interrupted += conn.execute(
            "UPDATE sessions SET status = 'interrupted', \
             finished_at = strftime('%Y-%m-%dT%H:%M:%fZ','now') \
             WHERE id = ?1 AND status = 'running'",
            [&id],
        )?;
    }

    if interrupted > 0 {
        warn!("Marked {} session(s) left running by a dead process as interrupted", interrupted);
    }
    Ok(interrupted)
}
