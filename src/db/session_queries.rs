use super::models::{SessionRecord, SessionStatus};
use super::{interrupt_dead_sessions, process_alive, Database};
use crate::executor::ExecutionMode;
use crate::planner::MovePlan;
use crate::session::{overlaps, Report};
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::path::Path;
use uuid::Uuid;

const SESSION_COLUMNS: &str = "id, share, subfolder, destination_disk, mode, status, \
     created_at, finished_at, moved, skipped, failed, bytes_moved";

/// Map a row from the sessions table into a `SessionRecord`.
fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    let status_str: String = row.get(5)?;
    let status = SessionStatus::try_from(status_str.as_str()).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::from(e))
    })?;
    Ok(SessionRecord {
        id: row.get(0)?,
        share: row.get(1)?,
        subfolder: row.get(2)?,
        destination_disk: row.get(3)?,
        mode: row.get(4)?,
        status,
        created_at: row.get(6)?,
        finished_at: row.get(7)?,
        moved: row.get(8)?,
        skipped: row.get(9)?,
        failed: row.get(10)?,
        bytes_moved: row.get::<_, Option<i64>>(11)?.map(|b| b as u64),
    })
}

/// Result of recording a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionClaim {
    Recorded,
    /// A live session already runs an overlapping target.
    Overlapping { id: String, subfolder: String },
}

impl Database {
    /// Record a session as running, before its task starts.
    ///
    /// Refused when a live process already runs an overlapping target of the
    /// same share. Overlap is checked and the row inserted in one immediate
    /// transaction, so concurrent processes cannot both claim a target.
    pub fn insert_session(
        &self,
        id: Uuid,
        plan: &MovePlan,
        mode: ExecutionMode,
    ) -> Result<SessionClaim> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        interrupt_dead_sessions(&tx)?;

        let mut stmt = tx.prepare(
            "SELECT id, subfolder, pid FROM sessions WHERE status = 'running' AND share = ?1",
        )?;
        let running = stmt
            .query_map(params![plan.share], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let busy = running.into_iter().find(|(_, subfolder, pid)| {
            process_alive(*pid)
                && overlaps(&plan.share, &plan.subfolder, &plan.share, Path::new(subfolder))
        });
        if let Some((other, subfolder, _)) = busy {
            tx.commit()?;
            return Ok(SessionClaim::Overlapping { id: other, subfolder });
        }

        tx.execute(
            "INSERT INTO sessions (id, share, subfolder, destination_disk, mode, status, pid)
             VALUES (?1, ?2, ?3, ?4, ?5, 'running', ?6)",
            params![
                id.to_string(),
                plan.share,
                plan.subfolder.to_string_lossy(),
                plan.destination_disk,
                mode.as_str(),
                std::process::id(),
            ],
        )?;
        tx.commit()?;
        Ok(SessionClaim::Recorded)
    }

    /// Store the final report of a session.
    pub fn finish_session(&self, report: &Report) -> Result<()> {
        let json = serde_json::to_string(report).context("Failed to serialize report")?;
        let status = SessionStatus::of_report(report);

        let conn = self.conn();
        conn.execute(
            "INSERT INTO sessions (id, share, subfolder, destination_disk, mode, status,
                                   finished_at, moved, skipped, failed, bytes_moved, report_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, strftime('%Y-%m-%dT%H:%M:%fZ','now'),
                     ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                finished_at = excluded.finished_at,
                moved = excluded.moved,
                skipped = excluded.skipped,
                failed = excluded.failed,
                bytes_moved = excluded.bytes_moved,
                report_json = excluded.report_json",
            params![
                report.session_id.to_string(),
                report.share,
                report.subfolder.to_string_lossy(),
                report.destination_disk,
                report.mode.as_str(),
                status.as_str(),
                report.moved as i64,
                report.skipped as i64,
                report.failed as i64,
                report.bytes_moved as i64,
                json,
            ],
        )?;
        Ok(())
    }

    /// Get a session's history row.
    pub fn get_session(&self, id: Uuid) -> Result<Option<SessionRecord>> {
        let conn = self.conn();
        let record = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id.to_string()],
                map_session_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Get the stored report of a finished session.
    pub fn get_report(&self, id: Uuid) -> Result<Option<Report>> {
        let conn = self.conn();
        let json: Option<Option<String>> = conn
            .query_row(
                "SELECT report_json FROM sessions WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match json.flatten() {
            Some(json) => Ok(Some(
                serde_json::from_str(&json)
                    .with_context(|| format!("Corrupt report stored for session {id}"))?,
            )),
            None => Ok(None),
        }
    }

    /// Most recent sessions first.
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        ))?;

        let records = stmt
            .query_map(params![limit as i64], map_session_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}
