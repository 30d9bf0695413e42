use crate::executor::{ExecutionMode, ExecutionResult, OperationReport};
use crate::planner::{Conflict, MovePlan};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Structured, replayable account of one session's execution.
///
/// Carries data only; presentation layers decide how to render it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub session_id: Uuid,
    pub share: String,
    pub subfolder: PathBuf,
    pub destination_disk: String,
    pub mode: ExecutionMode,
    pub planned_operations: usize,
    pub planned_bytes: u64,
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_moved: u64,
    pub conflicts: Vec<Conflict>,
    pub excluded: Vec<PathBuf>,
    pub operations: Vec<OperationReport>,
    pub removed_directories: Vec<PathBuf>,
    pub cancelled: bool,
    pub aborted: Option<String>,
    /// Set when execution was refused before any operation ran.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Report {
    pub(crate) fn from_result(session_id: Uuid, plan: &MovePlan, result: ExecutionResult) -> Self {
        let finished_at = result.finished_at.unwrap_or_else(Utc::now);
        Self {
            session_id,
            mode: result.mode,
            moved: result.moved,
            skipped: result.skipped,
            failed: result.failed,
            bytes_moved: result.bytes_moved,
            operations: result.operations,
            removed_directories: result.removed_directories,
            cancelled: result.cancelled,
            aborted: result.aborted,
            error: None,
            started_at: result.started_at,
            finished_at,
            ..Self::planned(session_id, plan, result.mode)
        }
    }

    pub(crate) fn from_error(
        session_id: Uuid,
        plan: &MovePlan,
        mode: ExecutionMode,
        error: impl ToString,
    ) -> Self {
        Self { error: Some(error.to_string()), ..Self::planned(session_id, plan, mode) }
    }

    fn planned(session_id: Uuid, plan: &MovePlan, mode: ExecutionMode) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            share: plan.share.clone(),
            subfolder: plan.subfolder.clone(),
            destination_disk: plan.destination_disk.clone(),
            mode,
            planned_operations: plan.operations.len(),
            planned_bytes: plan.total_bytes,
            moved: 0,
            skipped: 0,
            failed: 0,
            bytes_moved: 0,
            conflicts: plan.conflicts.clone(),
            excluded: plan.excluded.iter().cloned().collect(),
            operations: Vec::new(),
            removed_directories: Vec::new(),
            cancelled: false,
            aborted: None,
            error: None,
            started_at: now,
            finished_at: now,
        }
    }

    /// Every planned operation was applied (or, in a dry run, would be).
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
            && self.aborted.is_none()
            && !self.cancelled
            && self.failed == 0
            && self.skipped == 0
    }
}
