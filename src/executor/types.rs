use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Perform every read-side check, mutate nothing.
    DryRun,
    /// Perform the moves.
    Force,
}

impl ExecutionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::Force => "force",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ExecutionMode {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "dry_run" => Ok(Self::DryRun),
            "force" => Ok(Self::Force),
            _ => Err(format!("invalid execution mode: {s}")),
        }
    }
}

/// Why a single file could not be moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MoveFailure {
    #[error("source file not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("destination disk is full")]
    DiskFull,
    #[error("destination disk is no longer mounted")]
    DestinationUnavailable,
    #[error("destination parent cannot be created")]
    ParentNotCreatable,
    #[error("size changed since planning ({planned} -> {actual} bytes)")]
    SizeChanged { planned: u64, actual: u64 },
    #[error("copy verification failed")]
    VerifyMismatch,
    #[error("I/O error: {0}")]
    Io(String),
}

impl MoveFailure {
    pub(crate) fn from_io(err: &io::Error) -> Self {
        if err.raw_os_error() == Some(libc::ENOSPC) {
            return Self::DiskFull;
        }
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err.to_string()),
        }
    }

    /// Failures that make every later operation pointless.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::DiskFull | Self::DestinationUnavailable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("destination already exists")]
    DestinationExists,
    #[error("insufficient space ({needed} bytes needed, {available} bytes left in budget)")]
    InsufficientSpace { needed: u64, available: u64 },
    #[error("run cancelled")]
    Cancelled,
    #[error("run aborted after a fatal error")]
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    /// Moved, or in a dry run, would have been moved.
    Moved,
    Skipped(SkipReason),
    Failed(MoveFailure),
}

impl Outcome {
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Moved => "moved",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Moved => None,
            Self::Skipped(r) => Some(r.to_string()),
            Self::Failed(f) => Some(f.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReport {
    pub relative_path: PathBuf,
    pub source_disk: String,
    pub destination_disk: String,
    pub size_bytes: u64,
    pub outcome: Outcome,
}

/// Result of applying (or previewing) a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub mode: ExecutionMode,
    pub operations: Vec<OperationReport>,
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_moved: u64,
    pub cancelled: bool,
    /// Set when a fatal error stopped the run early.
    pub aborted: Option<String>,
    /// Source directories removed because they became empty.
    pub removed_directories: Vec<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionResult {
    pub(crate) fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            operations: Vec::new(),
            moved: 0,
            skipped: 0,
            failed: 0,
            bytes_moved: 0,
            cancelled: false,
            aborted: None,
            removed_directories: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn record(&mut self, report: OperationReport) {
        match &report.outcome {
            Outcome::Moved => {
                self.moved += 1;
                self.bytes_moved += report.size_bytes;
            }
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
        self.operations.push(report);
    }
}
