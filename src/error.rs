use crate::session::SessionState;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the consolidation engine.
///
/// Per-file move failures are not represented here: they are recorded in the
/// execution result (see [`crate::executor::MoveFailure`]) and never abort a plan.
#[derive(Debug, Error)]
pub enum ConsolidateError {
    /// The share, subfolder, or destination disk does not resolve to anything on disk.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Malformed user input, rejected before any filesystem access.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "not enough free space on {disk}: {required} bytes required (including safety margin), \
         {available} bytes available"
    )]
    NoDiskSpace { disk: String, required: u64, available: u64 },

    #[error("{count} conflicting path(s) must be resolved or excluded before executing")]
    ConflictDetected { count: usize },

    #[error("another session is already consolidating {share}/{subfolder}")]
    SessionConflict { share: String, subfolder: String },

    #[error("cannot {action} while the session is {state}")]
    InvalidTransition { action: &'static str, state: SessionState },

    #[error("unknown session {0}")]
    UnknownSession(Uuid),

    /// Unrecoverable I/O on the destination; remaining operations are abandoned.
    #[error("fatal I/O error on {}: {source}", path.display())]
    FatalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("background task failed: {0}")]
    TaskFailed(String),
}

impl ConsolidateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub type Result<T, E = ConsolidateError> = std::result::Result<T, E>;
