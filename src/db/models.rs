use crate::session::Report;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a session row in the history table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
    /// The process died while the session was running.
    Interrupted,
}

impl SessionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }

    /// Status a finished report is filed under.
    pub fn of_report(report: &Report) -> Self {
        if report.error.is_some() || report.aborted.is_some() {
            Self::Failed
        } else if report.cancelled {
            Self::Cancelled
        } else {
            Self::Completed
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SessionStatus {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            "interrupted" => Ok(Self::Interrupted),
            _ => Err(format!("invalid session status: {s}")),
        }
    }
}

/// One row of session history.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub id: String,
    pub share: String,
    pub subfolder: String,
    pub destination_disk: String,
    pub mode: String,
    pub status: SessionStatus,
    pub created_at: Option<String>,
    pub finished_at: Option<String>,
    pub moved: Option<i64>,
    pub skipped: Option<i64>,
    pub failed: Option<i64>,
    pub bytes_moved: Option<u64>,
}
