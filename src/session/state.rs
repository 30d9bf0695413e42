use super::report::Report;
use crate::error::{ConsolidateError, Result};
use crate::executor::{self, ExecContext, ExecutionMode};
use crate::planner::{build_plan, MovePlan, PlanRequest};
use crate::scanner::validation::validate_share_name;
use crate::scanner::Topology;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Where a session is in the select-share / select-target / execute flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    AwaitingShare,
    AwaitingTargetAndDisk,
    Ready,
    /// Terminal: a new consolidation needs a new session.
    Executed,
}

impl SessionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingShare => "awaiting_share",
            Self::AwaitingTargetAndDisk => "awaiting_target_and_disk",
            Self::Ready => "ready",
            Self::Executed => "executed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One consolidation, from share selection to its final report.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    state: SessionState,
    topology: Topology,
    safety_margin: u64,
    share: Option<String>,
    plan: Option<MovePlan>,
    report: Option<Report>,
}

impl Session {
    pub fn new(topology: Topology, safety_margin: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::AwaitingShare,
            topology,
            safety_margin,
            share: None,
            plan: None,
            report: None,
        }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub fn share(&self) -> Option<&str> {
        self.share.as_deref()
    }

    pub const fn plan(&self) -> Option<&MovePlan> {
        self.plan.as_ref()
    }

    pub const fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    fn require(&self, action: &'static str, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ConsolidateError::InvalidTransition { action, state: self.state })
        }
    }

    /// Choose the share. Allowed again before execution; discards any plan.
    pub fn select_share(&mut self, share: &str) -> Result<()> {
        self.require(
            "select a share",
            &[SessionState::AwaitingShare, SessionState::AwaitingTargetAndDisk, SessionState::Ready],
        )?;
        validate_share_name(share, self.topology.reserved_prefixes())?;
        if !self.topology.has_share(share) {
            return Err(ConsolidateError::InvalidTarget(format!("share '{share}' not found")));
        }

        self.share = Some(share.to_string());
        self.plan = None;
        self.state = SessionState::AwaitingTargetAndDisk;
        Ok(())
    }

    /// Choose subfolder and destination disk and build the plan.
    ///
    /// On a planning error the session stays where it was.
    pub fn set_target(&mut self, subfolder: &str, destination_disk: &str) -> Result<&MovePlan> {
        self.require("set a target", &[SessionState::AwaitingTargetAndDisk, SessionState::Ready])?;
        if subfolder.trim().is_empty() || destination_disk.trim().is_empty() {
            return Err(ConsolidateError::InvalidInput(
                "both a subfolder and a destination disk are required".to_string(),
            ));
        }
        let share = self.share.as_deref().ok_or(ConsolidateError::InvalidTransition {
            action: "set a target",
            state: self.state,
        })?;

        let plan = build_plan(
            &self.topology,
            &PlanRequest {
                share,
                subfolder,
                destination_disk: destination_disk.trim(),
                safety_margin: self.safety_margin,
            },
        )?;

        self.state = SessionState::Ready;
        Ok(self.plan.insert(plan))
    }

    /// Explicitly leave a path out of the consolidation.
    pub fn exclude(&mut self, relative_path: &Path) -> Result<()> {
        self.require("exclude a path", &[SessionState::Ready])?;
        match self.plan.as_mut() {
            Some(plan) => plan.exclude(relative_path),
            None => Err(ConsolidateError::InvalidTransition {
                action: "exclude a path",
                state: self.state,
            }),
        }
    }

    /// Check the session may execute now, without changing it.
    pub fn check_executable(&self) -> Result<&MovePlan> {
        self.require("execute", &[SessionState::Ready])?;
        let plan = self
            .plan
            .as_ref()
            .ok_or(ConsolidateError::InvalidTransition { action: "execute", state: self.state })?;
        let unresolved = plan.unresolved_conflicts().count();
        if unresolved > 0 {
            return Err(ConsolidateError::ConflictDetected { count: unresolved });
        }
        Ok(plan)
    }

    /// Run the plan and move to `Executed`.
    ///
    /// Errors only when the session cannot execute (wrong state, unresolved
    /// conflicts); the session is then unchanged. Once execution starts the
    /// session is terminal, and executor errors are captured in the report.
    pub fn execute(&mut self, mode: ExecutionMode, ctx: &ExecContext<'_>) -> Result<&Report> {
        let plan = self.check_executable()?;

        let report = match executor::execute(plan, mode, ctx) {
            Ok(result) => Report::from_result(self.id, plan, result),
            Err(e) => {
                warn!("Session {} could not execute: {}", self.id, e);
                Report::from_error(self.id, plan, mode, e)
            }
        };

        info!(
            "Session {} executed ({}): {} moved, {} skipped, {} failed",
            self.id, mode, report.moved, report.skipped, report.failed
        );

        self.state = SessionState::Executed;
        Ok(self.report.insert(report))
    }
}
