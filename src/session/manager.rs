use super::report::Report;
use super::state::Session;
use crate::db::{Database, SessionClaim};
use crate::error::{ConsolidateError, Result};
use crate::events::{Event, EventHub};
use crate::executor::{ExecContext, ExecutionMode};
use crate::scanner::SpaceProbe;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A submitted session, tracked until its report is collected.
struct Run {
    share: String,
    subfolder: PathBuf,
    cancel: CancellationToken,
    /// Holds `None` until the task has finished and written its report.
    done: watch::Receiver<Option<Report>>,
}

impl Run {
    fn is_active(&self) -> bool {
        self.done.borrow().is_none()
    }
}

/// Two targets overlap when they are in the same share and one subfolder
/// equals or contains the other.
pub(crate) fn overlaps(share_a: &str, sub_a: &Path, share_b: &str, sub_b: &Path) -> bool {
    share_a == share_b && (sub_a.starts_with(sub_b) || sub_b.starts_with(sub_a))
}

/// Runs sessions as detached background tasks.
///
/// `submit` returns at once with the session id; the report becomes
/// available through that id only after the task has finished.
pub struct SessionManager {
    probe: Arc<dyn SpaceProbe>,
    events: EventHub,
    db: Arc<Database>,
    verify_checksum: bool,
    runs: Mutex<HashMap<Uuid, Run>>,
}

impl SessionManager {
    pub fn new(
        probe: Arc<dyn SpaceProbe>,
        events: EventHub,
        db: Arc<Database>,
        verify_checksum: bool,
    ) -> Self {
        Self { probe, events, db, verify_checksum, runs: Mutex::new(HashMap::new()) }
    }

    /// Start executing `session` in the background.
    ///
    /// Rejected with `SessionConflict` when an active session targets an
    /// overlapping subfolder of the same share, whether it runs in this
    /// manager or in another process sharing the history database.
    pub async fn submit(&self, mut session: Session, mode: ExecutionMode) -> Result<Uuid> {
        let plan = session.check_executable()?.clone();
        let id = session.id();

        let mut runs = self.runs.lock().await;
        if runs.values().any(|r| {
            r.is_active() && overlaps(&r.share, &r.subfolder, &plan.share, &plan.subfolder)
        }) {
            return Err(ConsolidateError::SessionConflict {
                share: plan.share.clone(),
                subfolder: plan.subfolder.display().to_string(),
            });
        }

        match self.db.insert_session(id, &plan, mode) {
            Ok(SessionClaim::Recorded) => {}
            Ok(SessionClaim::Overlapping { id: other, subfolder }) => {
                warn!(
                    "Session {} on {}/{} is already running elsewhere",
                    other, plan.share, subfolder
                );
                return Err(ConsolidateError::SessionConflict {
                    share: plan.share.clone(),
                    subfolder: plan.subfolder.display().to_string(),
                });
            }
            Err(e) => warn!("Failed to record session {} in history: {:#}", id, e),
        }

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(None);

        runs.insert(
            id,
            Run {
                share: plan.share.clone(),
                subfolder: plan.subfolder.clone(),
                cancel: cancel.clone(),
                done: done_rx,
            },
        );
        drop(runs);

        let probe = Arc::clone(&self.probe);
        let events = self.events.clone();
        let db = Arc::clone(&self.db);
        let verify_checksum = self.verify_checksum;

        info!("Session {} submitted ({}) for {}/{}", id, mode, plan.share, plan.subfolder.display());

        tokio::task::spawn_blocking(move || {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                let ctx = ExecContext {
                    session_id: id,
                    probe: probe.as_ref(),
                    events: &events,
                    cancel: &cancel,
                    verify_checksum,
                };
                session.execute(mode, &ctx).cloned()
            }));

            let report = match result {
                Ok(Ok(report)) => report,
                Ok(Err(e)) => {
                    error!("Session {} failed to execute: {}", id, e);
                    Report::from_error(id, &plan, mode, e)
                }
                Err(_) => {
                    error!("Session {} execution panicked!", id);
                    Report::from_error(id, &plan, mode, "execution panicked")
                }
            };

            if let Some(message) = &report.error {
                events.publish(Event::SessionError { session_id: id, message: message.clone() });
            }

            // Persist before signalling, so a finished report is always in history.
            if let Err(e) = db.finish_session(&report) {
                warn!("Failed to store report for session {}: {:#}", id, e);
            }

            let _ = done_tx.send(Some(report));
        });

        Ok(id)
    }

    /// The finished report, or `None` while the session is still running.
    ///
    /// A returned report is handed over once: the run is forgotten and later
    /// lookups read it from history instead.
    pub async fn report(&self, id: Uuid) -> Result<Option<Report>> {
        let mut runs = self.runs.lock().await;
        let run = runs.get(&id).ok_or(ConsolidateError::UnknownSession(id))?;
        let report = run.done.borrow().clone();
        if report.is_some() {
            runs.remove(&id);
        }
        Ok(report)
    }

    /// Wait for the session to finish and return its report; the run is then forgotten.
    pub async fn wait(&self, id: Uuid) -> Result<Report> {
        let mut done = {
            let runs = self.runs.lock().await;
            runs.get(&id).ok_or(ConsolidateError::UnknownSession(id))?.done.clone()
        };

        let report = done
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ConsolidateError::TaskFailed(format!("session {id} ended without a report")))?
            .clone();

        self.runs.lock().await.remove(&id);
        report.ok_or_else(|| ConsolidateError::TaskFailed(format!("session {id} has no report")))
    }

    /// Request cancellation; the run stops at the next operation boundary.
    pub async fn cancel(&self, id: Uuid) -> Result<()> {
        let runs = self.runs.lock().await;
        let run = runs.get(&id).ok_or(ConsolidateError::UnknownSession(id))?;
        run.cancel.cancel();
        info!("Cancellation requested for session {}", id);
        Ok(())
    }
}
