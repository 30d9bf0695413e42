use super::support::{Array, FixedSpace};
use crate::db::{Database, SessionStatus};
use crate::error::ConsolidateError;
use crate::events::EventHub;
use crate::executor::{ExecContext, ExecutionMode};
use crate::scanner::SpaceProbe;
use crate::session::{Session, SessionManager, SessionState};
use std::io;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const FREE: u64 = 1_000_000;

fn array() -> Array {
    let array = Array::new(&["disk1", "disk2", "disk3"]);
    array.write("disk1", "Movies/Inception/Inception.mkv", 3000);
    array.write("disk1", "Movies/Inception/Subs/en.srt", 100);
    array.write("disk3", "Movies/Inception/poster.jpg", 200);
    array.write("disk3", "Movies/Heat/heat.mkv", 50);
    array
}

fn ready(array: &Array, subfolder: &str) -> Session {
    let mut session = Session::new(array.topology(FREE), 0);
    session.select_share("Movies").unwrap();
    session.set_target(subfolder, "disk2").unwrap();
    session
}

fn execute(session: &mut Session, free: u64) -> crate::error::Result<crate::session::Report> {
    let events = EventHub::new(16);
    let cancel = CancellationToken::new();
    let probe = FixedSpace(free);
    let ctx = ExecContext {
        session_id: session.id(),
        probe: &probe,
        events: &events,
        cancel: &cancel,
        verify_checksum: true,
    };
    session.execute(ExecutionMode::Force, &ctx).cloned()
}

/// Blocks every free-space query until opened, holding a run in flight.
#[derive(Default)]
struct GatedSpace {
    open: Mutex<bool>,
    opened: Condvar,
}

impl GatedSpace {
    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }
}

impl SpaceProbe for GatedSpace {
    fn available_bytes(&self, _mount_path: &Path) -> io::Result<u64> {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.opened.wait(open).unwrap();
        }
        Ok(FREE)
    }
}

fn database() -> Arc<Database> {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().unwrap();
    Arc::new(db)
}

#[test]
fn test_share_then_target_then_ready() {
    let array = array();
    let mut session = Session::new(array.topology(FREE), 0);
    assert_eq!(session.state(), SessionState::AwaitingShare);

    assert!(matches!(
        session.set_target("Inception", "disk2"),
        Err(ConsolidateError::InvalidTransition { .. })
    ));
    assert!(matches!(session.select_share("Music"), Err(ConsolidateError::InvalidTarget(_))));
    assert!(matches!(session.select_share("@system"), Err(ConsolidateError::InvalidInput(_))));
    assert_eq!(session.state(), SessionState::AwaitingShare);

    session.select_share("Movies").unwrap();
    assert_eq!(session.state(), SessionState::AwaitingTargetAndDisk);
    assert_eq!(session.share(), Some("Movies"));

    assert!(matches!(session.set_target("", "disk2"), Err(ConsolidateError::InvalidInput(_))));
    assert!(matches!(session.set_target("Inception", " "), Err(ConsolidateError::InvalidInput(_))));
    assert!(matches!(
        session.set_target("Missing", "disk2"),
        Err(ConsolidateError::InvalidTarget(_))
    ));
    assert_eq!(session.state(), SessionState::AwaitingTargetAndDisk);

    let plan = session.set_target("Inception", "disk2").unwrap();
    assert_eq!(plan.operations.len(), 3);
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.check_executable().is_ok());
}

#[test]
fn test_changing_share_discards_plan() {
    let array = array();
    let mut session = ready(&array, "Inception");
    assert!(session.plan().is_some());

    session.select_share("Movies").unwrap();
    assert_eq!(session.state(), SessionState::AwaitingTargetAndDisk);
    assert!(session.plan().is_none());
    assert!(matches!(session.check_executable(), Err(ConsolidateError::InvalidTransition { .. })));
}

#[test]
fn test_conflicts_block_until_excluded() {
    let array = array();
    array.write("disk3", "Movies/Inception/Subs/en.srt", 120);
    let mut session = ready(&array, "Inception");

    assert!(matches!(
        execute(&mut session, FREE),
        Err(ConsolidateError::ConflictDetected { count: 1 })
    ));
    assert_eq!(session.state(), SessionState::Ready);

    session.exclude(Path::new("Subs/en.srt")).unwrap();
    let report = execute(&mut session, FREE).unwrap();
    assert_eq!(report.moved, 2);
    assert_eq!(report.excluded, vec![Path::new("Subs/en.srt").to_path_buf()]);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(session.state(), SessionState::Executed);
}

#[test]
fn test_executed_is_terminal() {
    let array = array();
    let mut session = ready(&array, "Inception");
    let report = execute(&mut session, FREE).unwrap();
    assert!(report.succeeded());
    assert_eq!(report.bytes_moved, 3300);
    assert!(session.report().is_some());

    assert!(matches!(session.select_share("Movies"), Err(ConsolidateError::InvalidTransition { .. })));
    assert!(matches!(
        session.exclude(Path::new("Inception.mkv")),
        Err(ConsolidateError::InvalidTransition { .. })
    ));
    assert!(matches!(execute(&mut session, FREE), Err(ConsolidateError::InvalidTransition { .. })));
}

#[test]
fn test_refused_execution_is_captured_in_report() {
    let array = array();
    let mut session = ready(&array, "Inception");

    let report = execute(&mut session, 10).unwrap();

    assert!(report.error.as_deref().unwrap().contains("not enough free space"));
    assert_eq!(report.moved, 0);
    assert_eq!(report.planned_operations, 3);
    assert!(!report.succeeded());
    assert_eq!(session.state(), SessionState::Executed);
    assert!(array.disk("disk1").join("Movies/Inception/Inception.mkv").is_file());
}

#[tokio::test]
async fn test_manager_runs_in_background_and_stores_report() {
    let array = array();
    let db = database();
    let manager = SessionManager::new(Arc::new(FixedSpace(FREE)), EventHub::new(16), db.clone(), true);

    let id = manager.submit(ready(&array, "Inception"), ExecutionMode::Force).await.unwrap();
    let report = manager.wait(id).await.unwrap();

    assert_eq!(report.session_id, id);
    assert_eq!(report.moved, 3);
    assert!(matches!(manager.report(id).await, Err(ConsolidateError::UnknownSession(_))));
    assert!(array.disk("disk2").join("Movies/Inception/Subs/en.srt").is_file());

    let stored = db.get_report(id).unwrap().unwrap();
    assert_eq!(stored.bytes_moved, report.bytes_moved);
    assert_eq!(db.get_session(id).unwrap().unwrap().status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_manager_rejects_overlapping_sessions() {
    let array = array();
    let gate = Arc::new(GatedSpace::default());
    let manager = SessionManager::new(gate.clone(), EventHub::new(16), database(), true);

    let first = manager.submit(ready(&array, "Inception"), ExecutionMode::DryRun).await.unwrap();
    assert!(manager.report(first).await.unwrap().is_none());

    let nested = manager.submit(ready(&array, "Inception/Subs"), ExecutionMode::DryRun).await;
    assert!(matches!(nested, Err(ConsolidateError::SessionConflict { .. })));

    let other = manager.submit(ready(&array, "Heat"), ExecutionMode::DryRun).await.unwrap();

    gate.open();
    assert_eq!(manager.wait(first).await.unwrap().moved, 3);
    assert_eq!(manager.wait(other).await.unwrap().moved, 1);

    // Finished runs no longer block the same target.
    let again = manager.submit(ready(&array, "Inception/Subs"), ExecutionMode::DryRun).await;
    assert!(again.is_ok());
}

#[tokio::test]
async fn test_manager_rejects_unexecutable_sessions() {
    let array = array();
    let manager = SessionManager::new(Arc::new(FixedSpace(FREE)), EventHub::new(16), database(), true);

    let mut session = Session::new(array.topology(FREE), 0);
    session.select_share("Movies").unwrap();
    let err = manager.submit(session, ExecutionMode::DryRun).await.unwrap_err();
    assert!(matches!(err, ConsolidateError::InvalidTransition { .. }));

    let unknown = uuid::Uuid::new_v4();
    assert!(matches!(manager.wait(unknown).await, Err(ConsolidateError::UnknownSession(_))));
    assert!(matches!(manager.cancel(unknown).await, Err(ConsolidateError::UnknownSession(_))));
}

#[tokio::test]
async fn test_overlap_is_rejected_across_managers_sharing_history() {
    let array = array();
    let open = || {
        let db = Database::open(&array.config.db_path).unwrap();
        db.run_migrations().unwrap();
        Arc::new(db)
    };
    let gate = Arc::new(GatedSpace::default());
    let first_manager = SessionManager::new(gate.clone(), EventHub::new(16), open(), true);
    let second_manager =
        SessionManager::new(Arc::new(FixedSpace(FREE)), EventHub::new(16), open(), true);

    let first = first_manager.submit(ready(&array, "Inception"), ExecutionMode::Force).await.unwrap();

    let same = second_manager.submit(ready(&array, "Inception"), ExecutionMode::Force).await;
    assert!(matches!(same, Err(ConsolidateError::SessionConflict { .. })));
    let nested = second_manager.submit(ready(&array, "Inception/Subs"), ExecutionMode::Force).await;
    assert!(matches!(nested, Err(ConsolidateError::SessionConflict { .. })));

    let other = second_manager.submit(ready(&array, "Heat"), ExecutionMode::Force).await.unwrap();
    assert_eq!(second_manager.wait(other).await.unwrap().moved, 1);

    gate.open();
    let report = first_manager.wait(first).await.unwrap();
    assert_eq!(report.moved, 3);
    assert_eq!(report.failed, 0);
    assert!(array.disk("disk2").join("Movies/Inception/Inception.mkv").is_file());

    let again = second_manager.submit(ready(&array, "Inception"), ExecutionMode::DryRun).await.unwrap();
    assert_eq!(second_manager.wait(again).await.unwrap().moved, 0);
}

#[tokio::test]
async fn test_collected_reports_are_forgotten() {
    let array = array();
    let gate = Arc::new(GatedSpace::default());
    let db = database();
    let manager = SessionManager::new(gate.clone(), EventHub::new(16), db.clone(), true);

    let id = manager.submit(ready(&array, "Inception"), ExecutionMode::DryRun).await.unwrap();
    assert!(manager.report(id).await.unwrap().is_none());
    assert!(manager.report(id).await.unwrap().is_none());

    gate.open();
    let report = loop {
        if let Some(report) = manager.report(id).await.unwrap() {
            break report;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    assert_eq!(report.moved, 3);

    assert!(matches!(manager.report(id).await, Err(ConsolidateError::UnknownSession(_))));
    assert!(matches!(manager.cancel(id).await, Err(ConsolidateError::UnknownSession(_))));
    assert_eq!(db.get_report(id).unwrap().unwrap().moved, 3);
}
