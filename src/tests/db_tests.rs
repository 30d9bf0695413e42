use super::support::Array;
use crate::db::{Database, SessionClaim, SessionStatus};
use crate::executor::ExecutionMode;
use crate::planner::{build_plan, MovePlan, PlanRequest};
use crate::session::Report;
use std::path::PathBuf;
use uuid::Uuid;

fn migrated() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().unwrap();
    db
}

fn sample_plan() -> (Array, MovePlan) {
    let array = Array::new(&["disk1", "disk2"]);
    array.write("disk1", "Movies/Inception/a.mkv", 10);
    let plan = build_plan(
        &array.topology(1000),
        &PlanRequest {
            share: "Movies",
            subfolder: "Inception",
            destination_disk: "disk2",
            safety_margin: 0,
        },
    )
    .unwrap();
    (array, plan)
}

#[test]
fn test_open_and_migrate() {
    let db = migrated();
    db.run_migrations().unwrap();
    let conn = db.conn();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='sessions'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_open_creates_parent_directory() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("plugin/history.db");
    let db = Database::open(&path.to_string_lossy()).unwrap();
    db.run_migrations().unwrap();
    assert!(path.is_file());
}

#[test]
fn test_session_lifecycle() {
    let db = migrated();
    let (_array, plan) = sample_plan();
    let id = Uuid::new_v4();

    db.insert_session(id, &plan, ExecutionMode::Force).unwrap();
    let record = db.get_session(id).unwrap().unwrap();
    assert_eq!(record.status, SessionStatus::Running);
    assert_eq!(record.share, "Movies");
    assert_eq!(record.subfolder, "Inception");
    assert_eq!(record.mode, "force");
    assert!(record.finished_at.is_none());
    assert!(db.get_report(id).unwrap().is_none());

    let report = Report::from_error(id, &plan, ExecutionMode::Force, "destination vanished");
    db.finish_session(&report).unwrap();

    let record = db.get_session(id).unwrap().unwrap();
    assert_eq!(record.status, SessionStatus::Failed);
    assert!(record.finished_at.is_some());
    assert_eq!(record.moved, Some(0));

    let stored = db.get_report(id).unwrap().unwrap();
    assert_eq!(stored.session_id, id);
    assert_eq!(stored.error.as_deref(), Some("destination vanished"));
    assert_eq!(stored.planned_operations, 1);
}

#[test]
fn test_finish_without_insert() {
    let db = migrated();
    let (_array, plan) = sample_plan();
    let id = Uuid::new_v4();

    let mut report = Report::from_error(id, &plan, ExecutionMode::DryRun, "x");
    report.error = None;
    db.finish_session(&report).unwrap();

    assert_eq!(db.get_session(id).unwrap().unwrap().status, SessionStatus::Completed);
    assert!(db.get_session(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn test_recover_stale_sessions_spares_live_processes() {
    let db = migrated();
    let (_array, plan) = sample_plan();
    let live = Uuid::new_v4();
    let dead = Uuid::new_v4();

    db.insert_session(live, &plan, ExecutionMode::Force).unwrap();
    db.conn()
        .execute(
            "INSERT INTO sessions (id, share, subfolder, destination_disk, mode, status)
             VALUES (?1, 'TV', 'Lost', 'disk2', 'force', 'running')",
            [dead.to_string()],
        )
        .unwrap();

    assert_eq!(db.recover_stale_sessions().unwrap(), 1);
    assert_eq!(db.get_session(dead).unwrap().unwrap().status, SessionStatus::Interrupted);
    assert_eq!(db.get_session(live).unwrap().unwrap().status, SessionStatus::Running);
}

#[test]
fn test_insert_refuses_overlapping_running_session() {
    let db = migrated();
    let (_array, plan) = sample_plan();
    let first = Uuid::new_v4();
    assert_eq!(db.insert_session(first, &plan, ExecutionMode::Force).unwrap(), SessionClaim::Recorded);

    let mut nested = plan.clone();
    nested.subfolder = PathBuf::from("Inception/Extras");
    let second = Uuid::new_v4();
    assert_eq!(
        db.insert_session(second, &nested, ExecutionMode::DryRun).unwrap(),
        SessionClaim::Overlapping { id: first.to_string(), subfolder: "Inception".to_string() }
    );
    assert!(db.get_session(second).unwrap().is_none());

    let mut sibling = plan.clone();
    sibling.subfolder = PathBuf::from("Inception 2");
    assert_eq!(
        db.insert_session(Uuid::new_v4(), &sibling, ExecutionMode::DryRun).unwrap(),
        SessionClaim::Recorded
    );

    let mut other_share = plan.clone();
    other_share.share = "TV".to_string();
    assert_eq!(
        db.insert_session(Uuid::new_v4(), &other_share, ExecutionMode::DryRun).unwrap(),
        SessionClaim::Recorded
    );

    // A row left by a dead process no longer blocks the target.
    db.conn()
        .execute("UPDATE sessions SET pid = NULL WHERE id = ?1", [first.to_string()])
        .unwrap();
    assert_eq!(db.insert_session(second, &nested, ExecutionMode::DryRun).unwrap(), SessionClaim::Recorded);
    assert_eq!(db.get_session(first).unwrap().unwrap().status, SessionStatus::Interrupted);
}

#[test]
fn test_finished_session_releases_target() {
    let db = migrated();
    let (_array, plan) = sample_plan();
    let first = Uuid::new_v4();
    db.insert_session(first, &plan, ExecutionMode::DryRun).unwrap();
    db.finish_session(&Report::from_error(first, &plan, ExecutionMode::DryRun, "x")).unwrap();

    assert_eq!(
        db.insert_session(Uuid::new_v4(), &plan, ExecutionMode::DryRun).unwrap(),
        SessionClaim::Recorded
    );
}

#[test]
fn test_list_sessions_newest_first() {
    let db = migrated();
    let (_array, plan) = sample_plan();
    let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for id in &ids {
        db.insert_session(*id, &plan, ExecutionMode::DryRun).unwrap();
        db.finish_session(&Report::from_error(*id, &plan, ExecutionMode::DryRun, "x")).unwrap();
    }

    let records = db.list_sessions(2).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, ids[2].to_string());
    assert_eq!(records[1].id, ids[1].to_string());
}

#[test]
fn test_status_round_trip() {
    for status in [
        SessionStatus::Running,
        SessionStatus::Completed,
        SessionStatus::Cancelled,
        SessionStatus::Failed,
        SessionStatus::Interrupted,
    ] {
        assert_eq!(SessionStatus::try_from(status.as_str()), Ok(status));
    }
    assert!(SessionStatus::try_from("paused").is_err());
}
