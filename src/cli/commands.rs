use super::output::Output;
use super::TargetArgs;
use crate::config::{AppConfig, CONFIG_KEYS};
use crate::db::Database;
use crate::events::{Event, EventHub};
use crate::executor::ExecutionMode;
use crate::scanner::{SpaceProbe, StatvfsProbe, Topology};
use crate::session::{Report, Session, SessionManager};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;

/// Run filesystem-bound work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.context("Background task panicked")?
}

fn open_db(config: &AppConfig) -> Result<Arc<Database>> {
    let db = Database::open(&config.db_path)?;
    db.run_migrations()?;
    db.recover_stale_sessions()?;
    Ok(Arc::new(db))
}

async fn scan(config: AppConfig) -> Result<Topology> {
    blocking(move || Ok(Topology::scan(&config, &StatvfsProbe)?)).await
}

/// Scan, select the share and target, and apply exclusions.
async fn prepare_session(
    config: AppConfig,
    probe: Arc<dyn SpaceProbe>,
    target: TargetArgs,
) -> Result<Session> {
    blocking(move || {
        let topology = Topology::scan(&config, probe.as_ref())?;
        let margin = target.safety_margin.unwrap_or(config.safety_margin);

        let mut session = Session::new(topology, margin);
        session.select_share(&target.share)?;
        session.set_target(&target.folder, &target.disk)?;
        for path in &target.excludes {
            session.exclude(path)?;
        }
        Ok(session)
    })
    .await
}

pub(super) async fn disks(config: AppConfig, out: &Output) -> Result<()> {
    let topology = scan(config).await?;
    out.disks(topology.disks())
}

pub(super) async fn shares(config: AppConfig, out: &Output) -> Result<()> {
    let topology = scan(config).await?;
    let shares = topology.list_shares()?;
    out.shares(&shares)
}

pub(super) async fn folders(config: AppConfig, share: String, out: &Output) -> Result<()> {
    let topology = scan(config).await?;
    let (share, folders) = blocking(move || {
        let folders = topology.list_folders(&share)?;
        Ok((share, folders))
    })
    .await?;
    out.folders(&share, &folders)
}

pub(super) async fn plan(config: AppConfig, target: TargetArgs, out: &Output) -> Result<()> {
    let session = prepare_session(config, Arc::new(StatvfsProbe), target).await?;
    match session.plan() {
        Some(plan) => out.plan(plan),
        None => bail!("Session {} has no plan", session.id()),
    }
}

pub(super) async fn run(
    config: AppConfig,
    target: TargetArgs,
    force: bool,
    verbose: bool,
    out: &Output,
) -> Result<()> {
    let mode = if force { ExecutionMode::Force } else { ExecutionMode::DryRun };
    let db = open_db(&config)?;
    let probe: Arc<dyn SpaceProbe> = Arc::new(StatvfsProbe);
    let verify_checksum = config.verify_checksum;

    let session = prepare_session(config, Arc::clone(&probe), target).await?;
    let Some(plan) = session.plan() else {
        bail!("Session {} has no plan", session.id());
    };
    if let Err(e) = session.check_executable() {
        out.plan(plan)?;
        return Err(e.into());
    }

    let events = EventHub::new(EVENT_CAPACITY);
    let mut rx = events.subscribe();
    publish_plan(&events, &session);

    let manager = SessionManager::new(probe, events, db, verify_checksum);
    let id = manager.submit(session, mode).await?;
    let report = drive(&manager, id, &mut rx, verbose, out).await?;
    check_report(&report)
}

/// Consolidate each split top-level folder of `share`, one session at a time.
pub(crate) async fn auto(
    config: AppConfig,
    share: String,
    safety_margin: Option<u64>,
    force: bool,
    verbose: bool,
    out: &Output,
) -> Result<()> {
    let mode = if force { ExecutionMode::Force } else { ExecutionMode::DryRun };
    let db = open_db(&config)?;
    let probe: Arc<dyn SpaceProbe> = Arc::new(StatvfsProbe);
    let verify_checksum = config.verify_checksum;

    let topology = scan(config.clone()).await?;
    let listed_share = share.clone();
    let folders = blocking(move || Ok(topology.list_folders(&listed_share)?)).await?;
    let targets: Vec<(String, String)> = folders
        .iter()
        .filter(|folder| folder.is_split())
        .filter_map(|folder| Some((folder.name.clone(), folder.fullest_disk()?.to_string())))
        .collect();

    if targets.is_empty() {
        info!("No split folders in share '{}'", share);
        return Ok(());
    }
    info!("Consolidating {} split folder(s) of '{}' ({})", targets.len(), share, mode);

    let events = EventHub::new(EVENT_CAPACITY);
    let mut rx = events.subscribe();
    let manager = SessionManager::new(Arc::clone(&probe), events.clone(), db, verify_checksum);
    let mut unfinished = Vec::new();

    for (folder, disk) in targets {
        let target = TargetArgs {
            share: share.clone(),
            folder: folder.clone(),
            disk,
            safety_margin,
            excludes: Vec::new(),
        };
        // Rescan per folder: earlier moves change free space.
        let session = match prepare_session(config.clone(), Arc::clone(&probe), target).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Skipping {}/{}: {:#}", share, folder, e);
                unfinished.push(folder);
                continue;
            }
        };
        let Some(plan) = session.plan() else {
            unfinished.push(folder);
            continue;
        };
        if let Err(e) = session.check_executable() {
            out.plan(plan)?;
            warn!("Skipping {}/{}: {}", share, folder, e);
            unfinished.push(folder);
            continue;
        }

        publish_plan(&events, &session);
        let id = manager.submit(session, mode).await?;
        let report = drive(&manager, id, &mut rx, verbose, out).await?;
        if let Err(e) = check_report(&report) {
            warn!("{:#}", e);
            unfinished.push(folder.clone());
        }
        if report.cancelled {
            bail!("Cancelled during {share}/{folder}; remaining folders were not started");
        }
    }

    if !unfinished.is_empty() {
        bail!("{} folder(s) not consolidated: {}", unfinished.len(), unfinished.join(", "));
    }
    Ok(())
}

fn publish_plan(events: &EventHub, session: &Session) {
    if let Some(plan) = session.plan() {
        events.publish(Event::PlanReady {
            session_id: session.id(),
            total_moves: plan.operations.len() as u32,
            total_bytes: plan.total_bytes,
            conflicts: plan.conflicts.len() as u32,
        });
    }
}

/// Wait for a submitted session while relaying progress and Ctrl-C, then print its report.
async fn drive(
    manager: &SessionManager,
    id: Uuid,
    rx: &mut broadcast::Receiver<Event>,
    verbose: bool,
    out: &Output,
) -> Result<Report> {
    let wait = manager.wait(id);
    tokio::pin!(wait);

    let report = loop {
        tokio::select! {
            report = &mut wait => break report?,
            _ = tokio::signal::ctrl_c() => {
                warn!("Received Ctrl+C, cancelling after the current file...");
                manager.cancel(id).await?;
            }
            event = rx.recv() => match event {
                Ok(event) if verbose => out.event(&event)?,
                Ok(_) | Err(RecvError::Closed) => {}
                Err(RecvError::Lagged(n)) => warn!("Progress output skipped {} event(s)", n),
            },
        }
    };

    while let Ok(event) = rx.try_recv() {
        if verbose {
            out.event(&event)?;
        }
    }

    out.report(&report)?;
    Ok(report)
}

/// Turn an unsuccessful report into an error for the exit status.
fn check_report(report: &Report) -> Result<()> {
    let id = report.session_id;
    if let Some(error) = &report.error {
        bail!("Session {id} failed: {error}");
    }
    if let Some(reason) = &report.aborted {
        bail!("Session {id} aborted: {reason}");
    }
    if report.failed > 0 {
        bail!("Session {id} finished with {} failed operation(s)", report.failed);
    }
    Ok(())
}

pub(super) fn history(config: &AppConfig, limit: usize, out: &Output) -> Result<()> {
    let db = open_db(config)?;
    let records = db.list_sessions(limit)?;
    out.history(&records)
}

pub(super) fn report(config: &AppConfig, id: Uuid, out: &Output) -> Result<()> {
    let db = open_db(config)?;
    if let Some(report) = db.get_report(id)? {
        return out.report(&report);
    }
    match db.get_session(id)? {
        Some(record) => bail!("Session {id} has no stored report (status: {})", record.status),
        None => bail!("Unknown session {id}"),
    }
}

pub(super) fn settings(mut config: AppConfig, assignments: &[String], out: &Output) -> Result<()> {
    if !assignments.is_empty() {
        for assignment in assignments {
            let Some((key, _)) = assignment.split_once('=') else {
                bail!("Expected KEY=VALUE, got '{assignment}'");
            };
            if !CONFIG_KEYS.contains(&key.trim()) {
                bail!("Unknown setting '{}' (known: {})", key.trim(), CONFIG_KEYS.join(", "));
            }
        }

        config.parse_ini(&assignments.join("\n"));
        config.validate()?;
        config.save()?;
        info!("Settings saved to {}", config.config_path);
    }

    out.settings(&config)
}
