pub(crate) mod cleanup;
pub(crate) mod transfer;
mod types;

pub use types::{
    ExecutionMode, ExecutionResult, MoveFailure, OperationReport, Outcome, SkipReason,
};
pub(crate) use transfer::PARTIAL_SUFFIX;

use crate::error::{ConsolidateError, Result};
use crate::events::{Event, EventHub};
use crate::planner::{MoveOp, MovePlan};
use crate::scanner::SpaceProbe;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything the executor needs besides the plan itself.
pub struct ExecContext<'a> {
    pub session_id: Uuid,
    pub probe: &'a dyn SpaceProbe,
    pub events: &'a EventHub,
    /// Checked between operations; an in-flight file always finishes.
    pub cancel: &'a CancellationToken,
    pub verify_checksum: bool,
}

/// Apply `plan` in `mode`.
///
/// Both modes run the same checks and classify every operation the same way;
/// only `Force` touches the filesystem. Operations run sequentially. A failed
/// file is recorded and the run continues; only a fatal destination error
/// stops it early, leaving completed moves in place. Source directories are
/// pruned only after a forced run that was neither cancelled nor aborted.
///
/// Fails before touching anything when conflicts are unresolved, the
/// destination is not mounted, or it no longer has room for the plan.
pub fn execute(plan: &MovePlan, mode: ExecutionMode, ctx: &ExecContext<'_>) -> Result<ExecutionResult> {
    let unresolved = plan.unresolved_conflicts().count();
    if unresolved > 0 {
        return Err(ConsolidateError::ConflictDetected { count: unresolved });
    }

    if !plan.destination_mount.is_dir() {
        return Err(ConsolidateError::FatalIo {
            path: plan.destination_mount.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "destination disk is not mounted",
            ),
        });
    }

    let available = ctx
        .probe
        .available_bytes(&plan.destination_mount)
        .map_err(|e| ConsolidateError::io(&plan.destination_mount, e))?;
    let required = plan.required_free_bytes();
    if !plan.is_empty() && required > available {
        return Err(ConsolidateError::NoDiskSpace {
            disk: plan.destination_disk.clone(),
            required,
            available,
        });
    }
    let mut budget = available.saturating_sub(plan.safety_margin);

    if mode == ExecutionMode::Force {
        cleanup::remove_stale_partials(&plan.destination_root, transfer::PARTIAL_SUFFIX);
    }

    info!(
        "Executing plan for {}/{} -> {} ({}): {} operations, {} bytes",
        plan.share,
        plan.subfolder.display(),
        plan.destination_disk,
        mode,
        plan.operations.len(),
        plan.total_bytes
    );

    let start = Instant::now();
    let mut result = ExecutionResult::new(mode);
    let total = plan.operations.len();

    for (index, op) in plan.operations.iter().enumerate() {
        let outcome = if result.aborted.is_some() {
            Outcome::Skipped(SkipReason::Aborted)
        } else if ctx.cancel.is_cancelled() {
            if !result.cancelled {
                info!("Execution cancelled after {} of {} operations", index, total);
                result.cancelled = true;
            }
            Outcome::Skipped(SkipReason::Cancelled)
        } else {
            run_operation(plan, op, mode, ctx, &mut budget)
        };

        if let Outcome::Failed(failure) = &outcome {
            if failure.is_fatal() && result.aborted.is_none() {
                let fatal = ConsolidateError::FatalIo {
                    path: plan.destination_mount.clone(),
                    source: std::io::Error::other(failure.to_string()),
                };
                warn!("Aborting remaining operations: {}", fatal);
                result.aborted = Some(fatal.to_string());
            }
        }

        ctx.events.publish(Event::MoveComplete {
            session_id: ctx.session_id,
            index: index as u32 + 1,
            total: total as u32,
            file_path: op.entry.relative_path.to_string_lossy().to_string(),
            status: outcome.status().to_string(),
            dry_run: mode == ExecutionMode::DryRun,
            error: outcome.reason(),
        });

        result.record(OperationReport {
            relative_path: op.entry.relative_path.clone(),
            source_disk: op.source_disk().to_string(),
            destination_disk: op.destination_disk.clone(),
            size_bytes: op.entry.size_bytes,
            outcome,
        });
    }

    if mode == ExecutionMode::Force && result.aborted.is_none() && !result.cancelled {
        cleanup::mirror_directories(plan);
        for root in plan.source_roots.values() {
            result.removed_directories.extend(cleanup::prune_empty_dirs(root));
        }
    }

    let duration = start.elapsed().as_secs_f64();
    result.finished_at = Some(chrono::Utc::now());

    info!(
        "Execution finished ({}): {} moved, {} skipped, {} failed, {} bytes in {:.1}s",
        mode, result.moved, result.skipped, result.failed, result.bytes_moved, duration
    );

    ctx.events.publish(Event::ExecutionComplete {
        session_id: ctx.session_id,
        moves_completed: result.moved as u32,
        moves_failed: result.failed as u32,
        moves_skipped: result.skipped as u32,
        bytes_moved: result.bytes_moved,
        duration_seconds: duration,
    });

    Ok(result)
}

/// Check and, in `Force` mode, apply a single operation.
fn run_operation(
    plan: &MovePlan,
    op: &MoveOp,
    mode: ExecutionMode,
    ctx: &ExecContext<'_>,
    budget: &mut u64,
) -> Outcome {
    let Some(source_root) = plan.source_roots.get(op.source_disk()) else {
        return Outcome::Failed(MoveFailure::Io(format!("unknown source disk {}", op.source_disk())));
    };
    let source = source_root.join(&op.entry.relative_path);
    let destination = plan.destination_root.join(&op.entry.relative_path);
    let size = op.entry.size_bytes;

    if !plan.destination_mount.is_dir() {
        return Outcome::Failed(MoveFailure::DestinationUnavailable);
    }
    if let Err(e) = ctx.probe.available_bytes(&plan.destination_mount) {
        warn!("Destination {} stopped responding: {}", plan.destination_mount.display(), e);
        return Outcome::Failed(MoveFailure::DestinationUnavailable);
    }
    if let Err(failure) = transfer::verify_source(&source, size) {
        warn!("Cannot move {}: {}", source.display(), failure);
        return Outcome::Failed(failure);
    }
    if std::fs::symlink_metadata(&destination).is_ok() {
        return Outcome::Skipped(SkipReason::DestinationExists);
    }
    if !transfer::parent_creatable(&destination) {
        return Outcome::Failed(MoveFailure::ParentNotCreatable);
    }
    if size > *budget {
        return Outcome::Skipped(SkipReason::InsufficientSpace { needed: size, available: *budget });
    }

    if mode == ExecutionMode::Force {
        if let Err(failure) =
            transfer::move_file(&source, &destination, size, ctx.verify_checksum)
        {
            warn!("Failed to move {}: {}", source.display(), failure);
            return Outcome::Failed(failure);
        }
        info!("Moved {} -> {}", source.display(), destination.display());
    }

    *budget -= size;
    Outcome::Moved
}
