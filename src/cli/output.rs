use crate::config::AppConfig;
use crate::db::SessionRecord;
use crate::events::Event;
use crate::executor::{ExecutionMode, Outcome};
use crate::planner::{ConflictKind, MovePlan};
use crate::scanner::{Disk, FolderSummary};
use crate::session::Report;
use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};

const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Human-readable size, from KB up to TB with two decimals.
pub(crate) fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

const fn conflict_label(kind: ConflictKind) -> &'static str {
    match kind {
        ConflictKind::DuplicateOnSources => "on several disks",
        ConflictKind::DestinationCollision => "already on destination",
    }
}

/// Writes command results to stdout, as text or pretty JSON.
pub(crate) struct Output {
    json: bool,
}

impl Output {
    pub(crate) const fn new(json: bool) -> Self {
        Self { json }
    }

    fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, value)?;
        writeln!(stdout)?;
        Ok(())
    }

    pub(super) fn disks(&self, disks: &[Disk]) -> Result<()> {
        if self.json {
            return Self::write_json(disks);
        }
        let mut stdout = io::stdout().lock();
        for disk in disks {
            writeln!(
                stdout,
                "{:<8} {:>12} free  {}",
                disk.name,
                format_bytes(disk.free_bytes),
                disk.mount_path.display()
            )?;
        }
        Ok(())
    }

    pub(super) fn shares(&self, shares: &[String]) -> Result<()> {
        if self.json {
            return Self::write_json(shares);
        }
        let mut stdout = io::stdout().lock();
        for share in shares {
            writeln!(stdout, "{share}")?;
        }
        Ok(())
    }

    pub(super) fn folders(&self, share: &str, folders: &[FolderSummary]) -> Result<()> {
        if self.json {
            return Self::write_json(folders);
        }
        let mut stdout = io::stdout().lock();
        if folders.is_empty() {
            writeln!(stdout, "No folders in share '{share}'")?;
        }
        for folder in folders {
            let marker = if folder.is_split() { "  [split]" } else { "" };
            writeln!(stdout, "{}{marker}", folder.name)?;
            for (disk, bytes) in &folder.disks {
                writeln!(stdout, "    {disk:<8} {:>12}", format_bytes(*bytes))?;
            }
        }
        Ok(())
    }

    pub(super) fn plan(&self, plan: &MovePlan) -> Result<()> {
        if self.json {
            return Self::write_json(plan);
        }
        let mut stdout = io::stdout().lock();
        writeln!(
            stdout,
            "Plan: {}/{} -> {}",
            plan.share,
            plan.subfolder.display(),
            plan.destination_disk
        )?;
        writeln!(
            stdout,
            "  {} file(s) to move, {} total; {} free on {} (safety margin {})",
            plan.operations.len(),
            format_bytes(plan.total_bytes),
            format_bytes(plan.destination_free_bytes),
            plan.destination_disk,
            format_bytes(plan.safety_margin)
        )?;
        for op in &plan.operations {
            writeln!(
                stdout,
                "  move  {} -> {}  {} ({})",
                op.source_disk(),
                op.destination_disk,
                op.entry.relative_path.display(),
                format_bytes(op.entry.size_bytes)
            )?;
        }

        if !plan.conflicts.is_empty() {
            let unresolved = plan.unresolved_conflicts().count();
            writeln!(stdout, "Conflicts ({unresolved} unresolved):")?;
            for conflict in &plan.conflicts {
                let copies = conflict
                    .copies
                    .iter()
                    .map(|c| format!("{} {}", c.disk, format_bytes(c.size_bytes)))
                    .collect::<Vec<_>>()
                    .join(", ");
                let state =
                    if plan.excluded.contains(&conflict.relative_path) { " [excluded]" } else { "" };
                writeln!(
                    stdout,
                    "  {} ({}): {}{state}",
                    conflict.relative_path.display(),
                    conflict_label(conflict.kind),
                    copies
                )?;
            }
            if unresolved > 0 {
                writeln!(stdout, "Resolve each conflict by hand or pass --exclude <PATH> to skip it.")?;
            }
        }
        Ok(())
    }

    pub(super) fn event(&self, event: &Event) -> Result<()> {
        let mut stdout = io::stdout().lock();
        if self.json {
            serde_json::to_writer(&mut stdout, event)?;
            writeln!(stdout)?;
            return Ok(());
        }
        match event {
            Event::PlanReady { total_moves, total_bytes, conflicts, .. } => writeln!(
                stdout,
                "[{}] {total_moves} move(s), {}, {conflicts} conflict(s)",
                event.event_type(),
                format_bytes(*total_bytes)
            )?,
            Event::MoveComplete { index, total, file_path, status, error, .. } => {
                let reason = error.as_deref().map(|e| format!(": {e}")).unwrap_or_default();
                writeln!(stdout, "[{index}/{total}] {status} {file_path}{reason}")?;
            }
            Event::ExecutionComplete { duration_seconds, .. } => {
                writeln!(stdout, "[{}] after {duration_seconds:.1}s", event.event_type())?;
            }
            Event::SessionError { message, .. } => {
                writeln!(stdout, "[{}] {message}", event.event_type())?;
            }
        }
        Ok(())
    }

    pub(super) fn report(&self, report: &Report) -> Result<()> {
        if self.json {
            return Self::write_json(report);
        }
        let dry_run = report.mode == ExecutionMode::DryRun;
        let mut stdout = io::stdout().lock();
        writeln!(
            stdout,
            "Session {} ({}): {}/{} -> {}",
            report.session_id,
            report.mode,
            report.share,
            report.subfolder.display(),
            report.destination_disk
        )?;

        for op in &report.operations {
            let status = match (&op.outcome, dry_run) {
                (Outcome::Moved, true) => "would move",
                (outcome, _) => outcome.status(),
            };
            let reason = op.outcome.reason().map(|r| format!(": {r}")).unwrap_or_default();
            writeln!(
                stdout,
                "  {status:<10} {} -> {}  {}{reason}",
                op.source_disk,
                op.destination_disk,
                op.relative_path.display()
            )?;
        }
        for path in &report.excluded {
            writeln!(stdout, "  excluded   {}", path.display())?;
        }

        writeln!(
            stdout,
            "{} {}, {} skipped, {} failed; {} of {} planned",
            report.moved,
            if dry_run { "would move" } else { "moved" },
            report.skipped,
            report.failed,
            format_bytes(report.bytes_moved),
            format_bytes(report.planned_bytes)
        )?;
        if !report.removed_directories.is_empty() {
            writeln!(stdout, "Removed {} empty source folder(s)", report.removed_directories.len())?;
        }
        if report.cancelled {
            writeln!(stdout, "Cancelled before all operations ran")?;
        }
        if let Some(reason) = &report.aborted {
            writeln!(stdout, "Aborted: {reason}")?;
        }
        if let Some(error) = &report.error {
            writeln!(stdout, "Error: {error}")?;
        }
        Ok(())
    }

    pub(super) fn history(&self, records: &[SessionRecord]) -> Result<()> {
        if self.json {
            return Self::write_json(records);
        }
        let mut stdout = io::stdout().lock();
        if records.is_empty() {
            writeln!(stdout, "No sessions recorded")?;
        }
        for record in records {
            writeln!(
                stdout,
                "{}  {}  {:<11} {:<7} {}/{} -> {}  {}",
                record.created_at.as_deref().unwrap_or("-"),
                record.id,
                record.status.as_str(),
                record.mode,
                record.share,
                record.subfolder,
                record.destination_disk,
                record.bytes_moved.map(format_bytes).unwrap_or_default()
            )?;
        }
        Ok(())
    }

    pub(super) fn settings(&self, config: &AppConfig) -> Result<()> {
        if self.json {
            return Self::write_json(config);
        }
        let excluded = config.excluded_disks.iter().cloned().collect::<Vec<_>>().join(",");
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "CONFIG_PATH       = {}", config.config_path)?;
        writeln!(stdout, "DB_PATH           = {}", config.db_path)?;
        writeln!(stdout, "MNT_BASE          = {}", config.mnt_base)?;
        writeln!(stdout, "USER_SHARE_BASE   = {}", config.user_share_base)?;
        writeln!(stdout, "SAFETY_MARGIN     = {}", config.safety_margin)?;
        writeln!(stdout, "SCAN_THREADS      = {}", config.scan_threads)?;
        writeln!(stdout, "RESERVED_PREFIXES = {}", config.reserved_prefixes.join(","))?;
        writeln!(stdout, "EXCLUDED_DISKS    = {excluded}")?;
        writeln!(stdout, "VERIFY_CHECKSUM   = {}", config.verify_checksum)?;
        writeln!(stdout, "LOG_FILE          = {}", config.log_file.as_deref().unwrap_or(""))?;
        Ok(())
    }
}
