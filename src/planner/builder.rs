use super::types::{Conflict, ConflictCopy, ConflictKind, FileEntry, MoveOp, MovePlan};
use crate::error::{ConsolidateError, Result};
use crate::executor::PARTIAL_SUFFIX;
use crate::scanner::validation::{normalize_subfolder, validate_path, validate_share_name};
use crate::scanner::{is_disk_name, walk_tree, Topology, WalkedEntry};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{info, warn};

/// What to consolidate and where.
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub share: &'a str,
    pub subfolder: &'a str,
    pub destination_disk: &'a str,
    /// Bytes that must remain free on the destination after the moves.
    pub safety_margin: u64,
}

/// Walk results for one path across every source disk.
type Candidates = BTreeMap<PathBuf, Vec<FileEntry>>;

/// Build the plan consolidating `request.subfolder` of `request.share` onto
/// `request.destination_disk`.
///
/// Files already on the destination are left alone. Paths present on more
/// than one source disk, or already present on the destination, become
/// conflicts and are never moved automatically.
pub fn build_plan(topology: &Topology, request: &PlanRequest<'_>) -> Result<MovePlan> {
    validate_share_name(request.share, topology.reserved_prefixes())?;
    let subfolder = normalize_subfolder(request.subfolder)?;
    if !is_disk_name(request.destination_disk) {
        return Err(ConsolidateError::InvalidInput(format!(
            "'{}' is not a disk name",
            request.destination_disk
        )));
    }

    let destination = topology.disk(request.destination_disk).ok_or_else(|| {
        ConsolidateError::InvalidTarget(format!("unknown disk '{}'", request.destination_disk))
    })?;
    let destination_root = destination.mount_path.join(request.share).join(&subfolder);
    validate_path(&destination_root.to_string_lossy())?;

    let mut source_roots = BTreeMap::new();
    let mut found_anywhere = destination_root.is_dir();
    for (rank, disk) in topology.disks().iter().enumerate() {
        let root = disk.mount_path.join(request.share).join(&subfolder);
        if !root.is_dir() {
            continue;
        }
        found_anywhere = true;
        if disk.name != destination.name {
            validate_path(&root.to_string_lossy())?;
            source_roots.insert(disk.name.clone(), (rank, root));
        }
    }

    if !found_anywhere {
        return Err(ConsolidateError::InvalidTarget(format!(
            "'{}' does not exist on any disk under share '{}'",
            subfolder.display(),
            request.share
        )));
    }

    let mut candidates = Candidates::new();
    let mut directories = BTreeSet::new();
    let mut ranks = BTreeMap::new();

    for (disk_name, (rank, root)) in &source_roots {
        ranks.insert(disk_name.clone(), *rank);
        for walked in walk_tree(root, topology.scan_threads()) {
            match walked {
                WalkedEntry::File { relative_path, .. }
                    if relative_path.to_string_lossy().ends_with(PARTIAL_SUFFIX) =>
                {
                    warn!("Ignoring partial copy: {}", root.join(&relative_path).display());
                }
                WalkedEntry::File { relative_path, size_bytes, mtime } => {
                    candidates.entry(relative_path.clone()).or_default().push(FileEntry {
                        relative_path,
                        disk: disk_name.clone(),
                        size_bytes,
                        mtime,
                    });
                }
                WalkedEntry::Directory { relative_path } => {
                    directories.insert(relative_path);
                }
                WalkedEntry::Other { relative_path } => {
                    warn!(
                        "Leaving non-regular file in place: {}",
                        root.join(&relative_path).display()
                    );
                }
            }
        }
    }

    let (mut operations, conflicts) =
        classify_candidates(candidates, &destination_root, &destination.name);

    operations.sort_by(|a, b| {
        let rank_a = ranks.get(a.source_disk()).copied().unwrap_or(usize::MAX);
        let rank_b = ranks.get(b.source_disk()).copied().unwrap_or(usize::MAX);
        rank_a.cmp(&rank_b).then_with(|| a.entry.relative_path.cmp(&b.entry.relative_path))
    });

    let total_bytes: u64 = operations.iter().map(|op| op.entry.size_bytes).sum();
    let required = total_bytes.saturating_add(request.safety_margin);
    if !operations.is_empty() && required > destination.free_bytes {
        return Err(ConsolidateError::NoDiskSpace {
            disk: destination.name.clone(),
            required,
            available: destination.free_bytes,
        });
    }

    info!(
        "Plan for {}/{} -> {}: {} moves, {} bytes, {} conflicts",
        request.share,
        subfolder.display(),
        destination.name,
        operations.len(),
        total_bytes,
        conflicts.len()
    );

    Ok(MovePlan {
        share: request.share.to_string(),
        subfolder,
        destination_disk: destination.name.clone(),
        destination_mount: destination.mount_path.clone(),
        destination_root,
        source_roots: source_roots.into_iter().map(|(name, (_, root))| (name, root)).collect(),
        operations,
        conflicts,
        excluded: BTreeSet::new(),
        directories,
        total_bytes,
        safety_margin: request.safety_margin,
        destination_free_bytes: destination.free_bytes,
        created_at: chrono::Utc::now(),
    })
}

/// Split candidates into safe moves and conflicts.
fn classify_candidates(
    candidates: Candidates,
    destination_root: &std::path::Path,
    destination_disk: &str,
) -> (Vec<MoveOp>, Vec<Conflict>) {
    let mut operations = Vec::new();
    let mut conflicts = Vec::new();

    for (relative_path, mut copies) in candidates {
        let on_destination = std::fs::symlink_metadata(destination_root.join(&relative_path)).ok();

        if let Some(existing) = on_destination {
            let mut listed: Vec<ConflictCopy> = copies
                .iter()
                .map(|c| ConflictCopy { disk: c.disk.clone(), size_bytes: c.size_bytes })
                .collect();
            listed.push(ConflictCopy {
                disk: destination_disk.to_string(),
                size_bytes: existing.len(),
            });
            conflicts.push(Conflict {
                relative_path,
                kind: ConflictKind::DestinationCollision,
                copies: listed,
            });
            continue;
        }

        if copies.len() > 1 {
            conflicts.push(Conflict {
                relative_path,
                kind: ConflictKind::DuplicateOnSources,
                copies: copies
                    .iter()
                    .map(|c| ConflictCopy { disk: c.disk.clone(), size_bytes: c.size_bytes })
                    .collect(),
            });
            continue;
        }

        if let Some(entry) = copies.pop() {
            operations.push(MoveOp { entry, destination_disk: destination_disk.to_string() });
        }
    }

    (operations, conflicts)
}
