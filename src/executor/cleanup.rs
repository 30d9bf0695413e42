use crate::planner::MovePlan;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Remove partial copies left in the destination tree by an interrupted run.
///
/// Only the executor writes files with this suffix, so any found before a run
/// starts belong to a copy that never completed. Their sources are intact.
pub(crate) fn remove_stale_partials(destination_root: &Path, partial_suffix: &str) -> usize {
    if !destination_root.is_dir() {
        return 0;
    }

    let mut removed = 0usize;
    for entry in jwalk::WalkDir::new(destination_root).skip_hidden(false).follow_links(false) {
        let Ok(entry) = entry else {
            continue;
        };
        let is_partial = entry.file_type().is_file()
            && entry.file_name().to_string_lossy().ends_with(partial_suffix);
        if !is_partial {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed stale partial copy: {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove stale partial copy {}: {}", path.display(), e),
        }
    }
    removed
}

/// Recreate the source directory structure under the destination root so
/// that pruning empty source directories never loses a directory.
pub(crate) fn mirror_directories(plan: &MovePlan) {
    for relative in &plan.directories {
        let target = plan.destination_root.join(relative);
        if let Err(e) = fs::create_dir_all(&target) {
            warn!("Failed to create directory {}: {}", target.display(), e);
        }
    }
}

/// Remove empty directories below and including `root`, deepest first.
///
/// Directories still holding anything (unmoved files, conflicts) stay.
/// Returns the removed directories.
pub(crate) fn prune_empty_dirs(root: &Path) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    match prune(root, &mut removed) {
        Ok(true) => match fs::remove_dir(root) {
            Ok(()) => removed.push(root.to_path_buf()),
            Err(e) => warn!("Failed to remove empty directory {}: {}", root.display(), e),
        },
        Ok(false) => {}
        Err(e) => warn!("Failed to prune {}: {}", root.display(), e),
    }
    removed
}

/// Prune children of `dir`; returns whether `dir` is now empty.
fn prune(dir: &Path, removed: &mut Vec<PathBuf>) -> io::Result<bool> {
    let mut empty = true;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if !entry.file_type()?.is_dir() {
            empty = false;
            continue;
        }

        if prune(&path, removed)? {
            match fs::remove_dir(&path) {
                Ok(()) => removed.push(path),
                Err(e) => {
                    warn!("Failed to remove empty directory {}: {}", path.display(), e);
                    empty = false;
                }
            }
        } else {
            empty = false;
        }
    }

    Ok(empty)
}
