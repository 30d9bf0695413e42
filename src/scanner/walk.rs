use super::validation::validate_path;
use jwalk::{Parallelism, WalkDir};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One entry found below a walked root, with its path relative to that root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WalkedEntry {
    File { relative_path: PathBuf, size_bytes: u64, mtime: Option<i64> },
    Directory { relative_path: PathBuf },
    /// Symlinks, sockets, devices: never moved.
    Other { relative_path: PathBuf },
}

/// Convert a jwalk directory entry into a `WalkedEntry`, or `None` if it should be skipped.
fn process_dir_entry(entry: &jwalk::DirEntry<((), ())>, root: &Path) -> Option<WalkedEntry> {
    let entry_path = entry.path();

    if entry_path == root {
        return None;
    }

    let path_str = entry_path.to_string_lossy();
    if let Err(e) = validate_path(&path_str) {
        warn!("{}", e);
        return None;
    }

    let relative_path = entry_path.strip_prefix(root).ok()?.to_path_buf();
    let file_type = entry.file_type();

    if file_type.is_dir() {
        return Some(WalkedEntry::Directory { relative_path });
    }
    if !file_type.is_file() {
        return Some(WalkedEntry::Other { relative_path });
    }

    let metadata = match entry.metadata() {
        Ok(m) => m,
        Err(err) => {
            warn!("Cannot read metadata for {}: {}", path_str, err);
            return None;
        }
    };

    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64);

    Some(WalkedEntry::File { relative_path, size_bytes: metadata.len(), mtime })
}

/// Recursively list everything below `root`. Symlinks are reported, never followed.
///
/// Unreadable entries are logged and skipped; they are simply not part of the result.
pub(crate) fn walk_tree(root: &Path, num_threads: usize) -> Vec<WalkedEntry> {
    let parallelism =
        if num_threads > 1 { Parallelism::RayonNewPool(num_threads) } else { Parallelism::Serial };

    let walker =
        WalkDir::new(root).parallelism(parallelism).skip_hidden(false).follow_links(false).sort(true);

    let mut entries = Vec::new();
    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                warn!("Error reading directory entry under {}: {}", root.display(), err);
                continue;
            }
        };

        if let Some(walked) = process_dir_entry(&entry, root) {
            entries.push(walked);
        }
    }

    debug!("Walked {}: {} entries", root.display(), entries.len());
    entries
}

/// Total bytes of regular files below `root`.
pub(crate) fn tree_bytes(root: &Path, num_threads: usize) -> u64 {
    walk_tree(root, num_threads)
        .iter()
        .map(|entry| match entry {
            WalkedEntry::File { size_bytes, .. } => *size_bytes,
            _ => 0,
        })
        .sum()
}
