use crate::error::{ConsolidateError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// A regular file found under the target subfolder on one source disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the subfolder root.
    pub relative_path: PathBuf,
    /// Disk currently holding the file.
    pub disk: String,
    pub size_bytes: u64,
    pub mtime: Option<i64>,
}

/// Move one file from its disk to the same relative path on the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOp {
    pub entry: FileEntry,
    pub destination_disk: String,
}

impl MoveOp {
    pub fn source_disk(&self) -> &str {
        &self.entry.disk
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The same relative path exists on two or more source disks.
    DuplicateOnSources,
    /// A source file would land on a path the destination already holds.
    DestinationCollision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictCopy {
    pub disk: String,
    pub size_bytes: u64,
}

/// A path the planner refuses to move automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub relative_path: PathBuf,
    pub kind: ConflictKind,
    pub copies: Vec<ConflictCopy>,
}

/// The complete set of moves consolidating one share subfolder onto one disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovePlan {
    pub share: String,
    pub subfolder: PathBuf,
    pub destination_disk: String,
    pub destination_mount: PathBuf,
    /// `<destination mount>/<share>/<subfolder>`; may not exist yet.
    pub destination_root: PathBuf,
    /// Source disk name -> subfolder root on that disk.
    pub source_roots: BTreeMap<String, PathBuf>,
    pub operations: Vec<MoveOp>,
    pub conflicts: Vec<Conflict>,
    /// Paths explicitly taken out of the plan by the user.
    pub excluded: BTreeSet<PathBuf>,
    /// Relative directories present on source disks, mirrored onto the destination.
    pub directories: BTreeSet<PathBuf>,
    pub total_bytes: u64,
    pub safety_margin: u64,
    /// Destination free space when the plan was built.
    pub destination_free_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl MovePlan {
    pub const fn required_free_bytes(&self) -> u64 {
        self.total_bytes.saturating_add(self.safety_margin)
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Conflicts not yet explicitly excluded; execution is refused while any remain.
    pub fn unresolved_conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(|c| !self.excluded.contains(&c.relative_path))
    }

    /// Exclude a path from the plan.
    ///
    /// A conflicting path is acknowledged and left in place; a planned move is dropped.
    pub fn exclude(&mut self, relative_path: &Path) -> Result<()> {
        let is_conflict = self.conflicts.iter().any(|c| c.relative_path == relative_path);
        let before = self.operations.len();
        self.operations.retain(|op| op.entry.relative_path != relative_path);

        if !is_conflict && self.operations.len() == before {
            return Err(ConsolidateError::InvalidInput(format!(
                "'{}' is not part of the plan",
                relative_path.display()
            )));
        }

        self.total_bytes = self.operations.iter().map(|op| op.entry.size_bytes).sum();
        self.excluded.insert(relative_path.to_path_buf());
        Ok(())
    }
}
