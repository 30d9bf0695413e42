use crate::error::{ConsolidateError, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Array disks are `disk1`..`disk99`; pools are `cache` or `cacheN`.
static DISK_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:disk[1-9][0-9]?|cache[0-9]*)$").unwrap());

/// A disk discovered in the Unraid /mnt/ mount hierarchy.
pub(crate) struct DiscoveredDisk {
    pub name: String,
    pub mount_path: PathBuf,
}

pub(crate) fn is_disk_name(name: &str) -> bool {
    DISK_NAME_RE.is_match(name)
}

/// Natural order for disk names: `disk2` before `disk10`, cache pools last.
pub(crate) fn compare_disk_names(a: &str, b: &str) -> Ordering {
    fn key(name: &str) -> (bool, u32, &str) {
        let is_cache = name.starts_with("cache");
        let digits = name.trim_start_matches(|c: char| !c.is_ascii_digit());
        (is_cache, digits.parse().unwrap_or(0), name)
    }
    key(a).cmp(&key(b))
}

/// Discover Unraid array disks by reading /mnt/ mount points.
pub(crate) fn discover_disks(mnt_base: &Path) -> Result<Vec<DiscoveredDisk>> {
    if !mnt_base.is_dir() {
        return Err(ConsolidateError::InvalidTarget(format!(
            "Mount base path does not exist: {}",
            mnt_base.display()
        )));
    }

    let mut disks = Vec::new();

    let entries = std::fs::read_dir(mnt_base).map_err(|e| ConsolidateError::io(mnt_base, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ConsolidateError::io(mnt_base, e))?;
        let name = entry.file_name().to_string_lossy().to_string();

        if is_disk_name(&name) {
            let mount_path = entry.path();
            if mount_path.is_dir() {
                disks.push(DiscoveredDisk { name, mount_path });
            }
        }
    }

    disks.sort_by(|a, b| compare_disk_names(&a.name, &b.name));
    Ok(disks)
}
