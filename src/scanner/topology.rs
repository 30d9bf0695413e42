use super::discovery::{compare_disk_names, discover_disks};
use super::disk_space::SpaceProbe;
use super::validation::validate_share_name;
use super::walk::tree_bytes;
use crate::config::AppConfig;
use crate::error::{ConsolidateError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A physical disk (array member or pool) with its free space at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disk {
    pub name: String,
    pub mount_path: PathBuf,
    pub free_bytes: u64,
}

/// Per-disk presence of one top-level folder of a share.
#[derive(Debug, Clone, Serialize)]
pub struct FolderSummary {
    pub name: String,
    /// Disk name -> bytes of regular files under the folder on that disk.
    pub disks: BTreeMap<String, u64>,
}

impl FolderSummary {
    /// A folder is split when more than one disk hosts part of it.
    pub fn is_split(&self) -> bool {
        self.disks.len() > 1
    }

    /// The array disk already holding the most bytes of the folder. Pools are
    /// never chosen; ties go to the disk that sorts first.
    pub fn fullest_disk(&self) -> Option<&str> {
        self.disks
            .iter()
            .filter(|(name, _)| name.starts_with("disk"))
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| compare_disk_names(b.0, a.0)))
            .map(|(name, _)| name.as_str())
    }
}

/// A fresh view of the array: disks, free space and share layout.
///
/// Built on every invocation and never persisted.
#[derive(Debug, Clone)]
pub struct Topology {
    disks: Vec<Disk>,
    user_share_base: PathBuf,
    reserved_prefixes: Vec<String>,
    scan_threads: usize,
}

impl Topology {
    /// Discover disks under the mount base and probe their free space.
    pub fn scan(config: &AppConfig, probe: &dyn SpaceProbe) -> Result<Self> {
        let mut disks = Vec::new();

        for discovered in discover_disks(Path::new(&config.mnt_base))? {
            if config.excluded_disks.contains(&discovered.name) {
                info!("Skipping excluded disk: {}", discovered.name);
                continue;
            }

            let free_bytes = probe
                .available_bytes(&discovered.mount_path)
                .map_err(|e| ConsolidateError::io(&discovered.mount_path, e))?;

            disks.push(Disk { name: discovered.name, mount_path: discovered.mount_path, free_bytes });
        }

        info!("Discovered {} disks under {}", disks.len(), config.mnt_base);

        Ok(Self {
            disks,
            user_share_base: PathBuf::from(&config.user_share_base),
            reserved_prefixes: config.reserved_prefixes.clone(),
            scan_threads: config.scan_threads,
        })
    }

    pub fn disks(&self) -> &[Disk] {
        &self.disks
    }

    pub fn disk(&self, name: &str) -> Option<&Disk> {
        self.disks.iter().find(|d| d.name == name)
    }

    pub fn reserved_prefixes(&self) -> &[String] {
        &self.reserved_prefixes
    }

    pub(crate) const fn scan_threads(&self) -> usize {
        self.scan_threads
    }

    fn is_reserved(&self, name: &str) -> bool {
        self.reserved_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Visible share names, sorted.
    ///
    /// Read from the union mount when present; otherwise the union of every
    /// disk's top-level directories (which is what the union mount presents).
    pub fn list_shares(&self) -> Result<Vec<String>> {
        let mut shares = BTreeSet::new();

        if self.user_share_base.is_dir() {
            shares.extend(self.child_dirs(&self.user_share_base)?);
        } else {
            for disk in &self.disks {
                shares.extend(self.child_dirs(&disk.mount_path)?);
            }
        }

        Ok(shares.into_iter().collect())
    }

    /// Map every disk to its root for `share`, or `None` when the share is absent there.
    pub fn list_share_roots(&self, share: &str) -> BTreeMap<String, Option<PathBuf>> {
        self.disks
            .iter()
            .map(|disk| {
                let root = disk.mount_path.join(share);
                (disk.name.clone(), root.is_dir().then_some(root))
            })
            .collect()
    }

    /// Whether `share` exists on at least one disk.
    pub fn has_share(&self, share: &str) -> bool {
        self.list_share_roots(share).values().any(Option::is_some)
    }

    /// Top-level folders of `share` with the bytes each disk holds for them.
    pub fn list_folders(&self, share: &str) -> Result<Vec<FolderSummary>> {
        validate_share_name(share, &self.reserved_prefixes)?;

        let mut folders: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
        for (disk_name, root) in self.list_share_roots(share) {
            let Some(root) = root else {
                continue;
            };
            for name in self.child_dirs(&root)? {
                let bytes = tree_bytes(&root.join(&name), self.scan_threads);
                folders.entry(name).or_default().insert(disk_name.clone(), bytes);
            }
        }

        Ok(folders.into_iter().map(|(name, disks)| FolderSummary { name, disks }).collect())
    }

    /// Names of non-reserved subdirectories of `dir`.
    fn child_dirs(&self, dir: &Path) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(dir).map_err(|e| ConsolidateError::io(dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!("Error reading directory entry in {}: {}", dir.display(), err);
                    continue;
                }
            };
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            let name = entry.file_name().to_string_lossy().to_string();
            if is_dir && !self.is_reserved(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
