use crate::config::AppConfig;
use crate::scanner::{SpaceProbe, Topology};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Reports the same free space for every mount point.
pub(crate) struct FixedSpace(pub u64);

impl SpaceProbe for FixedSpace {
    fn available_bytes(&self, _mount_path: &Path) -> io::Result<u64> {
        Ok(self.0)
    }
}

/// A fake `/mnt` with one directory per disk inside a temp dir.
pub(crate) struct Array {
    pub dir: TempDir,
    pub config: AppConfig,
}

impl Array {
    pub(crate) fn new(disks: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let mnt = dir.path().join("mnt");
        for disk in disks {
            fs::create_dir_all(mnt.join(disk)).unwrap();
        }

        let config = AppConfig {
            config_path: dir.path().join("consld8.cfg").to_string_lossy().to_string(),
            db_path: dir.path().join("history.db").to_string_lossy().to_string(),
            mnt_base: mnt.to_string_lossy().to_string(),
            user_share_base: mnt.join("user").to_string_lossy().to_string(),
            ..AppConfig::default()
        };

        Self { dir, config }
    }

    pub(crate) fn disk(&self, name: &str) -> PathBuf {
        Path::new(&self.config.mnt_base).join(name)
    }

    /// Write `size` bytes at `disk/relative`, creating parents.
    pub(crate) fn write(&self, disk: &str, relative: &str, size: usize) -> PathBuf {
        let path = self.disk(disk).join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let contents: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        fs::write(&path, contents).unwrap();
        path
    }

    pub(crate) fn mkdir(&self, disk: &str, relative: &str) -> PathBuf {
        let path = self.disk(disk).join(relative);
        fs::create_dir_all(&path).unwrap();
        path
    }

    pub(crate) fn topology(&self, free_bytes: u64) -> Topology {
        Topology::scan(&self.config, &FixedSpace(free_bytes)).unwrap()
    }

    /// Every file and directory under the mount base, with file sizes.
    pub(crate) fn snapshot(&self) -> BTreeMap<PathBuf, Option<u64>> {
        let mut entries = BTreeMap::new();
        collect(Path::new(&self.config.mnt_base), Path::new(&self.config.mnt_base), &mut entries);
        entries
    }
}

fn collect(base: &Path, dir: &Path, entries: &mut BTreeMap<PathBuf, Option<u64>>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        let relative = path.strip_prefix(base).unwrap().to_path_buf();
        if entry.file_type().unwrap().is_dir() {
            entries.insert(relative, None);
            collect(base, &path, entries);
        } else {
            entries.insert(relative, Some(entry.metadata().unwrap().len()));
        }
    }
}
