/// Default path where Unraid stores plugin config on the USB flash drive.
pub(super) const DEFAULT_CONFIG_PATH: &str = "/boot/config/plugins/consld8/consld8.cfg";

/// Default path for the session history database on the USB flash drive.
pub(super) const DEFAULT_DB_PATH: &str = "/boot/config/plugins/consld8/history.db";

/// The base path where Unraid mounts array disks and pools.
pub(super) const UNRAID_MNT_BASE: &str = "/mnt";

/// The FUSE union mount presenting user shares.
pub(super) const UNRAID_USER_SHARE_BASE: &str = "/mnt/user";

/// Share names starting with one of these are system directories, never shares.
pub(super) const DEFAULT_RESERVED_PREFIXES: &[&str] = &["@", "."];

/// Free space kept untouched on the destination disk, in bytes.
pub(super) const DEFAULT_SAFETY_MARGIN: u64 = 0;

/// Default number of parallel walk threads per disk.
pub(super) const DEFAULT_SCAN_THREADS: usize = 2;
