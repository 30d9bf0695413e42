use std::io;
use std::path::Path;

/// Disk space measurements in bytes.
pub(crate) struct DiskSpace {
    /// Space usable by unprivileged writers (`f_bavail`), excluding root reservations.
    pub available: u64,
}

/// Source of free-space figures for mount points.
///
/// Queried fresh on every call; implementations must not cache.
pub trait SpaceProbe: Send + Sync {
    fn available_bytes(&self, mount_path: &Path) -> io::Result<u64>;
}

/// Production probe backed by `statvfs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsProbe;

impl SpaceProbe for StatvfsProbe {
    fn available_bytes(&self, mount_path: &Path) -> io::Result<u64> {
        get_disk_space(mount_path).map(|s| s.available)
    }
}

/// Get disk space info via statvfs.
#[cfg(unix)]
#[allow(unsafe_code)]
pub(crate) fn get_disk_space(mount_path: &Path) -> io::Result<DiskSpace> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(mount_path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };

    let ret = unsafe { libc::statvfs(c_path.as_ptr(), &raw mut stat) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }

    let block_size = stat.f_frsize as u64;
    let available = stat.f_bavail as u64 * block_size;

    Ok(DiskSpace { available })
}

/// Fallback for non-unix platforms (development on macOS/Windows).
#[cfg(not(unix))]
pub(crate) fn get_disk_space(_mount_path: &Path) -> io::Result<DiskSpace> {
    tracing::warn!("get_disk_space: using dummy values on non-unix platform");
    Ok(DiskSpace { available: 500_000_000_000 })
}
