use super::types::MoveFailure;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Suffix of in-flight copies; never left behind on failure.
pub(crate) const PARTIAL_SUFFIX: &str = ".consld8-partial";

/// Whether the first existing ancestor of `path` is a directory.
pub(crate) fn parent_creatable(path: &Path) -> bool {
    path.ancestors()
        .skip(1)
        .find_map(|ancestor| fs::symlink_metadata(ancestor).ok())
        .is_some_and(|m| m.is_dir())
}

/// Check the source still matches the plan. Read-only; used by both modes.
pub(crate) fn verify_source(source: &Path, expected_size: u64) -> Result<(), MoveFailure> {
    let metadata = fs::symlink_metadata(source).map_err(|e| MoveFailure::from_io(&e))?;
    if !metadata.is_file() {
        return Err(MoveFailure::NotFound);
    }
    if metadata.len() != expected_size {
        return Err(MoveFailure::SizeChanged {
            planned: expected_size,
            actual: metadata.len(),
        });
    }
    Ok(())
}

/// Move `source` to `destination`, which must not exist yet.
///
/// A plain rename is used when both sides share a device. Across devices the
/// file is copied to a partial file next to the destination, synced, verified,
/// renamed into place, and only then is the source deleted. On any failure the
/// partial copy is removed and the source is left untouched.
pub(crate) fn move_file(
    source: &Path,
    destination: &Path,
    expected_size: u64,
    verify_checksum: bool,
) -> Result<(), MoveFailure> {
    let parent = destination.parent().ok_or(MoveFailure::ParentNotCreatable)?;
    fs::create_dir_all(parent).map_err(|e| MoveFailure::from_io(&e))?;

    if same_device(source, parent) {
        match fs::rename(source, destination) {
            Ok(()) => {
                debug!("Renamed {} -> {}", source.display(), destination.display());
                return Ok(());
            }
            Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
                debug!("Rename crossed devices, falling back to copy: {}", source.display());
            }
            Err(e) => return Err(MoveFailure::from_io(&e)),
        }
    }

    copy_verified(source, destination, expected_size, verify_checksum)
}

#[cfg(unix)]
fn same_device(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_device(_a: &Path, _b: &Path) -> bool {
    false
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove partial copy {}: {}", path.display(), e);
        }
    }
}

/// Cross-device move: copy, verify, then delete the source.
pub(crate) fn copy_verified(
    source: &Path,
    destination: &Path,
    expected_size: u64,
    verify_checksum: bool,
) -> Result<(), MoveFailure> {
    let partial = partial_path(destination);

    if let Err(failure) = copy_into(source, &partial, expected_size, verify_checksum) {
        discard(&partial);
        return Err(failure);
    }

    if let Err(e) = fs::rename(&partial, destination) {
        discard(&partial);
        return Err(MoveFailure::from_io(&e));
    }

    if let Err(e) = fs::remove_file(source) {
        // Keep exactly one copy: the source is authoritative until it is gone.
        discard(destination);
        return Err(MoveFailure::from_io(&e));
    }

    debug!("Copied and verified {} -> {}", source.display(), destination.display());
    Ok(())
}

fn copy_into(
    source: &Path,
    partial: &Path,
    expected_size: u64,
    verify_checksum: bool,
) -> Result<(), MoveFailure> {
    let io_err = |e: io::Error| MoveFailure::from_io(&e);

    let mut input = File::open(source).map_err(io_err)?;
    let source_meta = input.metadata().map_err(io_err)?;
    let mut output = File::create_new(partial).map_err(io_err)?;

    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;
    loop {
        let n = input.read(&mut buffer).map_err(io_err)?;
        if n == 0 {
            break;
        }
        output.write_all(&buffer[..n]).map_err(io_err)?;
        hasher.update(&buffer[..n]);
        written += n as u64;
    }

    if written != expected_size {
        return Err(MoveFailure::SizeChanged { planned: expected_size, actual: written });
    }

    preserve_owner(&output, &source_meta).map_err(io_err)?;
    if let Ok(mtime) = source_meta.modified() {
        set_mtime(&output, mtime);
    }
    output.sync_all().map_err(io_err)?;
    drop(output);

    fs::set_permissions(partial, source_meta.permissions()).map_err(io_err)?;

    let copied_len = fs::metadata(partial).map_err(io_err)?.len();
    if copied_len != expected_size {
        return Err(MoveFailure::VerifyMismatch);
    }

    if verify_checksum && hash_file(partial).map_err(io_err)? != hasher.finalize() {
        return Err(MoveFailure::VerifyMismatch);
    }

    Ok(())
}

/// Give the copy the source's owner and group. Without the privilege to
/// chown, the copy keeps the running user's ownership.
#[cfg(unix)]
fn preserve_owner(file: &File, source: &fs::Metadata) -> io::Result<()> {
    use std::os::unix::fs::{fchown, MetadataExt};
    match fchown(file, Some(source.uid()), Some(source.gid())) {
        Err(e) if e.raw_os_error() == Some(libc::EPERM) => {
            warn!("Cannot preserve owner {}:{}: {}", source.uid(), source.gid(), e);
            Ok(())
        }
        other => other,
    }
}

#[cfg(not(unix))]
fn preserve_owner(_file: &File, _source: &fs::Metadata) -> io::Result<()> {
    Ok(())
}

fn set_mtime(file: &File, mtime: SystemTime) {
    if let Err(e) = file.set_modified(mtime) {
        warn!("Failed to preserve modification time: {}", e);
    }
}

pub(crate) fn hash_file(path: &Path) -> io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    let mut file = File::open(path)?;
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize())
}
