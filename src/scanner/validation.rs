use crate::error::{ConsolidateError, Result};
use std::path::{Component, Path, PathBuf};

/// Hard reject any path containing /mnt/user/ to prevent FUSE corruption.
/// Every read and move must go through direct disk paths (/mnt/diskX/).
pub(crate) fn validate_path(path: &str) -> Result<()> {
    if path.contains("/mnt/user/") || path.contains("/mnt/user0/") {
        return Err(ConsolidateError::InvalidTarget(format!(
            "SAFETY: Path '{path}' uses Unraid's FUSE layer (/mnt/user/). \
             Only direct disk paths (/mnt/diskX/) may be used for consolidation."
        )));
    }
    Ok(())
}

/// Check a share name: a single path component, not a reserved system directory.
pub(crate) fn validate_share_name(share: &str, reserved_prefixes: &[String]) -> Result<()> {
    if share.is_empty() {
        return Err(ConsolidateError::InvalidInput("share name is required".to_string()));
    }
    if share.contains('/') || share == "." || share == ".." {
        return Err(ConsolidateError::InvalidInput(format!(
            "share name '{share}' must be a single directory name"
        )));
    }
    if let Some(prefix) = reserved_prefixes.iter().find(|p| share.starts_with(p.as_str())) {
        return Err(ConsolidateError::InvalidInput(format!(
            "share name '{share}' starts with reserved prefix '{prefix}'"
        )));
    }
    Ok(())
}

/// Normalize a subfolder given relative to the share root.
///
/// Leading/trailing slashes are tolerated; `.`/`..` components and empty
/// paths are rejected so the result can never escape the share.
pub(crate) fn normalize_subfolder(subfolder: &str) -> Result<PathBuf> {
    let trimmed = subfolder.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(ConsolidateError::InvalidInput("subfolder is required".to_string()));
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ConsolidateError::InvalidInput(format!(
                    "subfolder '{subfolder}' must be a plain relative path"
                )));
            }
        }
    }
    Ok(normalized)
}
