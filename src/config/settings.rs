use super::defaults::{
    DEFAULT_CONFIG_PATH, DEFAULT_DB_PATH, DEFAULT_RESERVED_PREFIXES, DEFAULT_SAFETY_MARGIN,
    DEFAULT_SCAN_THREADS, UNRAID_MNT_BASE, UNRAID_USER_SHARE_BASE,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub config_path: String,
    pub db_path: String,
    /// Base mount path for Unraid array disks.
    pub mnt_base: String,
    /// Union mount listing user shares. Only read for share names.
    pub user_share_base: String,
    /// Minimum free space to preserve on the destination disk, in bytes.
    pub safety_margin: u64,
    pub reserved_prefixes: Vec<String>,
    /// Disk names never read from or written to (e.g., "disk3", "cache").
    pub excluded_disks: BTreeSet<String>,
    /// Compare blake3 checksums after each cross-disk copy, not just sizes.
    pub verify_checksum: bool,
    /// Optional log file receiving a copy of all log output.
    pub log_file: Option<String>,
    pub scan_threads: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            db_path: DEFAULT_DB_PATH.to_string(),
            mnt_base: UNRAID_MNT_BASE.to_string(),
            user_share_base: UNRAID_USER_SHARE_BASE.to_string(),
            safety_margin: DEFAULT_SAFETY_MARGIN,
            reserved_prefixes: DEFAULT_RESERVED_PREFIXES.iter().map(ToString::to_string).collect(),
            excluded_disks: BTreeSet::new(),
            verify_checksum: true,
            log_file: None,
            scan_threads: DEFAULT_SCAN_THREADS,
        }
    }
}

impl AppConfig {
    /// Load configuration, merging defaults with config file values and env overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("CONSLD8_CONFIG_PATH") {
            config.config_path = path;
        }

        let cfg_path = Path::new(&config.config_path);
        if cfg_path.exists() {
            let contents = fs::read_to_string(cfg_path)
                .with_context(|| format!("Failed to read config file: {}", config.config_path))?;
            config.parse_ini(&contents);
        }

        if let Ok(path) = std::env::var("CONSLD8_DB_PATH") {
            config.db_path = path;
        }
        if let Ok(base) = std::env::var("CONSLD8_MNT_BASE") {
            config.user_share_base = format!("{}/user", base.trim_end_matches('/'));
            config.mnt_base = base;
        }

        config.validate()?;
        Ok(config)
    }
}
