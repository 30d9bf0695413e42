use super::settings::AppConfig;
use crate::scanner::validation::validate_path;
use anyhow::Result;

impl AppConfig {
    /// Validate configuration values are sane.
    pub(crate) fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.mnt_base.is_empty(), "mnt_base must not be empty");
        anyhow::ensure!(
            self.mnt_base.trim_end_matches('/') != self.user_share_base.trim_end_matches('/'),
            "mnt_base must differ from user_share_base"
        );
        validate_path(&format!("{}/", self.mnt_base.trim_end_matches('/')))?;
        anyhow::ensure!(
            self.scan_threads >= 1 && self.scan_threads <= 32,
            "scan_threads must be between 1 and 32"
        );
        anyhow::ensure!(
            !self.reserved_prefixes.is_empty(),
            "reserved_prefixes must name at least one prefix"
        );
        Ok(())
    }
}
