use super::settings::AppConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Keys understood by `parse_ini`; anything else in the file is ignored.
pub(crate) const CONFIG_KEYS: &[&str] = &[
    "DB_PATH",
    "MNT_BASE",
    "USER_SHARE_BASE",
    "SAFETY_MARGIN",
    "SCAN_THREADS",
    "RESERVED_PREFIXES",
    "EXCLUDED_DISKS",
    "VERIFY_CHECKSUM",
    "LOG_FILE",
];

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl AppConfig {
    /// Parse Unraid's simple KEY="VALUE" config format.
    pub(crate) fn parse_ini(&mut self, contents: &str) {
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');

                match key {
                    "DB_PATH" => self.db_path = value.to_string(),
                    "MNT_BASE" => self.mnt_base = value.to_string(),
                    "USER_SHARE_BASE" => self.user_share_base = value.to_string(),
                    "SAFETY_MARGIN" => {
                        if let Ok(v) = value.parse() {
                            self.safety_margin = v;
                        }
                    }
                    "SCAN_THREADS" => {
                        if let Ok(v) = value.parse() {
                            self.scan_threads = v;
                        }
                    }
                    "RESERVED_PREFIXES" => {
                        self.reserved_prefixes = split_list(value).collect();
                    }
                    "EXCLUDED_DISKS" => {
                        self.excluded_disks = split_list(value).collect();
                    }
                    "VERIFY_CHECKSUM" => {
                        self.verify_checksum = value == "yes" || value == "true" || value == "1";
                    }
                    "LOG_FILE" => {
                        self.log_file = (!value.is_empty()).then(|| value.to_string());
                    }
                    _ => {} // Ignore unknown keys
                }
            }
        }
    }

    /// Save current config back to the Unraid INI file.
    pub fn save(&self) -> Result<()> {
        let excluded = self.excluded_disks.iter().cloned().collect::<Vec<_>>().join(",");

        let contents = format!(
            r#"# consld8 configuration
# Auto-generated by `consld8 settings`
DB_PATH="{}"
MNT_BASE="{}"
USER_SHARE_BASE="{}"
SAFETY_MARGIN="{}"
SCAN_THREADS="{}"
RESERVED_PREFIXES="{}"
EXCLUDED_DISKS="{}"
VERIFY_CHECKSUM="{}"
LOG_FILE="{}"
"#,
            self.db_path,
            self.mnt_base,
            self.user_share_base,
            self.safety_margin,
            self.scan_threads,
            self.reserved_prefixes.join(","),
            excluded,
            if self.verify_checksum { "yes" } else { "no" },
            self.log_file.as_deref().unwrap_or_default(),
        );

        if let Some(parent) = Path::new(&self.config_path).parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.config_path, contents)
            .with_context(|| format!("Failed to write config to {}", self.config_path))?;

        Ok(())
    }
}
