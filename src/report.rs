//! Machine readable summary of a boot

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use emu_boot_core::Result;

/// Outcome of a successful start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootReport {
    pub serial: String,
    pub avd_name: String,
    pub launch_id: String,
    pub waited_for_boot: bool,
    pub elapsed_secs: u64,
    pub emulator_log: PathBuf,
}

impl BootReport {
    /// Write the report as pretty printed JSON
    pub async fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        info!("Boot report written to {:?}", path);
        Ok(())
    }
}
