//! Hands the started serial to the following pipeline steps

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use emu_boot_core::{EmuBootError, ExportTarget, Result};

/// Writes one environment value to the configured target
#[derive(Debug, Clone)]
pub struct Exporter {
    target: ExportTarget,
}

impl Exporter {
    pub fn new(target: ExportTarget) -> Self {
        Self { target }
    }

    /// Export `key=value`
    pub async fn export(&self, key: &str, value: &str) -> Result<()> {
        match &self.target {
            ExportTarget::Envman => envman_add(key, value).await?,
            ExportTarget::EnvFile(path) => append_env_file(path, key, value).await?,
            ExportTarget::Disabled => {
                debug!("Export disabled, not exporting {}", key);
                return Ok(());
            }
        }

        info!("{} -> {}", key, value);
        Ok(())
    }
}

/// `envman add --key <key>` with the value on stdin
async fn envman_add(key: &str, value: &str) -> Result<()> {
    let envman = which::which("envman")
        .map_err(|_| EmuBootError::Export("envman not found in PATH".into()))?;

    let mut child = Command::new(&envman)
        .args(["add", "--key", key])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| export_error("failed to run envman", e))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(value.as_bytes())
            .await
            .map_err(|e| export_error("failed to pass value to envman", e))?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| export_error("failed to wait for envman", e))?;
    if !output.status.success() {
        return Err(EmuBootError::Export(format!(
            "envman add --key {} failed: {}",
            key,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(())
}

/// Append a `KEY=value` line to a dotenv style file
async fn append_env_file(path: &Path, key: &str, value: &str) -> Result<()> {
    let context = format!("failed to write {}", path.display());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| export_error(&context, e))?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| export_error(&context, e))?;

    file.write_all(format!("{}={}\n", key, value).as_bytes())
        .await
        .map_err(|e| export_error(&context, e))?;
    file.flush().await.map_err(|e| export_error(&context, e))?;
    Ok(())
}

fn export_error(context: &str, err: std::io::Error) -> EmuBootError {
    EmuBootError::Export(format!("{}: {}", context, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_env_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/serial.env");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "OTHER=1\n").unwrap();

        let exporter = Exporter::new(ExportTarget::EnvFile(path.clone()));
        exporter
            .export("BITRISE_EMULATOR_SERIAL", "emulator-5554")
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "OTHER=1\nBITRISE_EMULATOR_SERIAL=emulator-5554\n"
        );
    }

    #[tokio::test]
    async fn test_env_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/serial.env");

        Exporter::new(ExportTarget::EnvFile(path.clone()))
            .export("KEY", "value")
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "KEY=value\n");
    }

    #[tokio::test]
    async fn test_unwritable_env_file_is_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let exporter = Exporter::new(ExportTarget::EnvFile(blocker.join("serial.env")));
        let err = exporter.export("KEY", "value").await.unwrap_err();

        assert!(matches!(err, EmuBootError::Export(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_disabled_export() {
        let exporter = Exporter::new(ExportTarget::Disabled);
        assert!(exporter.export("KEY", "value").await.is_ok());
    }
}
