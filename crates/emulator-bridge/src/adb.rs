//! ADB (Android Debug Bridge) Client
//!
//! Runs the `adb` binary and parses the bits of its output the step needs.

use std::io;
use std::path::PathBuf;

use tokio::process::Command;
use tracing::{debug, warn};

use emu_boot_core::EmuBootError;

use crate::device::{parse_devices, DeviceList};

/// Boot property: set by init once the framework reports boot complete
pub const PROP_DEV_BOOTCOMPLETE: &str = "dev.bootcomplete";
/// Boot property: set by the activity manager after boot
pub const PROP_SYS_BOOT_COMPLETED: &str = "sys.boot_completed";
/// Boot property: state of the boot animation service
pub const PROP_BOOTANIM: &str = "init.svc.bootanim";
/// Property carrying the launch id passed with `-prop emu.uuid=...`
pub const PROP_LAUNCH_ID: &str = "emu.uuid";

/// ADB errors
#[derive(Debug, thiserror::Error)]
pub enum AdbError {
    #[error("adb not found at: {}", .0.display())]
    NotFound(PathBuf),
    #[error("adb command failed: {0}")]
    CommandFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdbError {
    /// Failures worth retrying on the next poll (device offline, not yet
    /// authorized, adb server restarting)
    pub fn is_transient(&self) -> bool {
        matches!(self, AdbError::CommandFailed(_))
    }
}

impl From<AdbError> for EmuBootError {
    fn from(err: AdbError) -> Self {
        match err {
            AdbError::Io(e) => EmuBootError::Io(e),
            other => EmuBootError::Adb(other.to_string()),
        }
    }
}

/// The three properties that together mean "booted"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootStatus {
    pub dev_bootcomplete: String,
    pub sys_boot_completed: String,
    pub bootanim: String,
}

impl BootStatus {
    pub fn is_complete(&self) -> bool {
        self.dev_bootcomplete == "1" && self.sys_boot_completed == "1" && self.bootanim == "stopped"
    }
}

/// ADB Client
#[derive(Debug, Clone)]
pub struct AdbClient {
    adb_path: PathBuf,
}

impl AdbClient {
    /// Create a client for the given adb executable
    pub fn new(adb_path: impl Into<PathBuf>) -> Self {
        Self {
            adb_path: adb_path.into(),
        }
    }

    /// Run an ADB command, returning its stdout
    async fn run(&self, args: &[&str]) -> Result<String, AdbError> {
        debug!("$ {} {}", self.adb_path.display(), args.join(" "));

        let output = Command::new(&self.adb_path)
            .args(args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    AdbError::NotFound(self.adb_path.clone())
                } else {
                    AdbError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(AdbError::CommandFailed(format!(
                "adb {} exited with {}: {}",
                args.join(" "),
                output.status.code().unwrap_or(-1),
                detail.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run an ADB command for a specific device
    async fn run_for_device(&self, serial: &str, args: &[&str]) -> Result<String, AdbError> {
        let mut full_args = vec!["-s", serial];
        full_args.extend(args);
        self.run(&full_args).await
    }

    /// Start the ADB server
    pub async fn start_server(&self) -> Result<(), AdbError> {
        self.run(&["start-server"]).await?;
        Ok(())
    }

    /// List attached devices
    pub async fn devices(&self) -> Result<DeviceList, AdbError> {
        let output = self.run(&["devices", "-l"]).await?;
        debug!("{}", output.trim());
        Ok(parse_devices(&output))
    }

    /// Run a shell command on device
    pub async fn shell(&self, serial: &str, command: &str) -> Result<String, AdbError> {
        self.run_for_device(serial, &["shell", command]).await
    }

    /// Get device property
    pub async fn get_prop(&self, serial: &str, prop: &str) -> Result<String, AdbError> {
        let output = self.shell(serial, &format!("getprop {}", prop)).await?;
        Ok(output.trim().to_string())
    }

    /// Read the boot properties concurrently
    pub async fn boot_status(&self, serial: &str) -> Result<BootStatus, AdbError> {
        let (dev_bootcomplete, sys_boot_completed, bootanim) = futures::try_join!(
            self.get_prop(serial, PROP_DEV_BOOTCOMPLETE),
            self.get_prop(serial, PROP_SYS_BOOT_COMPLETED),
            self.get_prop(serial, PROP_BOOTANIM),
        )?;

        Ok(BootStatus {
            dev_bootcomplete,
            sys_boot_completed,
            bootanim,
        })
    }

    /// Launch id the emulator was started with, if any
    pub async fn launch_id(&self, serial: &str) -> Result<Option<String>, AdbError> {
        let value = self.get_prop(serial, PROP_LAUNCH_ID).await?;
        Ok(Some(value).filter(|v| !v.is_empty()))
    }

    /// Dismiss the lock screen (menu key, then soft-left key)
    pub async fn unlock(&self, serial: &str) {
        for keycode in ["82", "1"] {
            if let Err(e) = self
                .run_for_device(serial, &["shell", "input", "keyevent", keycode])
                .await
            {
                warn!("Failed to send keyevent {} to {}: {}", keycode, serial, e);
            }
        }
    }
}
