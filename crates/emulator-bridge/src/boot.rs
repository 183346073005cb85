//! Boot Detection
//!
//! Waits for a freshly launched emulator to show up in `adb devices` and then
//! for its boot properties to settle.
//!
//! The watcher moves through three phases:
//!
//! ```text
//! WaitingForSerial --(new online emulator)--> WaitingForBoot --(props set)--> Ready
//!        \______________________(wait_for_boot = false)_____________________/
//! ```
//!
//! Every poll is preceded by a sleep of `poll_interval`. The overall deadline
//! and the emulator process lifetime are enforced by [`wait_until_ready`].

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use emu_boot_core::EmuBootError;

use crate::adb::{AdbClient, AdbError, BootStatus};
use crate::device::DeviceList;
use crate::emulator::{EmulatorError, EmulatorProcess};

/// Boot wait errors
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error("Start emulator timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("emulator exited before the device was ready (exit code {})", .0.map(|c| c.to_string()).unwrap_or_else(|| "none".into()))]
    EmulatorExited(Option<i32>),
    #[error(transparent)]
    Adb(#[from] AdbError),
    #[error(transparent)]
    Emulator(#[from] EmulatorError),
}

impl From<BootError> for EmuBootError {
    fn from(err: BootError) -> Self {
        match err {
            BootError::Adb(e) => e.into(),
            BootError::Emulator(e) => e.into(),
            timeout @ BootError::Timeout(_) => EmuBootError::Timeout(timeout.to_string()),
            exited @ BootError::EmulatorExited(_) => EmuBootError::Emulator(exited.to_string()),
        }
    }
}

/// What the watcher needs to know about devices
#[allow(async_fn_in_trait)]
pub trait DeviceProbe {
    /// Current `adb devices` listing
    async fn devices(&self) -> Result<DeviceList, AdbError>;
    /// Boot properties of one device
    async fn boot_status(&self, serial: &str) -> Result<BootStatus, AdbError>;
    /// Launch id property of one device
    async fn launch_id(&self, serial: &str) -> Result<Option<String>, AdbError>;
}

impl DeviceProbe for AdbClient {
    async fn devices(&self) -> Result<DeviceList, AdbError> {
        AdbClient::devices(self).await
    }

    async fn boot_status(&self, serial: &str) -> Result<BootStatus, AdbError> {
        AdbClient::boot_status(self, serial).await
    }

    async fn launch_id(&self, serial: &str) -> Result<Option<String>, AdbError> {
        AdbClient::launch_id(self, serial).await
    }
}

/// Polling behaviour
#[derive(Debug, Clone, Copy)]
pub struct WaitSettings {
    pub poll_interval: Duration,
    pub wait_for_boot: bool,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            wait_for_boot: true,
        }
    }
}

/// Watcher phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootPhase {
    WaitingForSerial,
    WaitingForBoot { serial: String },
    Ready { serial: String },
}

/// Tracks one launched emulator until it is usable
pub struct BootWatcher<'a, P: DeviceProbe> {
    probe: &'a P,
    baseline: DeviceList,
    launch_id: Option<String>,
    settings: WaitSettings,
    phase: BootPhase,
}

impl<'a, P: DeviceProbe> BootWatcher<'a, P> {
    /// `baseline` is the device listing taken before the emulator was launched
    pub fn new(
        probe: &'a P,
        baseline: DeviceList,
        launch_id: Option<String>,
        settings: WaitSettings,
    ) -> Self {
        Self {
            probe,
            baseline,
            launch_id,
            settings,
            phase: BootPhase::WaitingForSerial,
        }
    }

    pub fn phase(&self) -> &BootPhase {
        &self.phase
    }

    /// Poll once and advance at most one phase
    pub async fn step(&mut self) -> Result<&BootPhase, AdbError> {
        match &self.phase {
            BootPhase::WaitingForSerial => {
                debug!("> Checking for started device serial...");

                let Some(devices) = tolerate(self.probe.devices().await)? else {
                    return Ok(&self.phase);
                };

                if let Some(serial) = self.find_started_serial(&devices).await? {
                    info!("> Started device serial: {}", serial);
                    self.phase = if self.settings.wait_for_boot {
                        BootPhase::WaitingForBoot { serial }
                    } else {
                        BootPhase::Ready { serial }
                    };
                }
            }
            BootPhase::WaitingForBoot { serial } => {
                debug!("> Checking if device booted...");

                let serial = serial.clone();
                if let Some(status) = tolerate(self.probe.boot_status(&serial).await)? {
                    if status.is_complete() {
                        info!("> Device booted");
                        self.phase = BootPhase::Ready { serial };
                    } else {
                        debug!(
                            "> Boot in progress ({}={:?}, {}={:?}, {}={:?})",
                            crate::adb::PROP_DEV_BOOTCOMPLETE,
                            status.dev_bootcomplete,
                            crate::adb::PROP_SYS_BOOT_COMPLETED,
                            status.sys_boot_completed,
                            crate::adb::PROP_BOOTANIM,
                            status.bootanim
                        );
                    }
                }
            }
            BootPhase::Ready { .. } => {}
        }

        Ok(&self.phase)
    }

    /// Poll until the device is ready, returning its serial
    pub async fn run(mut self) -> Result<String, AdbError> {
        loop {
            tokio::time::sleep(self.settings.poll_interval).await;

            if let BootPhase::Ready { serial } = self.step().await? {
                return Ok(serial.clone());
            }
        }
    }

    /// Online emulators absent from the baseline; several candidates are
    /// told apart by the launch id property
    async fn find_started_serial(&self, devices: &DeviceList) -> Result<Option<String>, AdbError> {
        let candidates: Vec<&str> = devices
            .started_since(&self.baseline)
            .filter(|d| d.is_usable())
            .map(|d| d.serial.as_str())
            .collect();

        match candidates.as_slice() {
            [] => Ok(None),
            [serial] => Ok(Some(serial.to_string())),
            _ => {
                let Some(ref launch_id) = self.launch_id else {
                    warn!(
                        "Several new emulators found ({}), using {}",
                        candidates.join(", "),
                        candidates[0]
                    );
                    return Ok(Some(candidates[0].to_string()));
                };

                for serial in &candidates {
                    if let Some(Some(id)) = tolerate(self.probe.launch_id(serial).await)? {
                        if &id == launch_id {
                            return Ok(Some(serial.to_string()));
                        }
                    }
                }

                debug!("None of {} carries launch id {} yet", candidates.join(", "), launch_id);
                Ok(None)
            }
        }
    }
}

/// Turn transient adb failures into "no answer yet"
fn tolerate<T>(result: Result<T, AdbError>) -> Result<Option<T>, AdbError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_transient() => {
            debug!("> adb not ready: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Race `ready` against the emulator exiting and the `timeout` deadline.
///
/// On timeout the emulator is killed.
pub async fn wait_until_ready<F>(
    process: &mut EmulatorProcess,
    ready: F,
    timeout: Duration,
) -> Result<String, BootError>
where
    F: Future<Output = Result<String, AdbError>>,
{
    let outcome = tokio::time::timeout(timeout, async {
        tokio::select! {
            result = ready => result.map_err(BootError::from),
            status = process.wait() => match status {
                Ok(status) => Err(BootError::EmulatorExited(status.code())),
                Err(e) => Err(BootError::Emulator(e)),
            },
        }
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(_) => {
            if let Err(e) = process.kill().await {
                error!("Failed to kill emulator command, error: {}", e);
            }
            Err(BootError::Timeout(timeout))
        }
    }
}
