//! The start command
//!
//! Boots one emulator, waits for it and exports its serial.

use std::time::Instant;

use tracing::{error, info, warn};
use uuid::Uuid;

use emu_boot_android_toolchain::ToolchainDetector;
use emu_boot_core::{EmuBootError, Result, StepConfig, SERIAL_EXPORT_KEY};
use emu_boot_emulator_bridge::{
    wait_until_ready, AdbClient, AvdError, AvdManager, BootWatcher, EmulatorLauncher,
    EmulatorOptions, EmulatorProcess, WaitSettings, LOG_TAIL_LINES,
};

use crate::export::Exporter;
use crate::report::BootReport;

/// Start command options
pub struct StartCommand {
    pub config: StepConfig,
    avd_manager: AvdManager,
}

impl StartCommand {
    /// Create the command, validating AVDs against the environment's AVD home
    pub fn new(config: StepConfig) -> Self {
        Self {
            config,
            avd_manager: AvdManager::from_env(),
        }
    }

    /// Use a specific AVD home
    pub fn with_avd_manager(mut self, avd_manager: AvdManager) -> Self {
        self.avd_manager = avd_manager;
        self
    }

    /// Execute the start command, returning what was booted
    pub async fn execute(&self) -> Result<BootReport> {
        let started = Instant::now();
        let config = &self.config;

        config.log_summary();
        config.validate()?;
        let extra_args = config.emulator_args()?;

        self.check_avd().await?;

        let detector = ToolchainDetector::new(config.android_home()?);
        let adb = AdbClient::new(detector.adb_path()?);
        let emulator = detector.emulator_binary()?;

        if let Err(e) = adb.start_server().await {
            warn!("Failed to start adb server: {}", e);
        }

        let baseline = adb.devices().await?;
        if !baseline.is_empty() {
            info!("Running devices:");
            for device in baseline.iter() {
                info!("* {}", device.display_name());
            }
        }

        let launch_id = Uuid::new_v4().to_string();
        let options = EmulatorOptions {
            skin: config.skin.clone(),
            launch_id: Some(launch_id.clone()),
            extra_args,
        };

        info!("Start emulator");
        let launcher = EmulatorLauncher::new(emulator.path, emulator.envs);
        let mut process = launcher
            .launch(&config.emulator_name, &options, &config.emulator_log)
            .await?;
        if let Some(pid) = process.pid() {
            info!("Emulator pid: {}, output: {}", pid, process.log_path().display());
        }

        let settings = WaitSettings {
            poll_interval: config.poll_interval,
            wait_for_boot: config.wait_for_boot,
        };
        let watcher = BootWatcher::new(&adb, baseline, Some(launch_id.clone()), settings);

        info!("Waiting for emulator boot");
        let serial = match wait_until_ready(&mut process, watcher.run(), config.boot_timeout).await {
            Ok(serial) => serial,
            Err(e) => {
                log_emulator_output(&process).await;
                return Err(e.into());
            }
        };

        if config.wait_for_boot {
            adb.unlock(&serial).await;
            info!("Emulator is ready to use");
        }

        if let Err(e) = Exporter::new(config.export.clone())
            .export(SERIAL_EXPORT_KEY, &serial)
            .await
        {
            if !e.is_recoverable() {
                return Err(e);
            }
            warn!("Failed to export {}: {}", SERIAL_EXPORT_KEY, e);
        }

        let report = BootReport {
            serial,
            avd_name: config.emulator_name.clone(),
            launch_id,
            waited_for_boot: config.wait_for_boot,
            elapsed_secs: started.elapsed().as_secs(),
            emulator_log: process.log_path().to_path_buf(),
        };

        if let Some(ref path) = config.report {
            report.write(path).await?;
        }

        info!("Emulator started: {}", report.serial);
        Ok(report)
    }

    async fn check_avd(&self) -> Result<()> {
        info!("Validate AVD image");

        match self.avd_manager.ensure_exists(&self.config.emulator_name).await {
            Ok(Some(avd)) => {
                info!(
                    "AVD image ({}) exist, target: {}",
                    avd.name,
                    avd.target.as_deref().unwrap_or("unknown")
                );
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(AvdError::NotFound { name, available }) => {
                if !available.is_empty() {
                    info!("Available AVD images:");
                    for avd in &available {
                        info!("* {}", avd);
                    }
                }
                Err(EmuBootError::Avd(format!("AVD image not exists with name: {}", name)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Surface the tail of the emulator output after a failed start
async fn log_emulator_output(process: &EmulatorProcess) {
    let tail = process.log_tail(LOG_TAIL_LINES).await;
    if tail.is_empty() {
        return;
    }

    error!("Emulator output ({}):", process.log_path().display());
    for line in tail {
        error!("  {}", line);
    }
}
