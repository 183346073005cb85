//! Command line and environment inputs
//!
//! Every input can be given as a flag or through the environment variable the
//! CI step exposes it under. Values from `--config` fill in what neither sets.

use std::path::PathBuf;

use clap::Parser;

use emu_boot_core::config::parse_flag;
use emu_boot_core::{ConfigLayer, EmuBootError, Result, StepConfig};

/// Boot an Android emulator and export its serial
#[derive(Debug, Parser)]
#[command(name = "emu-boot", version, about)]
pub struct Cli {
    /// Name of the AVD image to boot
    #[arg(long, env = "emulator_name")]
    pub emulator_name: Option<String>,

    /// Emulator skin (name or WxH); `-noskin` when empty
    #[arg(long, env = "skin")]
    pub skin: Option<String>,

    /// Extra emulator flags, shell quoted
    #[arg(long, env = "emulator_options", allow_hyphen_values = true)]
    pub emulator_options: Option<String>,

    /// Deprecated, use --emulator-options
    #[arg(long, env = "other_options", allow_hyphen_values = true, hide = true)]
    pub other_options: Option<String>,

    /// Android SDK root [default: $ANDROID_HOME or $ANDROID_SDK_ROOT]
    #[arg(long, env = "android_home")]
    pub android_home: Option<PathBuf>,

    /// Wait until the device finished booting (true/false)
    #[arg(long, env = "wait_for_boot")]
    pub wait_for_boot: Option<String>,

    /// Seconds to wait for the device before the emulator is killed
    #[arg(long, env = "boot_timeout")]
    pub boot_timeout: Option<String>,

    /// Seconds between two device polls
    #[arg(long, env = "poll_interval")]
    pub poll_interval: Option<String>,

    /// Serial export target: envman, none or file:<path>
    #[arg(long, env = "serial_export")]
    pub export: Option<String>,

    /// File receiving the emulator output
    #[arg(long, env = "emulator_log")]
    pub emulator_log: Option<PathBuf>,

    /// Write a JSON boot report to this path
    #[arg(long, env = "boot_report")]
    pub report: Option<PathBuf>,

    /// TOML file with default inputs
    #[arg(long, env = "EMU_BOOT_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Inputs given on the command line or in the environment
    pub fn to_layer(&self) -> Result<ConfigLayer> {
        let export = match self.export.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Some(value.parse()?),
            _ => None,
        };

        Ok(ConfigLayer {
            emulator_name: self.emulator_name.clone(),
            skin: self.skin.clone(),
            emulator_options: self.emulator_options.clone(),
            other_options: self.other_options.clone(),
            android_home: self.android_home.clone(),
            wait_for_boot: match self.wait_for_boot.as_deref() {
                Some(value) => parse_flag(value)?,
                None => None,
            },
            boot_timeout_secs: parse_secs("boot_timeout", self.boot_timeout.as_deref())?,
            poll_interval_secs: parse_secs("poll_interval", self.poll_interval.as_deref())?,
            export,
            emulator_log: self.emulator_log.clone(),
            report: self.report.clone(),
        })
    }

    /// Merge the inputs with the config file and resolve the SDK root
    pub async fn load_config(&self) -> Result<StepConfig> {
        let mut layer = self.to_layer()?;

        if let Some(ref path) = self.config {
            layer = layer.or(ConfigLayer::load_file(path).await?);
        }

        let mut config = StepConfig::from_layer(layer);
        config.resolve_android_home();
        Ok(config)
    }
}

fn parse_secs(name: &str, value: Option<&str>) -> Result<Option<u64>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| {
            EmuBootError::Config(format!("{} must be a number of seconds, got: {}", name, value))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_boot_core::ExportTarget;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("emu-boot").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_to_layer() {
        let cli = parse(&[
            "--emulator-name",
            "ci_avd",
            "--emulator-options",
            "-no-window -no-audio",
            "--wait-for-boot",
            "false",
            "--boot-timeout",
            "300",
            "--export",
            "file:serial.env",
        ]);

        let layer = cli.to_layer().unwrap();
        assert_eq!(layer.emulator_name.as_deref(), Some("ci_avd"));
        assert_eq!(layer.emulator_options.as_deref(), Some("-no-window -no-audio"));
        assert_eq!(layer.wait_for_boot, Some(false));
        assert_eq!(layer.boot_timeout_secs, Some(300));
        assert_eq!(layer.poll_interval_secs, None);
        assert_eq!(layer.export, Some(ExportTarget::EnvFile(PathBuf::from("serial.env"))));
    }

    #[test]
    fn test_empty_inputs() {
        let cli = parse(&["--wait-for-boot", "", "--boot-timeout", "", "--export", ""]);

        let layer = cli.to_layer().unwrap();
        assert_eq!(layer.wait_for_boot, None);
        assert_eq!(layer.boot_timeout_secs, None);
        assert_eq!(layer.export, None);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(parse(&["--poll-interval", "soon"]).to_layer().is_err());
        assert!(parse(&["--wait-for-boot", "maybe"]).to_layer().is_err());
        assert!(parse(&["--export", "slack"]).to_layer().is_err());
    }

    #[tokio::test]
    async fn test_config_file_fills_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emu-boot.toml");
        std::fs::write(
            &path,
            format!(
                "emulator_name = \"from_file\"\nskin = \"768x1280\"\nandroid_home = \"{}\"\n",
                dir.path().display()
            ),
        )
        .unwrap();

        let cli = parse(&[
            "--emulator-name",
            "from_cli",
            "--config",
            path.to_str().unwrap(),
        ]);
        let config = cli.load_config().await.unwrap();

        assert_eq!(config.emulator_name, "from_cli");
        assert_eq!(config.skin.as_deref(), Some("768x1280"));
        assert_eq!(config.android_home.as_deref(), Some(dir.path()));
    }
}
