//! Step Configuration
//!
//! Inputs of the emulator start step. Values come in layers (command line,
//! environment, optional TOML file) and are merged into a [`StepConfig`]:
//! - AVD name, skin and extra emulator flags
//! - Android SDK root
//! - Boot wait behaviour and timing
//! - Where the started serial is exported to

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EmuBootError, Result};

/// Hard deadline for launching and booting the emulator
pub const DEFAULT_BOOT_TIMEOUT: Duration = Duration::from_secs(800);

/// Delay between two device polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// File receiving the emulator's output
pub const DEFAULT_EMULATOR_LOG: &str = "emulator.log";

/// Environment key the started serial is exported under
pub const SERIAL_EXPORT_KEY: &str = "BITRISE_EMULATOR_SERIAL";

/// Where the started device serial is handed to the next pipeline steps
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExportTarget {
    /// `envman add --key <KEY>`
    #[default]
    Envman,
    /// Append `KEY=value` to a dotenv style file
    EnvFile(PathBuf),
    /// Do not export
    Disabled,
}

impl FromStr for ExportTarget {
    type Err = EmuBootError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "envman" => Ok(ExportTarget::Envman),
            "none" | "off" => Ok(ExportTarget::Disabled),
            _ => match s.strip_prefix("file:") {
                Some(path) if !path.trim().is_empty() => {
                    Ok(ExportTarget::EnvFile(PathBuf::from(path.trim())))
                }
                _ => Err(EmuBootError::Config(format!(
                    "invalid export target '{}' (expected envman, none or file:<path>)",
                    s
                ))),
            },
        }
    }
}

impl TryFrom<String> for ExportTarget {
    type Error = EmuBootError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ExportTarget> for String {
    fn from(target: ExportTarget) -> Self {
        target.to_string()
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportTarget::Envman => write!(f, "envman"),
            ExportTarget::EnvFile(path) => write!(f, "file:{}", path.display()),
            ExportTarget::Disabled => write!(f, "none"),
        }
    }
}

/// One layer of step inputs, every value optional.
///
/// The TOML config file deserializes into this type, and the command line
/// produces one as well. Layers are merged with [`ConfigLayer::or`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub emulator_name: Option<String>,
    pub skin: Option<String>,
    pub emulator_options: Option<String>,
    pub other_options: Option<String>,
    pub android_home: Option<PathBuf>,
    pub wait_for_boot: Option<bool>,
    pub boot_timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub export: Option<ExportTarget>,
    pub emulator_log: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

impl ConfigLayer {
    /// Parse a layer from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load a layer from a TOML file
    pub async fn load_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            EmuBootError::Config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Merge two layers; values set in `self` win over `lower`
    pub fn or(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            emulator_name: self.emulator_name.or(lower.emulator_name),
            skin: self.skin.or(lower.skin),
            emulator_options: self.emulator_options.or(lower.emulator_options),
            other_options: self.other_options.or(lower.other_options),
            android_home: self.android_home.or(lower.android_home),
            wait_for_boot: self.wait_for_boot.or(lower.wait_for_boot),
            boot_timeout_secs: self.boot_timeout_secs.or(lower.boot_timeout_secs),
            poll_interval_secs: self.poll_interval_secs.or(lower.poll_interval_secs),
            export: self.export.or(lower.export),
            emulator_log: self.emulator_log.or(lower.emulator_log),
            report: self.report.or(lower.report),
        }
    }
}

/// Resolved step configuration
#[derive(Debug, Clone, PartialEq)]
pub struct StepConfig {
    /// Name of the AVD image to boot
    pub emulator_name: String,
    /// Emulator skin, `-noskin` when unset
    pub skin: Option<String>,
    /// Extra emulator flags, shell quoted
    pub emulator_options: String,
    /// Deprecated extra flags, appended to `emulator_options`
    pub other_options: String,
    /// Android SDK root
    pub android_home: Option<PathBuf>,
    /// Wait for the boot properties before returning
    pub wait_for_boot: bool,
    /// Deadline for serial detection plus boot wait
    pub boot_timeout: Duration,
    /// Delay between two polls
    pub poll_interval: Duration,
    /// Export destination of the serial
    pub export: ExportTarget,
    /// Emulator output log
    pub emulator_log: PathBuf,
    /// Optional JSON report path
    pub report: Option<PathBuf>,
}

impl StepConfig {
    /// Create a configuration with defaults for the given AVD
    pub fn new(emulator_name: impl Into<String>) -> Self {
        Self {
            emulator_name: emulator_name.into(),
            skin: None,
            emulator_options: String::new(),
            other_options: String::new(),
            android_home: None,
            wait_for_boot: true,
            boot_timeout: DEFAULT_BOOT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            export: ExportTarget::default(),
            emulator_log: PathBuf::from(DEFAULT_EMULATOR_LOG),
            report: None,
        }
    }

    /// Build a configuration from a merged layer, filling in defaults.
    ///
    /// Empty strings count as unset, since CI runners export empty inputs.
    pub fn from_layer(layer: ConfigLayer) -> Self {
        let mut config = Self::new(non_empty(layer.emulator_name).unwrap_or_default());

        config.skin = non_empty(layer.skin);
        config.emulator_options = non_empty(layer.emulator_options).unwrap_or_default();
        config.other_options = non_empty(layer.other_options).unwrap_or_default();
        config.android_home = layer.android_home.filter(|p| !p.as_os_str().is_empty());

        if let Some(wait) = layer.wait_for_boot {
            config.wait_for_boot = wait;
        }
        if let Some(secs) = layer.boot_timeout_secs {
            config.boot_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = layer.poll_interval_secs {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(export) = layer.export {
            config.export = export;
        }
        if let Some(log) = layer.emulator_log.filter(|p| !p.as_os_str().is_empty()) {
            config.emulator_log = log;
        }
        config.report = layer.report.filter(|p| !p.as_os_str().is_empty());

        config
    }

    /// Fall back to `ANDROID_HOME` / `ANDROID_SDK_ROOT` when no SDK root was given
    pub fn resolve_android_home(&mut self) {
        self.resolve_android_home_with(|key| std::env::var(key).ok());
    }

    fn resolve_android_home_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.android_home.is_some() {
            return;
        }

        self.android_home = ["ANDROID_HOME", "ANDROID_SDK_ROOT"]
            .iter()
            .filter_map(|key| lookup(key))
            .find(|value| !value.trim().is_empty())
            .map(PathBuf::from);
    }

    /// The SDK root, or a configuration error when none is known
    pub fn android_home(&self) -> Result<&Path> {
        self.android_home
            .as_deref()
            .ok_or_else(|| EmuBootError::Config("no android_home parameter specified".into()))
    }

    /// Emulator flags split with POSIX shell quoting rules
    pub fn emulator_args(&self) -> Result<Vec<String>> {
        let mut options = Vec::new();
        if !self.emulator_options.trim().is_empty() {
            options.push(self.emulator_options.trim());
        }
        if !self.other_options.trim().is_empty() {
            options.push(self.other_options.trim());
        }
        let joined = options.join(" ");

        shell_words::split(&joined).map_err(|e| {
            EmuBootError::Config(format!("failed to split emulator options ({}): {}", joined, e))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.emulator_name.trim().is_empty() {
            return Err(EmuBootError::Config("no emulator_name parameter specified".into()));
        }

        let android_home = self.android_home()?;
        if !android_home.exists() {
            return Err(EmuBootError::Config(format!(
                "android home not exist at: {}",
                android_home.display()
            )));
        }

        self.emulator_args()?;

        if self.poll_interval.is_zero() {
            return Err(EmuBootError::Config("poll_interval must be positive".into()));
        }
        if self.boot_timeout < self.poll_interval {
            return Err(EmuBootError::Config(format!(
                "boot_timeout ({}s) is shorter than poll_interval ({}s)",
                self.boot_timeout.as_secs(),
                self.poll_interval.as_secs()
            )));
        }

        Ok(())
    }

    /// Log every input
    pub fn log_summary(&self) {
        info!("Configs:");
        info!("- emulator_name: {}", self.emulator_name);
        info!("- skin: {}", self.skin.as_deref().unwrap_or(""));
        info!("- emulator_options: {}", self.emulator_options);
        info!(
            "- android_home: {}",
            self.android_home
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        );
        info!("- wait_for_boot: {}", self.wait_for_boot);
        info!("- boot_timeout: {}s", self.boot_timeout.as_secs());
        info!("- poll_interval: {}s", self.poll_interval.as_secs());
        info!("- export: {}", self.export);
        info!("- emulator_log: {}", self.emulator_log.display());

        if !self.other_options.is_empty() {
            info!("- [deprecated!] other_options: {}", self.other_options);
            warn!("other_options input is deprecated!");
            warn!("Use emulator_options input to control all of emulator command's flags");
        }
    }
}

/// Parse a boolean step input (`true`/`false`, `yes`/`no`, `1`/`0`)
pub fn parse_flag(value: &str) -> Result<Option<bool>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "yes" | "1" => Ok(Some(true)),
        "false" | "no" | "0" => Ok(Some(false)),
        other => Err(EmuBootError::Config(format!("invalid boolean input: {}", other))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StepConfig::new("Nexus_5X");
        assert_eq!(config.boot_timeout, Duration::from_secs(800));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(config.wait_for_boot);
        assert_eq!(config.export, ExportTarget::Envman);
        assert_eq!(config.emulator_log, PathBuf::from("emulator.log"));
    }

    #[test]
    fn test_layer_precedence() {
        let cli = ConfigLayer {
            emulator_name: Some("from_cli".into()),
            ..Default::default()
        };
        let file = ConfigLayer {
            emulator_name: Some("from_file".into()),
            skin: Some("768x1280".into()),
            ..Default::default()
        };

        let merged = cli.or(file);
        assert_eq!(merged.emulator_name.as_deref(), Some("from_cli"));
        assert_eq!(merged.skin.as_deref(), Some("768x1280"));
    }

    #[test]
    fn test_empty_inputs_are_unset() {
        let config = StepConfig::from_layer(ConfigLayer {
            emulator_name: Some("emu".into()),
            skin: Some("".into()),
            android_home: Some(PathBuf::new()),
            ..Default::default()
        });

        assert_eq!(config.skin, None);
        assert_eq!(config.android_home, None);
    }

    #[test]
    fn test_toml_layer() {
        let layer = ConfigLayer::from_toml_str(
            r#"
            emulator_name = "ci_avd"
            wait_for_boot = false
            boot_timeout_secs = 300
            export = "file:/tmp/serial.env"
            "#,
        )
        .unwrap();

        let config = StepConfig::from_layer(layer);
        assert_eq!(config.emulator_name, "ci_avd");
        assert!(!config.wait_for_boot);
        assert_eq!(config.boot_timeout, Duration::from_secs(300));
        assert_eq!(config.export, ExportTarget::EnvFile(PathBuf::from("/tmp/serial.env")));
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        assert!(ConfigLayer::from_toml_str("emulator = \"x\"").is_err());
    }

    #[tokio::test]
    async fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emu-boot.toml");
        std::fs::write(&path, "emulator_name = \"from_disk\"\n").unwrap();

        let layer = ConfigLayer::load_file(&path).await.unwrap();
        assert_eq!(layer.emulator_name.as_deref(), Some("from_disk"));

        let missing = ConfigLayer::load_file(&dir.path().join("missing.toml")).await;
        assert!(matches!(missing, Err(EmuBootError::Config(_))));
    }

    #[test]
    fn test_export_target_parsing() {
        assert_eq!("envman".parse::<ExportTarget>().unwrap(), ExportTarget::Envman);
        assert_eq!("none".parse::<ExportTarget>().unwrap(), ExportTarget::Disabled);
        assert_eq!(
            "file:out/.env".parse::<ExportTarget>().unwrap(),
            ExportTarget::EnvFile(PathBuf::from("out/.env"))
        );
        assert!("file:".parse::<ExportTarget>().is_err());
        assert!("github".parse::<ExportTarget>().is_err());
        assert_eq!(ExportTarget::EnvFile(PathBuf::from("a.env")).to_string(), "file:a.env");
    }

    #[test]
    fn test_emulator_args_quoting() {
        let mut config = StepConfig::new("emu");
        config.emulator_options = r#"-no-window -gpu "swiftshader_indirect" -prop 'a=b c'"#.into();

        let args = config.emulator_args().unwrap();
        assert_eq!(
            args,
            vec!["-no-window", "-gpu", "swiftshader_indirect", "-prop", "a=b c"]
        );
    }

    #[test]
    fn test_emulator_args_merges_deprecated_options() {
        let mut config = StepConfig::new("emu");
        config.emulator_options = "-no-audio".into();
        config.other_options = "-no-boot-anim".into();

        assert_eq!(config.emulator_args().unwrap(), vec!["-no-audio", "-no-boot-anim"]);
    }

    #[test]
    fn test_emulator_args_unbalanced_quote() {
        let mut config = StepConfig::new("emu");
        config.emulator_options = "-prop \"unterminated".into();
        assert!(matches!(config.emulator_args(), Err(EmuBootError::Config(_))));
    }

    #[test]
    fn test_emulator_args_empty() {
        assert!(StepConfig::new("emu").emulator_args().unwrap().is_empty());
    }

    #[test]
    fn test_android_home_fallback() {
        let mut config = StepConfig::new("emu");
        config.resolve_android_home_with(|key| match key {
            "ANDROID_HOME" => Some("".into()),
            "ANDROID_SDK_ROOT" => Some("/opt/android-sdk".into()),
            _ => None,
        });
        assert_eq!(config.android_home, Some(PathBuf::from("/opt/android-sdk")));

        let mut explicit = StepConfig::new("emu");
        explicit.android_home = Some(PathBuf::from("/sdk"));
        explicit.resolve_android_home_with(|_| Some("/other".into()));
        assert_eq!(explicit.android_home, Some(PathBuf::from("/sdk")));
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();

        let mut config = StepConfig::new("");
        config.android_home = Some(dir.path().to_path_buf());
        assert!(config.validate().unwrap_err().to_string().contains("emulator_name"));

        config.emulator_name = "emu".into();
        assert!(config.validate().is_ok());

        config.android_home = None;
        assert!(config.validate().unwrap_err().to_string().contains("android_home"));

        config.android_home = Some(dir.path().join("missing"));
        assert!(config.validate().unwrap_err().to_string().contains("not exist"));

        config.android_home = Some(dir.path().to_path_buf());
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.poll_interval = Duration::from_secs(10);
        config.boot_timeout = Duration::from_secs(5);
        assert!(config.validate().is_err());

        config.boot_timeout = Duration::from_secs(800);
        config.emulator_options = "-prop 'unterminated".into();
        assert!(config.validate().unwrap_err().to_string().contains("emulator options"));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("false").unwrap(), Some(false));
        assert_eq!(parse_flag(" TRUE ").unwrap(), Some(true));
        assert_eq!(parse_flag("").unwrap(), None);
        assert!(parse_flag("maybe").is_err());
    }
}
