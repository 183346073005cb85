//! Emulator Launcher
//!
//! Builds the emulator command line and runs the emulator as a child
//! process whose output goes to a log file.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use emu_boot_core::EmuBootError;

/// Emulator errors
#[derive(Debug, thiserror::Error)]
pub enum EmulatorError {
    #[error("Emulator not found at: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to start emulator: {0}")]
    StartFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EmulatorError> for EmuBootError {
    fn from(err: EmulatorError) -> Self {
        match err {
            EmulatorError::NotFound(path) => EmuBootError::ToolNotFound {
                tool: "emulator".into(),
                path,
            },
            other => EmuBootError::Emulator(other.to_string()),
        }
    }
}

/// Emulator launch options
#[derive(Debug, Clone, Default)]
pub struct EmulatorOptions {
    /// Skin name or `WxH`; `-noskin` when unset
    pub skin: Option<String>,
    /// Id passed as `-prop emu.uuid=<id>` to recognize the instance later
    pub launch_id: Option<String>,
    /// Additional arguments, passed through verbatim
    pub extra_args: Vec<String>,
}

impl EmulatorOptions {
    /// Convert to command line arguments
    pub fn to_args(&self, avd_name: &str) -> Vec<String> {
        let mut args = vec!["-avd".to_string(), avd_name.to_string()];

        match self.skin {
            Some(ref skin) => {
                args.push("-skin".to_string());
                args.push(skin.clone());
            }
            None => args.push("-noskin".to_string()),
        }

        if let Some(ref id) = self.launch_id {
            args.push("-prop".to_string());
            args.push(format!("{}={}", crate::adb::PROP_LAUNCH_ID, id));
        }

        args.extend(self.extra_args.iter().cloned());

        args
    }
}

/// Quote an argument for display when it contains whitespace or quotes
fn printable_arg(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

/// Emulator launcher
#[derive(Debug, Clone)]
pub struct EmulatorLauncher {
    emulator_path: PathBuf,
    envs: Vec<(String, String)>,
}

impl EmulatorLauncher {
    /// Create a launcher for an emulator binary and the extra environment it needs
    pub fn new(emulator_path: impl Into<PathBuf>, envs: Vec<(String, String)>) -> Self {
        Self {
            emulator_path: emulator_path.into(),
            envs,
        }
    }

    /// Check if emulator is available
    pub fn is_available(&self) -> bool {
        self.emulator_path.is_file()
    }

    /// The command line as it would be typed in a shell
    pub fn printable_command(&self, avd_name: &str, options: &EmulatorOptions) -> String {
        let mut parts: Vec<String> = self
            .envs
            .iter()
            .map(|(key, value)| format!("{}={}", key, printable_arg(value)))
            .collect();
        parts.push(printable_arg(&self.emulator_path.display().to_string()));
        parts.extend(options.to_args(avd_name).iter().map(|a| printable_arg(a)));
        parts.join(" ")
    }

    /// Build the process command; the current environment is inherited
    pub fn command(&self, avd_name: &str, options: &EmulatorOptions) -> Command {
        let mut cmd = Command::new(&self.emulator_path);
        cmd.args(options.to_args(avd_name));
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    /// Launch an emulator, sending its stdout and stderr to `log_path`.
    ///
    /// The child is not killed on drop, so a booted emulator keeps running
    /// after the step exits.
    pub async fn launch(
        &self,
        avd_name: &str,
        options: &EmulatorOptions,
        log_path: &Path,
    ) -> Result<EmulatorProcess, EmulatorError> {
        if !self.is_available() {
            return Err(EmulatorError::NotFound(self.emulator_path.clone()));
        }

        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let log = std::fs::File::create(log_path)?;
        let log_err = log.try_clone()?;

        info!("$ {}", self.printable_command(avd_name, options));

        let child = self
            .command(avd_name, options)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|e| EmulatorError::StartFailed(e.to_string()))?;

        Ok(EmulatorProcess {
            avd_name: avd_name.to_string(),
            log_path: log_path.to_path_buf(),
            child,
        })
    }
}

/// Running emulator instance
#[derive(Debug)]
pub struct EmulatorProcess {
    pub avd_name: String,
    log_path: PathBuf,
    child: Child,
}

impl EmulatorProcess {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Exit status if the process already exited
    pub fn try_status(&mut self) -> Result<Option<ExitStatus>, EmulatorError> {
        Ok(self.child.try_wait()?)
    }

    /// Wait for the emulator to exit
    pub async fn wait(&mut self) -> Result<ExitStatus, EmulatorError> {
        Ok(self.child.wait().await?)
    }

    /// Kill the emulator
    pub async fn kill(&mut self) -> Result<(), EmulatorError> {
        if self.try_status()?.is_some() {
            return Ok(());
        }
        self.child.kill().await?;
        info!("Killed emulator: {}", self.avd_name);
        Ok(())
    }

    /// Last `lines` lines of the emulator output; invalid UTF-8 is replaced
    pub async fn log_tail(&self, lines: usize) -> Vec<String> {
        if lines == 0 {
            return Vec::new();
        }

        let file = match tokio::fs::File::open(&self.log_path).await {
            Ok(file) => file,
            Err(e) => {
                warn!("Failed to open emulator log {:?}: {}", self.log_path, e);
                return Vec::new();
            }
        };

        let mut reader = BufReader::new(file);
        let mut tail = std::collections::VecDeque::with_capacity(lines);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read emulator log {:?}: {}", self.log_path, e);
                    break;
                }
            }

            let line = String::from_utf8_lossy(&buf);
            if tail.len() == lines {
                tail.pop_front();
            }
            tail.push_back(line.trim_end_matches(['\n', '\r']).to_string());
        }
        tail.into_iter().collect()
    }
}
