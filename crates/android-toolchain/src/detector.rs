//! Tool Detection
//!
//! Locates `adb` and the `emulator` binary inside an Android SDK root.
//!
//! Two emulator layouts exist in the wild:
//! - Modern SDKs ship the emulator as its own package in `<sdk>/emulator`.
//! - Legacy SDKs keep it in `<sdk>/tools`, and old Linux revisions only ship
//!   the architecture specific `emulator64-arm` there.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use which::which;

use crate::env::{lib64_env, HostOs};

/// Tool detection errors
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("android home not exist at: {}", .0.display())]
    SdkNotFound(PathBuf),
    #[error("no {tool} binary found in {}", dir.display())]
    ToolNotFound { tool: &'static str, dir: PathBuf },
}

impl From<DetectionError> for emu_boot_core::EmuBootError {
    fn from(err: DetectionError) -> Self {
        match err {
            DetectionError::SdkNotFound(path) => {
                emu_boot_core::EmuBootError::AndroidSdk(format!("no SDK at {}", path.display()))
            }
            DetectionError::ToolNotFound { tool, dir } => emu_boot_core::EmuBootError::ToolNotFound {
                tool: tool.to_string(),
                path: dir,
            },
        }
    }
}

/// Where the emulator package lives inside the SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatorLayout {
    /// `<sdk>/emulator`
    Modern,
    /// `<sdk>/tools`
    Legacy,
}

impl EmulatorLayout {
    /// Modern when `<sdk>/emulator/emulator` exists
    pub fn detect(sdk_root: &Path, os: HostOs) -> Self {
        if sdk_root.join("emulator").join(os.executable("emulator")).is_file() {
            EmulatorLayout::Modern
        } else {
            EmulatorLayout::Legacy
        }
    }

    /// Directory holding the emulator binary and its libraries
    pub fn dir(&self, sdk_root: &Path) -> PathBuf {
        match self {
            EmulatorLayout::Modern => sdk_root.join("emulator"),
            EmulatorLayout::Legacy => sdk_root.join("tools"),
        }
    }
}

/// A resolved emulator binary with the environment it must run with
#[derive(Debug, Clone)]
pub struct EmulatorBinary {
    pub path: PathBuf,
    pub layout: EmulatorLayout,
    pub envs: Vec<(String, String)>,
}

/// Ordered emulator binary candidates for a layout; the first existing one wins
pub fn emulator_candidates(sdk_root: &Path, layout: EmulatorLayout, os: HostOs) -> Vec<PathBuf> {
    let dir = layout.dir(sdk_root);
    let mut candidates = vec![dir.join(os.executable("emulator"))];

    if layout == EmulatorLayout::Legacy && os == HostOs::Linux {
        candidates.push(dir.join("emulator64-arm"));
    }

    candidates
}

/// Resolves SDK tools below one SDK root
pub struct ToolchainDetector {
    sdk_root: PathBuf,
    os: HostOs,
}

impl ToolchainDetector {
    /// Create a detector for the current host
    pub fn new(sdk_root: impl Into<PathBuf>) -> Self {
        Self::with_os(sdk_root, HostOs::current())
    }

    /// Create a detector for an explicit host OS
    pub fn with_os(sdk_root: impl Into<PathBuf>, os: HostOs) -> Self {
        Self {
            sdk_root: sdk_root.into(),
            os,
        }
    }

    fn check_sdk(&self) -> Result<(), DetectionError> {
        if self.sdk_root.is_dir() {
            Ok(())
        } else {
            Err(DetectionError::SdkNotFound(self.sdk_root.clone()))
        }
    }

    /// Locate adb in `platform-tools`, falling back to `PATH`
    pub fn adb_path(&self) -> Result<PathBuf, DetectionError> {
        self.check_sdk()?;

        let platform_tools = self.sdk_root.join("platform-tools");
        let adb = platform_tools.join(self.os.executable("adb"));
        if adb.is_file() {
            debug!("Using adb at {:?}", adb);
            return Ok(adb);
        }

        match which("adb") {
            Ok(path) => {
                warn!("adb not found in {:?}, using {:?} from PATH", platform_tools, path);
                Ok(path)
            }
            Err(_) => Err(DetectionError::ToolNotFound {
                tool: "adb",
                dir: platform_tools,
            }),
        }
    }

    /// Locate the emulator binary and build its library environment
    pub fn emulator_binary(&self) -> Result<EmulatorBinary, DetectionError> {
        self.check_sdk()?;

        let layout = EmulatorLayout::detect(&self.sdk_root, self.os);
        let candidates = emulator_candidates(&self.sdk_root, layout, self.os);
        debug!("Emulator candidates ({:?}): {:?}", layout, candidates);

        let path = candidates
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| DetectionError::ToolNotFound {
                tool: "emulator",
                dir: layout.dir(&self.sdk_root),
            })?;

        let mut envs = Vec::new();
        if path.file_stem().map(|s| s == "emulator").unwrap_or(false) {
            let key = self.os.library_path_key();
            let inherited = key.and_then(|k| std::env::var(k).ok());

            match lib64_env(&layout.dir(&self.sdk_root), self.os, inherited.as_deref()) {
                Ok(env) => envs.push(env),
                Err(e) => warn!("failed to get lib64 qt lib path, error: {}", e),
            }
        }

        info!("Using emulator at {:?}", path);
        Ok(EmulatorBinary { path, layout, envs })
    }
}
