//! AVD (Android Virtual Device) Images
//!
//! Lists the AVD images known to the emulator and checks the requested one
//! exists before anything is launched.

use std::path::{Path, PathBuf};

use configparser::ini::Ini;
use tracing::{debug, warn};

use emu_boot_core::EmuBootError;

/// AVD errors
#[derive(Debug, thiserror::Error)]
pub enum AvdError {
    #[error("AVD image not exists with name: {name}")]
    NotFound { name: String, available: Vec<String> },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AvdError> for EmuBootError {
    fn from(err: AvdError) -> Self {
        match err {
            AvdError::Io(e) => EmuBootError::Io(e),
            other => EmuBootError::Avd(other.to_string()),
        }
    }
}

/// AVD information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvdInfo {
    pub name: String,
    /// `<home>/<name>.ini`
    pub ini_path: PathBuf,
    /// `path=` from the ini, the `<name>.avd` directory
    pub path: Option<PathBuf>,
    /// `target=` from the ini, e.g. `android-34`
    pub target: Option<String>,
}

/// Resolve the AVD home directory the emulator itself uses
pub fn avd_home_from_env<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

    var("ANDROID_AVD_HOME")
        .or_else(|| var("ANDROID_USER_HOME").map(|p| p.join("avd")))
        .or_else(|| var("ANDROID_SDK_HOME").map(|p| p.join(".android").join("avd")))
        .or_else(|| dirs::home_dir().map(|h| h.join(".android").join("avd")))
}

/// AVD Manager
pub struct AvdManager {
    avd_home: PathBuf,
}

impl AvdManager {
    /// Create a manager for an explicit AVD home
    pub fn new(avd_home: impl Into<PathBuf>) -> Self {
        Self {
            avd_home: avd_home.into(),
        }
    }

    /// Create a manager for the AVD home of the current environment
    pub fn from_env() -> Self {
        let avd_home = avd_home_from_env(|key| std::env::var(key).ok())
            .unwrap_or_else(|| PathBuf::from(".android").join("avd"));
        Self::new(avd_home)
    }

    pub fn avd_home(&self) -> &Path {
        &self.avd_home
    }

    /// List all AVD images, sorted by name
    pub async fn list_avds(&self) -> Result<Vec<AvdInfo>, AvdError> {
        let mut avds = Vec::new();

        if !self.avd_home.exists() {
            return Ok(avds);
        }

        let mut entries = tokio::fs::read_dir(&self.avd_home).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if path.extension().map(|e| e == "ini").unwrap_or(false) {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    avds.push(self.parse_avd_info(name, &path).await);
                }
            }
        }

        avds.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(avds)
    }

    async fn parse_avd_info(&self, name: &str, ini_path: &Path) -> AvdInfo {
        let mut info = AvdInfo {
            name: name.to_string(),
            ini_path: ini_path.to_path_buf(),
            path: None,
            target: None,
        };

        let content = match tokio::fs::read_to_string(ini_path).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {:?}: {}", ini_path, e);
                return info;
            }
        };

        let mut ini = Ini::new();
        if let Err(e) = ini.read(content) {
            warn!("Failed to parse {:?}: {}", ini_path, e);
            return info;
        }

        info.path = ini.get("default", "path").map(PathBuf::from);
        info.target = ini.get("default", "target");
        info
    }

    /// Check that an AVD image with `name` exists.
    ///
    /// A missing AVD home skips the check; the emulator reports the problem
    /// itself in that case.
    pub async fn ensure_exists(&self, name: &str) -> Result<Option<AvdInfo>, AvdError> {
        if !self.avd_home.exists() {
            warn!(
                "AVD home {:?} does not exist, skipping AVD image validation",
                self.avd_home
            );
            return Ok(None);
        }

        let avds = self.list_avds().await?;
        debug!("AVD images: {:?}", avds.iter().map(|a| &a.name).collect::<Vec<_>>());

        match avds.iter().find(|a| a.name == name) {
            Some(avd) => Ok(Some(avd.clone())),
            None => Err(AvdError::NotFound {
                name: name.to_string(),
                available: avds.into_iter().map(|a| a.name).collect(),
            }),
        }
    }
}
