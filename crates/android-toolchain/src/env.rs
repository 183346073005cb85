//! Emulator Environment
//!
//! Builds the library search path the SDK emulator binary needs to find its
//! bundled `lib64` and Qt libraries.

use std::path::{Path, PathBuf};

/// Host operating system, as far as tool layout is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl HostOs {
    /// The OS this binary was built for
    pub fn current() -> Self {
        Self::from_name(std::env::consts::OS)
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "linux" => HostOs::Linux,
            "macos" | "darwin" => HostOs::MacOs,
            "windows" => HostOs::Windows,
            _ => HostOs::Other,
        }
    }

    /// Executable file name for a tool on this OS
    pub fn executable(&self, tool: &str) -> String {
        match self {
            HostOs::Windows => format!("{}.exe", tool),
            _ => tool.to_string(),
        }
    }

    /// Environment variable the dynamic loader searches
    pub fn library_path_key(&self) -> Option<&'static str> {
        match self {
            HostOs::Linux => Some("LD_LIBRARY_PATH"),
            HostOs::MacOs => Some("DYLD_LIBRARY_PATH"),
            _ => None,
        }
    }
}

/// Library path errors
#[derive(Debug, thiserror::Error)]
pub enum LibPathError {
    #[error("unsupported os {0:?}")]
    UnsupportedOs(HostOs),
    #[error("qt lib does not exist at: {}", .0.display())]
    QtLibMissing(PathBuf),
}

/// Build the library path variable for an emulator living in `emulator_dir`.
///
/// The value lists `<dir>/lib64` and `<dir>/lib64/qt/lib`, followed by the
/// `inherited` value of the variable when there is one.
pub fn lib64_env(
    emulator_dir: &Path,
    os: HostOs,
    inherited: Option<&str>,
) -> Result<(String, String), LibPathError> {
    let key = os.library_path_key().ok_or(LibPathError::UnsupportedOs(os))?;

    let lib_path = emulator_dir.join("lib64");
    let qt_lib_path = lib_path.join("qt").join("lib");
    if !qt_lib_path.is_dir() {
        return Err(LibPathError::QtLibMissing(qt_lib_path));
    }

    let mut value = format!("{}:{}", lib_path.display(), qt_lib_path.display());
    if let Some(existing) = inherited.filter(|v| !v.is_empty()) {
        value.push(':');
        value.push_str(existing);
    }

    Ok((key.to_string(), value))
}
