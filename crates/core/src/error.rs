//! Error types for emu-boot
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for emu-boot
#[derive(Error, Debug)]
pub enum EmuBootError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Android SDK error: {0}")]
    AndroidSdk(String),

    #[error("{tool} not found at: {}", path.display())]
    ToolNotFound { tool: String, path: PathBuf },

    #[error("AVD error: {0}")]
    Avd(String),

    #[error("ADB error: {0}")]
    Adb(String),

    #[error("Emulator error: {0}")]
    Emulator(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Export error: {0}")]
    Export(String),
}

/// Result type alias for emu-boot operations
pub type Result<T> = std::result::Result<T, EmuBootError>;

impl EmuBootError {
    /// Check if the step can still succeed after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EmuBootError::Export(_))
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            EmuBootError::Io(e) => format!("File operation failed: {}", e),
            EmuBootError::Config(msg) => format!("Issue with input: {}", msg),
            EmuBootError::AndroidSdk(msg) => format!("Android SDK issue: {}", msg),
            EmuBootError::ToolNotFound { tool, path } => format!(
                "{} not found at {}. Is the Android SDK installed?",
                tool,
                path.display()
            ),
            EmuBootError::Timeout(msg) => format!("Starting emulator timed out: {}", msg),
            EmuBootError::Emulator(msg) => format!("Failed to start emulator: {}", msg),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_export_is_recoverable() {
        assert!(EmuBootError::Export("envman missing".into()).is_recoverable());
        assert!(!EmuBootError::Timeout("800s".into()).is_recoverable());
        assert!(!EmuBootError::Config("no emulator_name".into()).is_recoverable());
    }

    #[test]
    fn test_tool_not_found_message() {
        let err = EmuBootError::ToolNotFound {
            tool: "adb".into(),
            path: PathBuf::from("/sdk/platform-tools/adb"),
        };
        assert_eq!(err.to_string(), "adb not found at: /sdk/platform-tools/adb");
        assert!(err.user_message().contains("Android SDK"));
    }
}
