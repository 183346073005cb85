//! Android Toolchain Resolution
//!
//! Handles locating the SDK tools the step drives:
//! - adb in platform-tools
//! - the emulator binary across SDK layouts
//! - the emulator's library search path

pub mod detector;
pub mod env;

pub use detector::{emulator_candidates, DetectionError, EmulatorBinary, EmulatorLayout, ToolchainDetector};
pub use env::{lib64_env, HostOs, LibPathError};
