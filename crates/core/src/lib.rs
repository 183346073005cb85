//! emu-boot Core - Step configuration and shared types
//!
//! This crate holds the inputs of the emulator start step and the error type
//! shared by the rest of the workspace.

pub mod config;
pub mod error;

pub use config::{ConfigLayer, ExportTarget, StepConfig, SERIAL_EXPORT_KEY};
pub use error::{EmuBootError, Result};

/// emu-boot version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "emu-boot";
