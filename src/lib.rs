//! emu-boot - Android emulator start step for CI pipelines
//!
//! Boots an AVD, waits until the device is usable and exports its serial
//! so the following steps can talk to it.
//!
//! ## Architecture
//!
//! - `emu-boot-core`: step configuration and the shared error type
//! - `emu-boot-android-toolchain`: adb/emulator resolution inside the SDK
//! - `emu-boot-emulator-bridge`: adb client, launcher and boot detection
//!
//! This crate wires them into the [`StartCommand`](commands::StartCommand)
//! driven by the `emu-boot` binary.

#![warn(clippy::all)]

pub mod cli;
pub mod commands;
pub mod export;
pub mod report;

// Re-export workspace crates for library usage
pub use emu_boot_android_toolchain as toolchain;
pub use emu_boot_core as core;
pub use emu_boot_emulator_bridge as emulator;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cli::Cli;
    pub use crate::commands::StartCommand;
    pub use crate::export::Exporter;
    pub use crate::report::BootReport;
    pub use emu_boot_core::{EmuBootError, ExportTarget, StepConfig};
    pub use emu_boot_emulator_bridge::{AdbClient, AvdManager, EmulatorLauncher};
}
