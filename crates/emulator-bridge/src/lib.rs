//! Android Emulator Bridge
//!
//! Launches one Android emulator and waits until it is usable.

pub mod adb;
pub mod avd;
pub mod boot;
pub mod device;
pub mod emulator;

pub use adb::{AdbClient, AdbError, BootStatus};
pub use avd::{AvdError, AvdInfo, AvdManager};
pub use boot::{wait_until_ready, BootError, BootPhase, BootWatcher, DeviceProbe, WaitSettings};
pub use device::{parse_devices, Device, DeviceList, DeviceState, DeviceType};
pub use emulator::{EmulatorError, EmulatorLauncher, EmulatorOptions, EmulatorProcess};

/// Lines of emulator output shown when the launch fails
pub const LOG_TAIL_LINES: usize = 20;
