//! Device Types and State
//!
//! Represents devices reported by `adb devices` and the diff between two
//! listings used to find a freshly started emulator.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Device state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    /// Device is online and ready
    Online,
    /// Device is offline
    Offline,
    /// Device is not authorized (need to accept on device)
    Unauthorized,
    /// Device is in bootloader mode
    Bootloader,
    /// Device is in recovery mode
    Recovery,
    /// Device is in sideload mode
    Sideload,
    /// Unknown state
    Unknown,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Online => "device",
            DeviceState::Offline => "offline",
            DeviceState::Unauthorized => "unauthorized",
            DeviceState::Bootloader => "bootloader",
            DeviceState::Recovery => "recovery",
            DeviceState::Sideload => "sideload",
            DeviceState::Unknown => "unknown",
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, DeviceState::Online)
    }
}

impl FromStr for DeviceState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "device" => DeviceState::Online,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            "bootloader" => DeviceState::Bootloader,
            "recovery" => DeviceState::Recovery,
            "sideload" => DeviceState::Sideload,
            _ => DeviceState::Unknown,
        })
    }
}

/// Device type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    /// Physical device connected via USB/WiFi
    Physical,
    /// Android emulator
    Emulator,
}

/// Device information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device serial number
    pub serial: String,
    /// Device state
    pub state: DeviceState,
    /// Device type
    pub device_type: DeviceType,
    /// Device model (e.g., "sdk_gphone64_x86_64")
    pub model: Option<String>,
    /// Device product name
    pub product: Option<String>,
    /// Transport ID
    pub transport_id: Option<u32>,
}

impl Device {
    /// Check if device is online and usable
    pub fn is_usable(&self) -> bool {
        self.state.is_usable()
    }

    /// Check if this is an emulator
    pub fn is_emulator(&self) -> bool {
        self.device_type == DeviceType::Emulator
    }

    /// Get display name
    pub fn display_name(&self) -> String {
        if let Some(ref model) = self.model {
            format!("{} ({}, {})", self.serial, self.state.as_str(), model.replace('_', " "))
        } else {
            format!("{} ({})", self.serial, self.state.as_str())
        }
    }
}

/// Parse the output of `adb devices` or `adb devices -l`.
///
/// Daemon startup chatter (`* daemon not running ...`) and the
/// `List of devices attached` header are skipped.
pub fn parse_devices(output: &str) -> DeviceList {
    let devices = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with('*'))
        .filter(|line| !line.to_lowercase().starts_with("list of devices"))
        .filter_map(parse_device_line)
        .map(|device| (device.serial.clone(), device))
        .collect();

    DeviceList { devices }
}

fn parse_device_line(line: &str) -> Option<Device> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }

    let serial = parts[0].to_string();
    let state = parts[1].parse().unwrap_or(DeviceState::Unknown);

    let mut model = None;
    let mut product = None;
    let mut transport_id = None;

    for part in parts.iter().skip(2) {
        if let Some(value) = part.strip_prefix("model:") {
            model = Some(value.to_string());
        } else if let Some(value) = part.strip_prefix("product:") {
            product = Some(value.to_string());
        } else if let Some(value) = part.strip_prefix("transport_id:") {
            transport_id = value.parse().ok();
        }
    }

    let device_type = if is_emulator_serial(&serial) {
        DeviceType::Emulator
    } else {
        DeviceType::Physical
    };

    Some(Device {
        serial,
        state,
        device_type,
        model,
        product,
        transport_id,
    })
}

/// `emulator-<port>` serials
fn is_emulator_serial(serial: &str) -> bool {
    serial
        .strip_prefix("emulator-")
        .map(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Devices keyed by serial
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceList {
    devices: BTreeMap<String, Device>,
}

impl DeviceList {
    pub fn get(&self, serial: &str) -> Option<&Device> {
        self.devices.get(serial)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Emulator instances only
    pub fn emulators(&self) -> impl Iterator<Item = &Device> {
        self.iter().filter(|d| d.is_emulator())
    }

    /// Emulators present now that were absent from `baseline`
    pub fn started_since<'a>(&'a self, baseline: &'a DeviceList) -> impl Iterator<Item = &'a Device> {
        self.emulators().filter(move |d| baseline.get(&d.serial).is_none())
    }
}

impl FromIterator<Device> for DeviceList {
    fn from_iter<T: IntoIterator<Item = Device>>(iter: T) -> Self {
        DeviceList {
            devices: iter.into_iter().map(|d| (d.serial.clone(), d)).collect(),
        }
    }
}
