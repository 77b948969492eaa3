//! Devices and their static configurations, keyed by serial number.
//!
//! A [`DeviceConfiguration`] is what the gateway tells us a device *is*
//! (type, room, family parameters). A [`Device`] is what it is *doing*: it
//! only exists once a configured serial shows up in a live-state record.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

const SERIAL_MAX_LEN: usize = 32;

/// Stable identity of a device on the gateway.
///
/// The gateway is not consistent about letter case between records, so
/// serials are stored upper-cased and compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Serial(String);

impl Serial {
    /// Validate a serial as it appears on the wire: 1 to 32 ASCII alphanumerics.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidSerial`] for empty, overlong or
    /// non-alphanumeric input.
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        let valid = !raw.is_empty()
            && raw.len() <= SERIAL_MAX_LEN
            && raw.chars().all(|c| c.is_ascii_alphanumeric());
        if valid {
            Ok(Self(raw.to_ascii_uppercase()))
        } else {
            Err(DecodeError::InvalidSerial(raw.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Serial {
    fn from(value: &str) -> Self {
        Self(value.to_ascii_uppercase())
    }
}

impl From<String> for Serial {
    fn from(mut value: String) -> Self {
        value.make_ascii_uppercase();
        Self(value)
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Device family discriminant, as encoded by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Cube,
    HeatingThermostat,
    HeatingThermostatPlus,
    WallMountedThermostat,
    ShutterContact,
    EcoSwitch,
    Other(u8),
}

impl DeviceType {
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Cube,
            1 => Self::HeatingThermostat,
            2 => Self::HeatingThermostatPlus,
            3 => Self::WallMountedThermostat,
            4 => Self::ShutterContact,
            5 => Self::EcoSwitch,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Cube => 0,
            Self::HeatingThermostat => 1,
            Self::HeatingThermostatPlus => 2,
            Self::WallMountedThermostat => 3,
            Self::ShutterContact => 4,
            Self::EcoSwitch => 5,
            Self::Other(code) => code,
        }
    }
}

/// Operating mode reported in live-state records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Auto,
    Manual,
    Vacation,
    Boost,
}

impl Mode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Vacation => "vacation",
            Self::Boost => "boost",
        }
    }
}

impl FromStr for Mode {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            "vacation" => Ok(Self::Vacation),
            "boost" => Ok(Self::Boost),
            other => Err(DecodeError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a device, upserted from info, metadata and
/// configuration records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    pub serial: Serial,
    pub room: Option<String>,
    pub device_type: DeviceType,
    pub name: Option<String>,
    /// Device-family specific parameters, opaque to the bridge.
    pub params: BTreeMap<String, String>,
}

/// Live view of a configured device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub serial: Serial,
    pub room: Option<String>,
    pub device_type: DeviceType,
    pub name: Option<String>,
    pub mode: Option<Mode>,
    pub measured: Option<f64>,
    pub setpoint: Option<f64>,
    /// Set on the copy handed out by the merge that first saw this serial.
    pub updated: bool,
    /// Set while the device is missing from the latest complete poll batch.
    pub stale: bool,
}

impl Device {
    /// Human-readable label, falling back to the serial.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{name} ({})", self.serial),
            None => self.serial.to_string(),
        }
    }
}
