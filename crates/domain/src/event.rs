//! Event — notifications fanned out to listeners after a cycle completes.

use serde::{Deserialize, Serialize};

use crate::device::Device;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    DeviceAdded { device: Device },
    DeviceChanged { device: Device },
    ConnectionLost,
    ConnectionEstablished,
}

impl GatewayEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DeviceAdded { .. } => "device_added",
            Self::DeviceChanged { .. } => "device_changed",
            Self::ConnectionLost => "connection_lost",
            Self::ConnectionEstablished => "connection_established",
        }
    }
}
