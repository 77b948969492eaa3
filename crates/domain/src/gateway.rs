//! Gateway-level state that is not tied to a single device.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::StatusRecord;
use crate::time::{self, Timestamp};

/// Lifecycle of the socket to the gateway.
///
/// `Disconnected → Connecting → Open`, falling back to `Disconnected` on close
/// or error. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
        };
        f.write_str(text)
    }
}

/// Radio duty cycle and command memory reported by the last status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStatus {
    /// Percentage of the radio budget already used.
    pub duty_cycle: u8,
    pub free_memory_slots: u32,
    pub last_command_discarded: bool,
    pub updated_at: Timestamp,
}

impl From<&StatusRecord> for GatewayStatus {
    fn from(record: &StatusRecord) -> Self {
        Self {
            duty_cycle: record.duty_cycle,
            free_memory_slots: record.free_memory_slots,
            last_command_discarded: record.discarded,
            updated_at: time::now(),
        }
    }
}
