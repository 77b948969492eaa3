//! Write commands queued for the gateway.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::Serial;
use crate::time::{self, Timestamp};

/// Monotonically increasing identifier assigned when a command is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandId(u64);

impl CommandId {
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Coalescing key: a newer command for the same device and logical channel
/// supersedes any queued one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandKey {
    pub serial: Serial,
    pub channel: String,
}

impl CommandKey {
    #[must_use]
    pub fn new(serial: impl Into<Serial>, channel: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.serial, self.channel)
    }
}

/// A pending write towards the gateway. The payload is opaque to the bridge
/// and is sent verbatim as one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendCommand {
    pub id: CommandId,
    pub key: CommandKey,
    pub payload: String,
    pub created_at: Timestamp,
}

impl SendCommand {
    /// Build a command stamped with the current time.
    #[must_use]
    pub fn new(id: CommandId, key: CommandKey, payload: impl Into<String>) -> Self {
        Self {
            id,
            key,
            payload: payload.into(),
            created_at: time::now(),
        }
    }

    /// Serial of the device this command targets.
    #[must_use]
    pub fn serial(&self) -> &Serial {
        &self.key.serial
    }
}
