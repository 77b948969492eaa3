//! Port definitions — traits that adapters implement.
//!
//! The coordinator only talks to the gateway through [`GatewayTransport`] and
//! only reports outwards through [`DeviceStatusListener`], so tests can drive
//! it with scripted transports and recording listeners.

pub mod gateway;
pub mod listener;

pub use gateway::{GatewayTransport, PollBatch};
pub use listener::DeviceStatusListener;
