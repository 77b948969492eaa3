//! Listener port — observers of device and connectivity changes.

use cubelink_domain::device::Device;

/// Receives notifications from the coordinator.
///
/// Methods are called synchronously on the coordinator's cycle task, after the
/// session lock is released. They must return quickly; slow consumers should
/// forward into a channel (see [`InProcessEventBus`](crate::event_bus::InProcessEventBus)).
pub trait DeviceStatusListener: Send + Sync {
    /// A serial appeared in a live-state record for the first time.
    fn on_device_added(&self, _device: &Device) {}

    /// A known device received fresh live values.
    fn on_device_changed(&self, _device: &Device) {}

    /// A poll failed while the gateway was considered reachable.
    fn on_connection_lost(&self) {}

    /// A poll succeeded while the gateway was considered unreachable.
    fn on_connection_established(&self) {}
}
