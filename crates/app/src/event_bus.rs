//! In-process event bus backed by a tokio broadcast channel.
//!
//! Registered as a [`DeviceStatusListener`], it moves notifications off the
//! coordinator's cycle task: callbacks only enqueue, subscribers do the work.

use tokio::sync::broadcast;

use cubelink_domain::device::Device;
use cubelink_domain::event::GatewayEvent;

use crate::ports::DeviceStatusListener;

/// Listener that republishes every notification as a [`GatewayEvent`].
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
pub struct InProcessEventBus {
    sender: broadcast::Sender<GatewayEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: GatewayEvent) {
        // Fails only when nobody is subscribed.
        let _ = self.sender.send(event);
    }
}

impl DeviceStatusListener for InProcessEventBus {
    fn on_device_added(&self, device: &Device) {
        self.publish(GatewayEvent::DeviceAdded {
            device: device.clone(),
        });
    }

    fn on_device_changed(&self, device: &Device) {
        self.publish(GatewayEvent::DeviceChanged {
            device: device.clone(),
        });
    }

    fn on_connection_lost(&self) {
        self.publish(GatewayEvent::ConnectionLost);
    }

    fn on_connection_established(&self) {
        self.publish(GatewayEvent::ConnectionEstablished);
    }
}
