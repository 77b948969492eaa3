//! Registered [`DeviceStatusListener`]s and fan-out helpers.

use std::sync::{Arc, PoisonError, RwLock};

use cubelink_domain::event::GatewayEvent;
use cubelink_domain::id::ListenerId;

use crate::ports::DeviceStatusListener;

/// Listeners keyed by the id handed out at registration.
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<(ListenerId, Arc<dyn DeviceStatusListener>)>>,
}

impl ListenerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn DeviceStatusListener>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Returns `false` when `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `events` in order to every listener.
    ///
    /// The listener list is copied first so callbacks may register or remove
    /// listeners without deadlocking.
    pub fn dispatch(&self, events: &[GatewayEvent]) {
        if events.is_empty() {
            return;
        }
        let listeners: Vec<Arc<dyn DeviceStatusListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for event in events {
            tracing::trace!(event = event.name(), listeners = listeners.len(), "dispatching");
            for listener in &listeners {
                match event {
                    GatewayEvent::DeviceAdded { device } => listener.on_device_added(device),
                    GatewayEvent::DeviceChanged { device } => listener.on_device_changed(device),
                    GatewayEvent::ConnectionLost => listener.on_connection_lost(),
                    GatewayEvent::ConnectionEstablished => listener.on_connection_established(),
                }
            }
        }
    }
}
