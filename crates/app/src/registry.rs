//! In-memory device registry.
//!
//! Configurations are upserted from info, metadata and configuration records;
//! devices are rebuilt from live-state entries joined with their
//! configuration. Nothing is ever removed: a device that disappears from the
//! gateway is only flagged stale.

use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock};

use cubelink_domain::device::{Device, DeviceConfiguration, DeviceType, Serial};
use cubelink_domain::protocol::{ConfigurationRecord, DeviceInfo, LiveState, Metadata};

/// Normalised configuration input, built from any record that describes a
/// device statically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationUpdate {
    pub serial: Serial,
    pub room: Option<String>,
    pub device_type: DeviceType,
    pub name: Option<String>,
    pub params: BTreeMap<String, String>,
}

impl From<&DeviceInfo> for ConfigurationUpdate {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            serial: info.serial.clone(),
            room: info.room.clone(),
            device_type: DeviceType::Cube,
            name: None,
            params: info
                .firmware
                .iter()
                .map(|fw| ("firmware".to_string(), fw.clone()))
                .collect(),
        }
    }
}

impl From<&Metadata> for ConfigurationUpdate {
    fn from(meta: &Metadata) -> Self {
        Self {
            serial: meta.serial.clone(),
            room: meta.room.clone(),
            device_type: meta.device_type,
            name: meta.name.clone(),
            params: BTreeMap::new(),
        }
    }
}

impl From<&ConfigurationRecord> for ConfigurationUpdate {
    fn from(record: &ConfigurationRecord) -> Self {
        Self {
            serial: record.serial.clone(),
            room: record.room.clone(),
            device_type: record.device_type,
            name: None,
            params: record.params.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    configurations: BTreeMap<Serial, DeviceConfiguration>,
    devices: BTreeMap<Serial, Device>,
}

/// Store of every configuration and device the gateway has reported.
///
/// All reads return owned snapshots; nothing aliases internal storage.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    inner: RwLock<Inner>,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a configuration by serial.
    ///
    /// An existing entry is replaced, except for its room: when the update
    /// carries no room the previously known one is kept.
    pub fn merge_configuration(
        &self,
        update: impl Into<ConfigurationUpdate>,
    ) -> DeviceConfiguration {
        let update = update.into();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let previous_room = inner
            .configurations
            .get(&update.serial)
            .and_then(|existing| existing.room.clone());
        let config = DeviceConfiguration {
            serial: update.serial,
            room: update.room.or(previous_room),
            device_type: update.device_type,
            name: update.name,
            params: update.params,
        };

        if inner
            .configurations
            .insert(config.serial.clone(), config.clone())
            .is_none()
        {
            tracing::debug!(serial = %config.serial, "configuration created");
        }
        config
    }

    /// Rebuild the devices named in a live-state record.
    ///
    /// Entries whose serial has no known configuration are skipped. The
    /// returned copies have `updated` set when the serial had never been seen
    /// before; stored copies never do, so replaying a record is a no-op.
    pub fn merge_live_state(&self, live: &LiveState) -> Vec<Device> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut merged = Vec::with_capacity(live.entries.len());

        for entry in &live.entries {
            let Some(config) = inner.configurations.get(&entry.serial) else {
                tracing::debug!(serial = %entry.serial, "live state for unconfigured device skipped");
                continue;
            };

            let device = Device {
                serial: entry.serial.clone(),
                room: config.room.clone(),
                device_type: config.device_type,
                name: config.name.clone(),
                mode: entry.mode,
                measured: entry.measured,
                setpoint: entry.setpoint,
                updated: false,
                stale: false,
            };
            let first_seen = inner
                .devices
                .insert(device.serial.clone(), device.clone())
                .is_none();

            merged.push(Device {
                updated: first_seen,
                ..device
            });
        }
        merged
    }

    /// Flag every device missing from `seen` as stale and clear the flag on
    /// the others. Returns how many devices are stale afterwards.
    pub fn mark_absent_stale(&self, seen: &HashSet<Serial>) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut stale = 0;
        for device in inner.devices.values_mut() {
            device.stale = !seen.contains(&device.serial);
            if device.stale {
                stale += 1;
            }
        }
        stale
    }

    #[must_use]
    pub fn device(&self, serial: &Serial) -> Option<Device> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.devices.get(serial).cloned()
    }

    /// All devices, ordered by serial.
    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.devices.values().cloned().collect()
    }

    #[must_use]
    pub fn configuration(&self, serial: &Serial) -> Option<DeviceConfiguration> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.configurations.get(serial).cloned()
    }

    /// All configurations, ordered by serial.
    #[must_use]
    pub fn configurations(&self) -> Vec<DeviceConfiguration> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.configurations.values().cloned().collect()
    }
}
