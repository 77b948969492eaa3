//! Polling coordinator — drives the gateway session on two fixed-delay loops.
//!
//! - **refresh**: poll a full batch, merge it into the [`DeviceRegistry`],
//!   notify listeners of new/changed devices and connectivity edges.
//! - **command**: drain one command from the [`CommandOutbox`], send it, merge
//!   the single reply line the same way as a batch record.
//!
//! Both loops take the same session mutex, so the gateway never sees two
//! exchanges at once. Submitting a command only touches the outbox.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;

use cubelink_domain::command::{CommandId, CommandKey, SendCommand};
use cubelink_domain::device::{Device, Serial};
use cubelink_domain::error::{CubeLinkError, TransportError, ValidationError};
use cubelink_domain::event::GatewayEvent;
use cubelink_domain::gateway::{GatewayStatus, SessionState};
use cubelink_domain::id::ListenerId;
use cubelink_domain::protocol::{self, ProtocolRecord, StatusRecord};

use crate::listeners::ListenerSet;
use crate::outbox::{self, CommandOutbox};
use crate::ports::{DeviceStatusListener, GatewayTransport};
use crate::registry::DeviceRegistry;

/// Cadence and sizing of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Delay between the end of one poll and the start of the next.
    pub poll_interval: Duration,
    /// Delay between two command drains.
    pub command_interval: Duration,
    pub outbox_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            command_interval: Duration::from_secs(1),
            outbox_capacity: outbox::DEFAULT_CAPACITY,
        }
    }
}

impl CoordinatorConfig {
    /// Check that every interval and the capacity are non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NotPositive`] naming the offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval.is_zero() {
            return Err(ValidationError::NotPositive("poll interval"));
        }
        if self.command_interval.is_zero() {
            return Err(ValidationError::NotPositive("command interval"));
        }
        if self.outbox_capacity == 0 {
            return Err(ValidationError::NotPositive("outbox capacity"));
        }
        Ok(())
    }
}

/// What merging a set of lines produced.
#[derive(Default)]
struct MergeOutcome {
    events: Vec<GatewayEvent>,
    seen: HashSet<Serial>,
    saw_live_state: bool,
    status: Option<StatusRecord>,
}

struct Shared<T> {
    session: tokio::sync::Mutex<T>,
    outbox: CommandOutbox,
    registry: DeviceRegistry,
    listeners: ListenerSet,
    connected: AtomicBool,
    status: RwLock<Option<GatewayStatus>>,
    last_command_id: AtomicU64,
}

impl<T: GatewayTransport> Shared<T> {
    async fn refresh_cycle(&self) {
        let mut outcome = MergeOutcome::default();
        let failure = {
            let mut session = self.session.lock().await;
            let batch = session.poll_batch().await;
            tracing::debug!(
                lines = batch.lines.len(),
                failed = batch.is_failed(),
                "poll batch received"
            );
            for line in &batch.lines {
                self.merge_line(line, &mut outcome);
            }
            if batch.error.is_none() && outcome.saw_live_state {
                let stale = self.registry.mark_absent_stale(&outcome.seen);
                if stale > 0 {
                    tracing::debug!(stale, "devices missing from latest batch");
                }
            }
            batch.error
        };

        let mut events = Vec::with_capacity(outcome.events.len() + 1);
        match failure {
            None => {
                if !self.connected.swap(true, Ordering::SeqCst) {
                    tracing::info!("gateway connection established");
                    events.push(GatewayEvent::ConnectionEstablished);
                }
                events.append(&mut outcome.events);
            }
            Some(err) => {
                events.append(&mut outcome.events);
                if self.connected.swap(false, Ordering::SeqCst) {
                    tracing::warn!(%err, "gateway connection lost");
                    events.push(GatewayEvent::ConnectionLost);
                } else {
                    tracing::debug!(%err, "gateway still unreachable");
                }
            }
        }
        self.listeners.dispatch(&events);
    }

    async fn command_cycle(&self) {
        let Some(cmd) = self.outbox.drain() else {
            return;
        };

        let mut outcome = MergeOutcome::default();
        {
            let mut session = self.session.lock().await;
            match session.send_command(&cmd.payload).await {
                Ok(reply) => {
                    self.merge_line(&reply, &mut outcome);
                    if outcome.status.is_some_and(|status| status.discarded) {
                        let err = TransportError::WriteRejected;
                        tracing::warn!(%err, id = %cmd.id, key = %cmd.key, "gateway refused command");
                        session.close().await;
                    } else {
                        tracing::debug!(id = %cmd.id, key = %cmd.key, "command delivered");
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, id = %cmd.id, key = %cmd.key, "command failed");
                }
            }
        }
        self.listeners.dispatch(&outcome.events);
    }

    fn merge_line(&self, line: &str, outcome: &mut MergeOutcome) {
        match protocol::decode(line) {
            Ok(Some(record)) => self.apply_record(record, outcome),
            Ok(None) => tracing::debug!(line, "unrecognised line ignored"),
            Err(err) => tracing::warn!(%err, line, "malformed line skipped"),
        }
    }

    fn apply_record(&self, record: ProtocolRecord, outcome: &mut MergeOutcome) {
        match record {
            ProtocolRecord::DeviceInfo(info) => {
                self.registry.merge_configuration(&info);
            }
            ProtocolRecord::Metadata(meta) => {
                self.registry.merge_configuration(&meta);
            }
            ProtocolRecord::Configuration(config) => {
                self.registry.merge_configuration(&config);
            }
            ProtocolRecord::LiveState(live) => {
                outcome.saw_live_state = true;
                for device in self.registry.merge_live_state(&live) {
                    outcome.seen.insert(device.serial.clone());
                    outcome.events.push(if device.updated {
                        GatewayEvent::DeviceAdded { device }
                    } else {
                        GatewayEvent::DeviceChanged { device }
                    });
                }
            }
            ProtocolRecord::Status(status) => {
                tracing::trace!(
                    duty_cycle = status.duty_cycle,
                    free_slots = status.free_memory_slots,
                    "gateway status"
                );
                *self.status.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(GatewayStatus::from(&status));
                outcome.status = Some(status);
            }
        }
    }
}

/// Owns the gateway session, the outbox, the registry and the listeners.
///
/// Dropping the coordinator aborts its loops; call [`stop`](Self::stop) to
/// also close the session.
pub struct PollingCoordinator<T> {
    shared: Arc<Shared<T>>,
    config: CoordinatorConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<T> PollingCoordinator<T>
where
    T: GatewayTransport + 'static,
{
    /// Build a coordinator around `transport`. Nothing runs until
    /// [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`CubeLinkError::Validation`] when `config` is invalid.
    pub fn new(transport: T, config: CoordinatorConfig) -> Result<Self, CubeLinkError> {
        config.validate()?;
        let shared = Shared {
            session: tokio::sync::Mutex::new(transport),
            outbox: CommandOutbox::new(config.outbox_capacity),
            registry: DeviceRegistry::new(),
            listeners: ListenerSet::new(),
            connected: AtomicBool::new(false),
            status: RwLock::new(None),
            last_command_id: AtomicU64::new(0),
        };
        Ok(Self {
            shared: Arc::new(shared),
            config,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the refresh and command loops. Does nothing if already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            tracing::debug!("coordinator already running");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let poll_interval = self.config.poll_interval;
        tasks.push(tokio::spawn(async move {
            loop {
                shared.refresh_cycle().await;
                tokio::time::sleep(poll_interval).await;
            }
        }));

        let shared = Arc::clone(&self.shared);
        let command_interval = self.config.command_interval;
        tasks.push(tokio::spawn(async move {
            loop {
                shared.command_cycle().await;
                tokio::time::sleep(command_interval).await;
            }
        }));

        tracing::info!(
            poll_interval_ms = u64::try_from(poll_interval.as_millis()).unwrap_or(u64::MAX),
            command_interval_ms = u64::try_from(command_interval.as_millis()).unwrap_or(u64::MAX),
            "coordinator started"
        );
    }

    /// Cancel both loops, interrupting any in-flight exchange, then close the
    /// session.
    pub async fn stop(&self) {
        let handles = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            // Cancelled tasks resolve with a JoinError; only their release of
            // the session lock matters here.
            let _ = handle.await;
        }
        self.shared.session.lock().await.close().await;
        tracing::info!("coordinator stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Run one refresh cycle now, outside the regular schedule.
    #[tracing::instrument(skip(self))]
    pub async fn refresh_now(&self) {
        self.shared.refresh_cycle().await;
    }

    /// Drain and send one queued command now, outside the regular schedule.
    #[tracing::instrument(skip(self))]
    pub async fn send_next_command(&self) {
        self.shared.command_cycle().await;
    }

    /// Queue a command for `serial` on `channel`.
    ///
    /// Returns `false` when the command was dropped: the outbox is full, or
    /// the payload contains a line break and would not fit on one line.
    /// A queued command for the same serial and channel is superseded.
    pub fn submit_command(
        &self,
        serial: impl Into<Serial>,
        channel: impl Into<String>,
        payload: impl Into<String>,
    ) -> bool {
        let key = CommandKey::new(serial, channel);
        let payload = payload.into();
        if payload.contains(['\r', '\n']) {
            tracing::warn!(%key, "command payload spans several lines, dropped");
            return false;
        }
        let id = CommandId::new(self.shared.last_command_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.shared.outbox.submit(SendCommand::new(id, key, payload))
    }

    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.shared.outbox.len()
    }

    #[must_use]
    pub fn device(&self, serial: &Serial) -> Option<Device> {
        self.shared.registry.device(serial)
    }

    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        self.shared.registry.devices()
    }

    /// Read-only access to the registry for configuration lookups.
    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.shared.registry
    }

    /// Whether the latest poll succeeded.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Status from the most recent `S:` line, if any arrived yet.
    #[must_use]
    pub fn gateway_status(&self) -> Option<GatewayStatus> {
        self.shared
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current session state. Waits for any in-flight exchange to finish.
    pub async fn session_state(&self) -> SessionState {
        self.shared.session.lock().await.state()
    }

    pub fn add_listener(&self, listener: Arc<dyn DeviceStatusListener>) -> ListenerId {
        self.shared.listeners.add(listener)
    }

    /// Returns `false` when `id` was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }
}

impl<T> Drop for PollingCoordinator<T> {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for handle in tasks.drain(..) {
            handle.abort();
        }
    }
}
