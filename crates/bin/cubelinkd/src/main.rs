//! # cubelinkd — cubelink daemon
//!
//! Composition root that wires the gateway session and the coordinator
//! together and runs the bridge until interrupted.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialise `tracing` with the configured filter
//! - Construct the TCP gateway session (adapter)
//! - Construct the polling coordinator, injecting the session via the port
//! - Log every gateway event through the in-process event bus
//! - Queue commands typed on stdin
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod console;

use std::sync::Arc;

use cubelink_adapter_tcp::GatewaySession;
use cubelink_app::coordinator::PollingCoordinator;
use cubelink_app::event_bus::InProcessEventBus;
use cubelink_domain::event::GatewayEvent;
use tokio::io::AsyncBufReadExt;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const EVENT_BUS_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Gateway
    let session = GatewaySession::new(config.gateway.clone())?;
    let coordinator = Arc::new(PollingCoordinator::new(
        session,
        config.coordinator_config(),
    )?);

    // Event log
    let event_bus = Arc::new(InProcessEventBus::new(EVENT_BUS_CAPACITY));
    let events = BroadcastStream::new(event_bus.subscribe());
    coordinator.add_listener(event_bus);
    let event_log = tokio::spawn(log_events(events));

    // Console
    let console = tokio::spawn(read_console(Arc::clone(&coordinator)));

    coordinator.start();
    tracing::info!(
        gateway = %config.gateway.addr(),
        exclusive = config.gateway.exclusive,
        "cubelinkd running"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    coordinator.stop().await;
    console.abort();
    event_log.abort();
    Ok(())
}

async fn log_events(mut events: BroadcastStream<GatewayEvent>) {
    while let Some(item) = events.next().await {
        match item {
            Ok(GatewayEvent::DeviceAdded { device }) => tracing::info!(
                serial = %device.serial,
                device = %device.label(),
                room = device.room.as_deref().unwrap_or("-"),
                "device discovered"
            ),
            Ok(GatewayEvent::DeviceChanged { device }) => tracing::info!(
                serial = %device.serial,
                mode = device.mode.map_or("-", |mode| mode.as_str()),
                measured = device.measured,
                setpoint = device.setpoint,
                stale = device.stale,
                "device updated"
            ),
            Ok(event) => tracing::info!(event = event.name(), "gateway event"),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event log fell behind");
            }
        }
    }
}

async fn read_console(coordinator: Arc<PollingCoordinator<GatewaySession>>) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(cmd) = console::parse(&line) else {
                    if !line.trim().is_empty() && !line.trim_start().starts_with('#') {
                        tracing::warn!(line, "expected `<serial> <channel> <payload>`");
                    }
                    continue;
                };
                if coordinator.submit_command(cmd.serial, cmd.channel, cmd.payload) {
                    tracing::info!(serial = cmd.serial, channel = cmd.channel, "command queued");
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(%err, "console closed");
                break;
            }
        }
    }
}
