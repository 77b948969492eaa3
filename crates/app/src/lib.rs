//! # cubelink-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `GatewayTransport` — poll a batch of lines, send one command, close
//!   - `DeviceStatusListener` — observer for device and connectivity events
//! - Provide the in-memory **`DeviceRegistry`** and the coalescing
//!   **`CommandOutbox`**
//! - Provide the **`PollingCoordinator`** that drives both periodic cycles
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `cubelink-domain` only (plus `tokio` for tasks, timers and
//! locks). Never imports adapter crates. Adapters depend on *this* crate, not
//! the reverse.

pub mod coordinator;
pub mod event_bus;
pub mod listeners;
pub mod outbox;
pub mod ports;
pub mod registry;
