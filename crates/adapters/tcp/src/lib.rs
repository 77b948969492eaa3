//! # cubelink-adapter-tcp
//!
//! TCP adapter — the only code that touches the gateway socket.
//!
//! ## Responsibilities
//! - Open the connection with a bounded connect timeout
//! - Write `l:` poll requests and command lines, CRLF terminated
//! - Read reply lines with a per-line timeout
//! - Recycle the connection after a fixed number of requests, or close it
//!   after every exchange when the gateway is shared with other clients
//!
//! ## Dependency rule
//! Depends on `cubelink-app` (for the [`GatewayTransport`] port) and
//! `cubelink-domain`. Nothing depends on this crate except the daemon.
//!
//! [`GatewayTransport`]: cubelink_app::ports::GatewayTransport

pub mod config;
pub mod session;

pub use config::GatewayConfig;
pub use session::GatewaySession;
