//! # cubelink-domain
//!
//! Pure domain model for the cubelink gateway bridge.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Devices** and their **Configurations**, keyed by serial number
//! - Define **Commands** (`SendCommand`) and their coalescing keys
//! - Define **Protocol records** and the pure line decoder
//! - Define **Events** emitted towards listeners
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod command;
pub mod device;
pub mod event;
pub mod gateway;
pub mod protocol;
