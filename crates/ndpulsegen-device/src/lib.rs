//! Connection management for the ndpulsegen pulse generator.
//!
//! [`PulseGenerator`] owns one open port at a time:
//! - commands are written by the caller under a single writer lock
//! - telemetry is read by a background thread and fanned out to
//!   subscribers as [`DeviceEvent`]s
//!
//! Ports are found with [`get_connected_devices`], which probes every
//! candidate with an echo handshake. [`Simulator`] stands in for hardware
//! over an in-memory port.

pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod handshake;
pub mod pulse_generator;
mod reader;
pub mod simulator;

pub use config::{DeviceConfig, HandshakeConfig, ReaderConfig};
pub use discovery::{get_connected_devices, ConnectedDevices};
pub use error::{DeviceError, Result};
pub use events::{DeviceEvent, Topic};
pub use handshake::{probe, DeviceInfo};
pub use pulse_generator::{PulseGenerator, Target};
pub use simulator::{DeviceIdentity, Simulator};
