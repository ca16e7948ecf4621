//! Byte-stream transports for the ndpulsegen pulse generator.
//!
//! Provides a unified interface over the ways the host reaches a device:
//! - USB serial ports (via the `serialport` crate)
//! - In-memory duplex ports for simulated devices and tests
//!
//! This is the lowest layer of ndpulsegen. Everything else builds on top of
//! the [`PortStream`] type provided here.

pub mod error;
pub mod memory;
pub mod serial;
pub mod stream;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::{MemoryBackend, MemoryPort};
pub use serial::SerialBackend;
pub use stream::PortStream;
pub use traits::{PortBackend, PortInfo, PortSettings};
