//! Host-side control of the ndpulsegen FPGA pulse generator.
//!
//! The pulse generator drives 24 TTL outputs from a stored program of
//! fixed-duration instructions, clocked at 10 ns per cycle.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial and in-memory byte streams
//! - [`wire`]: fixed-length command and telemetry framing
//! - [`compiler`]: timeline builder that compiles to instructions
//! - [`device`]: discovery, connection and telemetry (behind `device` feature)
//! - [`logging`]: stderr log setup for tools (behind `logging` feature)
//!
//! ```no_run
//! # #[cfg(feature = "device")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use ndpulsegen::compiler::{Compiler, Pulse, Time, UpdateFlags};
//! use ndpulsegen::device::{PulseGenerator, Target};
//!
//! let mut compiler = Compiler::new();
//! let trigger = compiler.channel(0)?;
//! trigger.pulse_high(&mut compiler, Time::seconds(1e-6), Pulse::new(Time::seconds(5e-6)), UpdateFlags::NONE)?;
//!
//! let generator = PulseGenerator::new();
//! generator.connect(Target::Any)?;
//! compiler.upload_instructions(&generator)?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "device"))]
//! # fn main() {}
//! ```

/// Re-export transport types.
pub mod transport {
    pub use ndpulsegen_transport::*;
}

/// Re-export wire codec types.
pub mod wire {
    pub use ndpulsegen_wire::*;
}

/// Re-export compiler types.
pub mod compiler {
    pub use ndpulsegen_compiler::*;
}

/// Re-export device types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use ndpulsegen_device::*;
}

#[cfg(feature = "logging")]
pub mod logging;
