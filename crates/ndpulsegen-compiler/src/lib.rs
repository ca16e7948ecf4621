//! Timeline builder and instruction compiler.
//!
//! Build a sparse timeline of channel updates, flags and gotos with
//! [`Compiler`], then [`Compiler::compile`] it into a dense [`Program`]:
//! one fixed-duration instruction per distinct event time, addressed
//! contiguously from 0, ready to upload to the device.
//!
//! ```
//! use ndpulsegen_compiler::{Compiler, Time, UpdateFlags};
//!
//! let mut compiler = Compiler::new();
//! compiler.add_update(Time::cycles(0), [(0, true)], UpdateFlags::NONE)?;
//! compiler.add_update(Time::cycles(5), [(0, false)], UpdateFlags::NONE)?;
//!
//! let program = compiler.compile()?;
//! assert_eq!(program.len(), 2);
//! assert_eq!(program.final_address(), Some(1));
//! # Ok::<(), ndpulsegen_compiler::CompilerError>(())
//! ```

pub mod channel;
pub mod compiler;
pub mod error;
pub mod program;
pub mod time;
pub mod timeline;

pub use channel::{Channel, FlagsMode, Pulse};
pub use compiler::Compiler;
pub use error::{CompilerError, Result, UploadError};
pub use program::Program;
pub use time::{Time, CLOCK_PERIOD_NS};
pub use timeline::{GotoSpec, TimelineEvent, UpdateFlags};
