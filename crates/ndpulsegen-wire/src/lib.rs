//! Fixed-layout framing for the ndpulsegen serial protocol.
//!
//! Every message on the wire is one id byte followed by a payload whose length
//! is fixed by the id:
//! - Commands (host to device) are built by the encoders in [`command`]
//! - Telemetry (device to host) is described by the constant [`registry`]
//!   and decoded by [`MessageReader`], which resynchronizes on unknown ids
//!
//! All multi-byte integers are little-endian.

pub mod codec;
pub mod command;
pub mod error;
pub mod ids;
pub mod message;
pub mod reader;
pub mod registry;
pub mod state;
pub mod writer;

pub use command::{
    command_length, decode_command, encode_instructions, Action, Command, DeviceOptions,
    HardwareTrigger, Instruction, InstructionFlags, PowerlineTriggerOptions, RunMode,
};
pub use error::{CodecError, CodecResult, Result, WireError};
pub use message::{
    encode_message, ClockSource, DeviceState, DeviceStateExtras, Echo, ErrorReport,
    FirmwareVersion, Message, MessageCategory, Notification, PowerlineState, Print,
};
pub use reader::{DropReason, MessageReader, ReadEvent};
pub use registry::{lookup, MessageSpec, REGISTRY};
pub use state::{ChannelState, NUM_CHANNELS};
pub use writer::{CommandSink, CommandWriter};
