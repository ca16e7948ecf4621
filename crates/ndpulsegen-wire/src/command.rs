//! Commands sent from the host to the device.

use std::str::FromStr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::codec::{bit, check_range, expect_len, get_state, get_u48, pack_bits, put_state, put_u48, MAX_U48};
use crate::error::{CodecError, CodecResult};
use crate::ids;
use crate::state::ChannelState;

/// Wire size of an instruction frame.
pub const INSTRUCTION_LEN: usize = 19;

const ECHO_LEN: usize = 2;
const DEVICE_OPTIONS_LEN: usize = 17;
const ACTION_LEN: usize = 2;
const GENERAL_DEBUG_LEN: usize = 9;
const STATIC_STATE_LEN: usize = 4;
const POWERLINE_TRIGGER_OPTIONS_LEN: usize = 7;

/// Per-instruction control flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstructionFlags {
    /// Halt after this instruction until the next trigger.
    pub stop_and_wait: bool,
    /// Pulse the hardware trigger output when this instruction starts.
    pub hardware_trig_out: bool,
    /// Send a notification to the host when this instruction starts.
    pub notify_computer: bool,
    /// Wait for the next mains zero crossing before this instruction.
    pub powerline_sync: bool,
}

impl InstructionFlags {
    /// Flag byte, `stop_and_wait` at bit 0.
    pub fn to_bits(self) -> u8 {
        pack_bits(&[
            self.stop_and_wait,
            self.hardware_trig_out,
            self.notify_computer,
            self.powerline_sync,
        ])
    }

    /// Parse a flag byte. Undefined bits are ignored.
    pub fn from_bits(byte: u8) -> Self {
        Self {
            stop_and_wait: bit(byte, 0),
            hardware_trig_out: bit(byte, 1),
            notify_computer: bit(byte, 2),
            powerline_sync: bit(byte, 3),
        }
    }
}

/// One program word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Position in program memory.
    pub address: u16,
    /// Clock cycles this state is held, at least 1.
    pub duration: u64,
    /// Output levels while the instruction runs.
    pub state: ChannelState,
    /// Address to jump to when `goto_counter` is non-zero.
    pub goto_address: u16,
    /// Number of times the jump is taken before falling through.
    pub goto_counter: u32,
    /// Control flags.
    pub flags: InstructionFlags,
}

impl Instruction {
    /// Append this instruction's frame to `dst`.
    ///
    /// ```text
    /// id | address u16 | duration u48 | state u24 | goto_address u16 | goto_counter u32 | flags u8
    /// ```
    pub fn encode(&self, dst: &mut BytesMut) -> CodecResult<()> {
        if self.duration == 0 {
            return Err(CodecError::ZeroDuration);
        }
        check_range("duration", self.duration, MAX_U48)?;

        dst.reserve(INSTRUCTION_LEN);
        dst.put_u8(ids::CMD_INSTRUCTION);
        dst.put_u16_le(self.address);
        put_u48(dst, "duration", self.duration)?;
        put_state(dst, self.state);
        dst.put_u16_le(self.goto_address);
        dst.put_u32_le(self.goto_counter);
        dst.put_u8(self.flags.to_bits());
        Ok(())
    }

    fn decode(mut src: &[u8]) -> Self {
        let address = src.get_u16_le();
        let duration = get_u48(&mut src);
        let state = get_state(&mut src);
        let goto_address = src.get_u16_le();
        let goto_counter = src.get_u32_le();
        let flags = InstructionFlags::from_bits(src.get_u8());
        Self {
            address,
            duration,
            state,
            goto_address,
            goto_counter,
            flags,
        }
    }
}

/// Encode a batch of instructions as back-to-back instruction frames.
pub fn encode_instructions(instructions: &[Instruction]) -> CodecResult<Bytes> {
    let mut buf = BytesMut::with_capacity(instructions.len() * INSTRUCTION_LEN);
    for instruction in instructions {
        instruction.encode(&mut buf)?;
    }
    Ok(buf.freeze())
}

/// What the device does when it reaches `final_address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Stop after the final instruction.
    Single = 0,
    /// Jump back to address 0 and keep running.
    Continuous = 1,
}

impl RunMode {
    fn from_wire(value: u8) -> CodecResult<Self> {
        match value {
            0 => Ok(Self::Single),
            1 => Ok(Self::Continuous),
            value => Err(CodecError::InvalidEnum {
                field: "run_mode",
                value,
            }),
        }
    }
}

/// When the device starts a run on its hardware trigger input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareTrigger {
    /// Ignore the trigger input.
    Never = 0,
    /// Start a run on every trigger.
    Always = 1,
    /// Accept a trigger only while no run is in progress.
    SingleRun = 2,
    /// Accept exactly one trigger, then disarm.
    Once = 3,
}

impl HardwareTrigger {
    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Always => "always",
            Self::SingleRun => "single_run",
            Self::Once => "once",
        }
    }

    pub(crate) fn from_wire(value: u8) -> CodecResult<Self> {
        match value {
            0 => Ok(Self::Never),
            1 => Ok(Self::Always),
            2 => Ok(Self::SingleRun),
            3 => Ok(Self::Once),
            value => Err(CodecError::InvalidEnum {
                field: "accept_hardware_trigger",
                value,
            }),
        }
    }
}

impl FromStr for HardwareTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(Self::Never),
            "always" => Ok(Self::Always),
            "single_run" => Ok(Self::SingleRun),
            "once" => Ok(Self::Once),
            other => Err(format!("unknown hardware trigger mode '{other}'")),
        }
    }
}

/// Partial update of device options.
///
/// Each field is tri-state: `None` leaves the device's current setting
/// untouched, `Some(v)` overwrites it. A presence bitmap on the wire keeps
/// `None` distinct from `Some(false)` or `Some(0)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceOptions {
    pub final_address: Option<u16>,
    pub run_mode: Option<RunMode>,
    pub accept_hardware_trigger: Option<HardwareTrigger>,
    pub trigger_out_length: Option<u32>,
    pub trigger_out_delay: Option<u64>,
    pub notify_on_main_trig_out: Option<bool>,
    pub notify_on_run_finished: Option<bool>,
    pub software_run_enable: Option<bool>,
}

impl DeviceOptions {
    /// Options that only move the end of the stored program.
    pub fn final_address(address: u16) -> Self {
        Self {
            final_address: Some(address),
            ..Self::default()
        }
    }

    /// Returns true if no field is supplied.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn presence(&self) -> u8 {
        pack_bits(&[
            self.final_address.is_some(),
            self.run_mode.is_some(),
            self.accept_hardware_trigger.is_some(),
            self.trigger_out_length.is_some(),
            self.trigger_out_delay.is_some(),
            self.notify_on_main_trig_out.is_some(),
            self.notify_on_run_finished.is_some(),
            self.software_run_enable.is_some(),
        ])
    }

    fn encode(&self, dst: &mut BytesMut) -> CodecResult<()> {
        let delay = self.trigger_out_delay.unwrap_or(0);
        check_range("trigger_out_delay", delay, MAX_U48)?;

        dst.reserve(DEVICE_OPTIONS_LEN);
        dst.put_u8(ids::CMD_DEVICE_OPTIONS);
        dst.put_u8(self.presence());
        dst.put_u16_le(self.final_address.unwrap_or(0));
        dst.put_u8(self.run_mode.map_or(0, |mode| mode as u8));
        dst.put_u8(self.accept_hardware_trigger.map_or(0, |mode| mode as u8));
        dst.put_u32_le(self.trigger_out_length.unwrap_or(0));
        put_u48(dst, "trigger_out_delay", delay)?;
        dst.put_u8(pack_bits(&[
            self.notify_on_main_trig_out.unwrap_or(false),
            self.notify_on_run_finished.unwrap_or(false),
            self.software_run_enable.unwrap_or(false),
        ]));
        Ok(())
    }

    fn decode(mut src: &[u8]) -> CodecResult<Self> {
        let present = src.get_u8();
        let final_address = src.get_u16_le();
        let run_mode = src.get_u8();
        let accept_hardware_trigger = src.get_u8();
        let trigger_out_length = src.get_u32_le();
        let trigger_out_delay = get_u48(&mut src);
        let bools = src.get_u8();

        let has = |n: u8| bit(present, n);
        Ok(Self {
            final_address: has(0).then_some(final_address),
            run_mode: has(1).then(|| RunMode::from_wire(run_mode)).transpose()?,
            accept_hardware_trigger: has(2)
                .then(|| HardwareTrigger::from_wire(accept_hardware_trigger))
                .transpose()?,
            trigger_out_length: has(3).then_some(trigger_out_length),
            trigger_out_delay: has(4).then_some(trigger_out_delay),
            notify_on_main_trig_out: has(5).then_some(bit(bools, 0)),
            notify_on_run_finished: has(6).then_some(bit(bools, 1)),
            software_run_enable: has(7).then_some(bit(bools, 2)),
        })
    }
}

/// Partial update of mains-synchronised triggering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerlineTriggerOptions {
    pub trigger_on_powerline: Option<bool>,
    /// Delay after the mains zero crossing, in clock cycles.
    pub powerline_trigger_delay: Option<u32>,
}

impl PowerlineTriggerOptions {
    fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(POWERLINE_TRIGGER_OPTIONS_LEN);
        dst.put_u8(ids::CMD_POWERLINE_TRIGGER_OPTIONS);
        dst.put_u8(pack_bits(&[
            self.trigger_on_powerline.is_some(),
            self.powerline_trigger_delay.is_some(),
        ]));
        dst.put_u8(u8::from(self.trigger_on_powerline.unwrap_or(false)));
        dst.put_u32_le(self.powerline_trigger_delay.unwrap_or(0));
    }

    fn decode(mut src: &[u8]) -> Self {
        let present = src.get_u8();
        let trigger_on_powerline = src.get_u8() != 0;
        let powerline_trigger_delay = src.get_u32_le();
        Self {
            trigger_on_powerline: bit(present, 0).then_some(trigger_on_powerline),
            powerline_trigger_delay: bit(present, 1).then_some(powerline_trigger_delay),
        }
    }
}

/// One-shot actions. Nothing here is stored on the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub trigger_now: bool,
    pub disable_after_current_run: bool,
    pub disarm: bool,
    pub request_state: bool,
    pub request_powerline_state: bool,
    pub request_state_extras: bool,
}

impl Action {
    fn to_bits(self) -> u8 {
        pack_bits(&[
            self.trigger_now,
            self.disable_after_current_run,
            self.disarm,
            self.request_state,
            self.request_powerline_state,
            self.request_state_extras,
        ])
    }

    fn from_bits(byte: u8) -> Self {
        Self {
            trigger_now: bit(byte, 0),
            disable_after_current_run: bit(byte, 1),
            disarm: bit(byte, 2),
            request_state: bit(byte, 3),
            request_powerline_state: bit(byte, 4),
            request_state_extras: bit(byte, 5),
        }
    }
}

/// Any command the host can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "fields", rename_all = "snake_case")]
pub enum Command {
    Echo(u8),
    Instruction(Instruction),
    DeviceOptions(DeviceOptions),
    Action(Action),
    GeneralDebug(u64),
    StaticState(ChannelState),
    PowerlineTriggerOptions(PowerlineTriggerOptions),
}

impl Command {
    /// Id byte this command is framed with.
    pub fn id(&self) -> u8 {
        match self {
            Self::Echo(_) => ids::CMD_ECHO,
            Self::Instruction(_) => ids::CMD_INSTRUCTION,
            Self::DeviceOptions(_) => ids::CMD_DEVICE_OPTIONS,
            Self::Action(_) => ids::CMD_ACTION,
            Self::GeneralDebug(_) => ids::CMD_GENERAL_DEBUG,
            Self::StaticState(_) => ids::CMD_STATIC_STATE,
            Self::PowerlineTriggerOptions(_) => ids::CMD_POWERLINE_TRIGGER_OPTIONS,
        }
    }

    /// Append this command's frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> CodecResult<()> {
        match self {
            Self::Echo(byte) => {
                dst.put_u8(ids::CMD_ECHO);
                dst.put_u8(*byte);
            }
            Self::Instruction(instruction) => instruction.encode(dst)?,
            Self::DeviceOptions(options) => options.encode(dst)?,
            Self::Action(action) => {
                dst.put_u8(ids::CMD_ACTION);
                dst.put_u8(action.to_bits());
            }
            Self::GeneralDebug(word) => {
                dst.put_u8(ids::CMD_GENERAL_DEBUG);
                dst.put_u64_le(*word);
            }
            Self::StaticState(state) => {
                dst.put_u8(ids::CMD_STATIC_STATE);
                put_state(dst, *state);
            }
            Self::PowerlineTriggerOptions(options) => options.encode(dst),
        }
        Ok(())
    }

    /// Encode this command as a standalone frame.
    pub fn to_bytes(&self) -> CodecResult<Bytes> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// Total frame length (id byte included) of a command id.
pub fn command_length(id: u8) -> Option<usize> {
    match id {
        ids::CMD_ECHO => Some(ECHO_LEN),
        ids::CMD_INSTRUCTION => Some(INSTRUCTION_LEN),
        ids::CMD_DEVICE_OPTIONS => Some(DEVICE_OPTIONS_LEN),
        ids::CMD_ACTION => Some(ACTION_LEN),
        ids::CMD_GENERAL_DEBUG => Some(GENERAL_DEBUG_LEN),
        ids::CMD_STATIC_STATE => Some(STATIC_STATE_LEN),
        ids::CMD_POWERLINE_TRIGGER_OPTIONS => Some(POWERLINE_TRIGGER_OPTIONS_LEN),
        _ => None,
    }
}

/// Decode one complete command frame, id byte included.
pub fn decode_command(frame: &[u8]) -> CodecResult<Command> {
    let (&id, payload) = frame.split_first().ok_or(CodecError::InvalidLength {
        what: "command",
        expected: 1,
        actual: 0,
    })?;
    let length = command_length(id).ok_or(CodecError::UnknownCommand(id))?;
    expect_len(crate::ids::message_name(id), frame, length)?;

    let mut src = payload;
    let command = match id {
        ids::CMD_ECHO => Command::Echo(src.get_u8()),
        ids::CMD_INSTRUCTION => Command::Instruction(Instruction::decode(payload)),
        ids::CMD_DEVICE_OPTIONS => Command::DeviceOptions(DeviceOptions::decode(payload)?),
        ids::CMD_ACTION => Command::Action(Action::from_bits(src.get_u8())),
        ids::CMD_GENERAL_DEBUG => Command::GeneralDebug(src.get_u64_le()),
        ids::CMD_STATIC_STATE => Command::StaticState(get_state(&mut src)),
        ids::CMD_POWERLINE_TRIGGER_OPTIONS => {
            Command::PowerlineTriggerOptions(PowerlineTriggerOptions::decode(payload))
        }
        other => return Err(CodecError::UnknownCommand(other)),
    };
    Ok(command)
}
