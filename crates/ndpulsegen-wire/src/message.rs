//! Telemetry sent from the device to the host.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::codec::{bit, check_range, get_state, get_u48, pack_bits, put_state, put_u48, MAX_U48};
use crate::command::HardwareTrigger;
use crate::error::{CodecError, CodecResult};
use crate::ids;
use crate::registry::lookup_category;
use crate::state::ChannelState;

/// Telemetry categories, one per inbound message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    Echo,
    DeviceState,
    Notification,
    Print,
    Error,
    PowerlineState,
    DeviceStateExtras,
}

impl MessageCategory {
    /// Every category, in id order.
    pub const ALL: [Self; 7] = [
        Self::Echo,
        Self::DeviceState,
        Self::Notification,
        Self::Print,
        Self::Error,
        Self::PowerlineState,
        Self::DeviceStateExtras,
    ];

    /// Id byte of this category.
    pub fn id(self) -> u8 {
        match self {
            Self::Echo => ids::ECHO,
            Self::DeviceState => ids::DEVICESTATE,
            Self::Notification => ids::NOTIFICATION,
            Self::Print => ids::PRINT,
            Self::Error => ids::ERROR,
            Self::PowerlineState => ids::POWERLINESTATE,
            Self::DeviceStateExtras => ids::DEVICESTATE_EXTRAS,
        }
    }

    /// Protocol name of this category.
    pub fn name(self) -> &'static str {
        ids::message_name(self.id())
    }
}

/// Firmware version triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Source of the device's master clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    Internal = 0,
    External = 1,
}

impl ClockSource {
    fn from_wire(value: u8) -> CodecResult<Self> {
        match value {
            0 => Ok(Self::Internal),
            1 => Ok(Self::External),
            value => Err(CodecError::InvalidEnum {
                field: "clock_source",
                value,
            }),
        }
    }
}

/// Reply to an echo probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Echo {
    pub echoed_byte: u8,
    pub device_type: u8,
    pub hardware_version: u8,
    pub firmware_version: FirmwareVersion,
    pub serial_number: u32,
}

/// Full status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub running: bool,
    pub software_run_enable: bool,
    pub hardware_run_enable: bool,
    pub notify_on_run_finished: bool,
    pub notify_on_main_trig_out: bool,
    pub current_address: u16,
    pub final_address: u16,
    pub accept_hardware_trigger: HardwareTrigger,
    pub clock_source: ClockSource,
    pub trigger_out_length: u32,
    /// Cycles, 48-bit.
    pub trigger_out_delay: u64,
    pub state: ChannelState,
}

/// Run-time notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub address: u16,
    pub address_notify: bool,
    pub trigger_notify: bool,
    pub finished_notify: bool,
    /// Cycles since the run started.
    pub run_time: u64,
}

/// Value printed by the firmware for debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Print {
    pub easy_printed_value: u64,
}

/// Error raised by the firmware. The payload is not interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub payload: [u8; 8],
}

/// Mains synchronisation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerlineState {
    pub trig_on_powerline: bool,
    pub powerline_locked: bool,
    /// Measured mains period in cycles.
    pub powerline_period: u32,
    pub powerline_trigger_delay: u32,
}

/// Secondary status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStateExtras {
    /// Cycles since the current run started.
    pub run_time: u64,
}

/// Any decoded telemetry message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Message {
    Echo(Echo),
    DeviceState(DeviceState),
    Notification(Notification),
    Print(Print),
    Error(ErrorReport),
    PowerlineState(PowerlineState),
    DeviceStateExtras(DeviceStateExtras),
}

impl Message {
    /// Category this message is dispatched under.
    pub fn category(&self) -> MessageCategory {
        match self {
            Self::Echo(_) => MessageCategory::Echo,
            Self::DeviceState(_) => MessageCategory::DeviceState,
            Self::Notification(_) => MessageCategory::Notification,
            Self::Print(_) => MessageCategory::Print,
            Self::Error(_) => MessageCategory::Error,
            Self::PowerlineState(_) => MessageCategory::PowerlineState,
            Self::DeviceStateExtras(_) => MessageCategory::DeviceStateExtras,
        }
    }

    /// Encode this message as a standalone frame.
    pub fn to_bytes(&self) -> CodecResult<Bytes> {
        let mut buf = BytesMut::new();
        encode_message(self, &mut buf)?;
        Ok(buf.freeze())
    }
}

/// Append a telemetry frame to `dst`.
///
/// The host never sends telemetry; this exists for device simulators.
pub fn encode_message(message: &Message, dst: &mut BytesMut) -> CodecResult<()> {
    let spec = lookup_category(message.category());
    if let Message::DeviceState(state) = message {
        check_range("trigger_out_delay", state.trigger_out_delay, MAX_U48)?;
    }

    dst.reserve(spec.length);
    dst.put_u8(spec.id);
    match message {
        Message::Echo(echo) => {
            dst.put_u8(echo.echoed_byte);
            dst.put_u8(echo.device_type);
            dst.put_u8(echo.hardware_version);
            dst.put_u8(echo.firmware_version.major);
            dst.put_u8(echo.firmware_version.minor);
            dst.put_u8(echo.firmware_version.patch);
            dst.put_u32_le(echo.serial_number);
        }
        Message::DeviceState(state) => {
            dst.put_u8(pack_bits(&[
                state.running,
                state.software_run_enable,
                state.hardware_run_enable,
                state.notify_on_run_finished,
                state.notify_on_main_trig_out,
            ]));
            dst.put_u16_le(state.current_address);
            dst.put_u16_le(state.final_address);
            dst.put_u8(state.accept_hardware_trigger as u8);
            dst.put_u8(state.clock_source as u8);
            dst.put_u32_le(state.trigger_out_length);
            put_u48(dst, "trigger_out_delay", state.trigger_out_delay)?;
            put_state(dst, state.state);
        }
        Message::Notification(note) => {
            dst.put_u16_le(note.address);
            dst.put_u8(pack_bits(&[
                note.address_notify,
                note.trigger_notify,
                note.finished_notify,
            ]));
            dst.put_u64_le(note.run_time);
        }
        Message::Print(print) => dst.put_u64_le(print.easy_printed_value),
        Message::Error(report) => dst.put_slice(&report.payload),
        Message::PowerlineState(state) => {
            dst.put_u8(pack_bits(&[state.trig_on_powerline, state.powerline_locked]));
            dst.put_u32_le(state.powerline_period);
            dst.put_u32_le(state.powerline_trigger_delay);
        }
        Message::DeviceStateExtras(extras) => dst.put_u64_le(extras.run_time),
    }
    Ok(())
}

// Decoders receive exactly `length - 1` payload bytes; the registry checks this.

pub(crate) fn decode_echo(mut src: &[u8]) -> CodecResult<Message> {
    Ok(Message::Echo(Echo {
        echoed_byte: src.get_u8(),
        device_type: src.get_u8(),
        hardware_version: src.get_u8(),
        firmware_version: FirmwareVersion {
            major: src.get_u8(),
            minor: src.get_u8(),
            patch: src.get_u8(),
        },
        serial_number: src.get_u32_le(),
    }))
}

pub(crate) fn decode_devicestate(mut src: &[u8]) -> CodecResult<Message> {
    let bits = src.get_u8();
    let current_address = src.get_u16_le();
    let final_address = src.get_u16_le();
    let accept_hardware_trigger = HardwareTrigger::from_wire(src.get_u8())?;
    let clock_source = ClockSource::from_wire(src.get_u8())?;
    let trigger_out_length = src.get_u32_le();
    let trigger_out_delay = get_u48(&mut src);
    let state = get_state(&mut src);
    Ok(Message::DeviceState(DeviceState {
        running: bit(bits, 0),
        software_run_enable: bit(bits, 1),
        hardware_run_enable: bit(bits, 2),
        notify_on_run_finished: bit(bits, 3),
        notify_on_main_trig_out: bit(bits, 4),
        current_address,
        final_address,
        accept_hardware_trigger,
        clock_source,
        trigger_out_length,
        trigger_out_delay,
        state,
    }))
}

pub(crate) fn decode_notification(mut src: &[u8]) -> CodecResult<Message> {
    let address = src.get_u16_le();
    let bits = src.get_u8();
    Ok(Message::Notification(Notification {
        address,
        address_notify: bit(bits, 0),
        trigger_notify: bit(bits, 1),
        finished_notify: bit(bits, 2),
        run_time: src.get_u64_le(),
    }))
}

pub(crate) fn decode_print(mut src: &[u8]) -> CodecResult<Message> {
    Ok(Message::Print(Print {
        easy_printed_value: src.get_u64_le(),
    }))
}

pub(crate) fn decode_error(src: &[u8]) -> CodecResult<Message> {
    let mut payload = [0u8; 8];
    payload.copy_from_slice(src);
    Ok(Message::Error(ErrorReport { payload }))
}

pub(crate) fn decode_powerlinestate(mut src: &[u8]) -> CodecResult<Message> {
    let bits = src.get_u8();
    Ok(Message::PowerlineState(PowerlineState {
        trig_on_powerline: bit(bits, 0),
        powerline_locked: bit(bits, 1),
        powerline_period: src.get_u32_le(),
        powerline_trigger_delay: src.get_u32_le(),
    }))
}

pub(crate) fn decode_devicestate_extras(mut src: &[u8]) -> CodecResult<Message> {
    Ok(Message::DeviceStateExtras(DeviceStateExtras {
        run_time: src.get_u64_le(),
    }))
}
