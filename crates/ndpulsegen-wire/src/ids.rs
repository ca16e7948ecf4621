//! Message id bytes.
//!
//! Ids 101-127 are telemetry sent by the device.
//! Ids 150-175 are commands sent by the host.

/// Device reply to an echo probe, carrying identity and versions.
pub const ECHO: u8 = 101;

/// Full device status snapshot.
pub const DEVICESTATE: u8 = 102;

/// Run-time notification (address reached, trigger, run finished).
pub const NOTIFICATION: u8 = 103;

/// Debug value printed by the firmware.
pub const PRINT: u8 = 104;

/// Error reported by the firmware.
pub const ERROR: u8 = 105;

/// Mains synchronisation status.
pub const POWERLINESTATE: u8 = 106;

/// Secondary device status.
pub const DEVICESTATE_EXTRAS: u8 = 107;

/// Echo probe.
pub const CMD_ECHO: u8 = 150;

/// One program instruction.
pub const CMD_INSTRUCTION: u8 = 151;

/// Partial device option update.
pub const CMD_DEVICE_OPTIONS: u8 = 152;

/// Partial mains trigger option update.
pub const CMD_POWERLINE_TRIGGER_OPTIONS: u8 = 153;

/// One-shot actions (trigger, disarm, state requests).
pub const CMD_ACTION: u8 = 154;

/// Immediate output override.
pub const CMD_STATIC_STATE: u8 = 155;

/// Opaque debug word.
pub const CMD_GENERAL_DEBUG: u8 = 156;

/// Returns a human-readable name for a message id.
pub fn message_name(id: u8) -> &'static str {
    match id {
        ECHO => "echo",
        DEVICESTATE => "devicestate",
        NOTIFICATION => "notification",
        PRINT => "print",
        ERROR => "error",
        POWERLINESTATE => "powerlinestate",
        DEVICESTATE_EXTRAS => "devicestate_extras",
        CMD_ECHO => "cmd_echo",
        CMD_INSTRUCTION => "cmd_instruction",
        CMD_DEVICE_OPTIONS => "cmd_device_options",
        CMD_ACTION => "cmd_action",
        CMD_GENERAL_DEBUG => "cmd_general_debug",
        CMD_STATIC_STATE => "cmd_static_state",
        CMD_POWERLINE_TRIGGER_OPTIONS => "cmd_powerline_trigger_options",
        _ => "unknown",
    }
}
