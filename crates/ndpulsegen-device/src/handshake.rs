use std::time::Instant;

use ndpulsegen_transport::PortStream;
use ndpulsegen_wire::{
    Command, CommandWriter, FirmwareVersion, Message, MessageReader, ReadEvent, WireError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::HandshakeConfig;
use crate::error::{DeviceError, Result};

/// Identity reported by a device in its echo reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Port the device answered on.
    pub port: String,
    pub device_type: u8,
    pub hardware_version: u8,
    pub firmware_version: FirmwareVersion,
    pub serial_number: u32,
}

/// Send an echo probe on `stream` and wait for the matching reply.
///
/// Any other telemetry that arrives first is skipped. Fails with
/// [`DeviceError::Timeout`] if no matching echo arrives within
/// `config.timeout`, or [`DeviceError::HandshakeFailed`] if the port closes.
/// The stream's timeout is left at `config.read_timeout`.
pub fn probe(stream: &mut PortStream, config: &HandshakeConfig) -> Result<DeviceInfo> {
    let port = stream.name().to_string();
    stream.clear_buffers()?;

    stream.set_timeout(config.write_timeout)?;
    CommandWriter::new(&mut *stream).send(&Command::Echo(config.probe_byte))?;
    stream.set_timeout(config.read_timeout)?;

    let deadline = Instant::now() + config.timeout;
    let mut reader = MessageReader::new(&mut *stream);
    loop {
        if Instant::now() >= deadline {
            return Err(DeviceError::Timeout(config.timeout));
        }

        match reader.read_event() {
            Ok(ReadEvent::Message(Message::Echo(echo)))
                if echo.echoed_byte == config.probe_byte =>
            {
                debug!(
                    port = %port,
                    serial_number = echo.serial_number,
                    firmware = %echo.firmware_version,
                    "device answered echo probe"
                );
                return Ok(DeviceInfo {
                    port,
                    device_type: echo.device_type,
                    hardware_version: echo.hardware_version,
                    firmware_version: echo.firmware_version,
                    serial_number: echo.serial_number,
                });
            }
            Ok(ReadEvent::Idle) => continue,
            Ok(event) => {
                trace!(port = %port, ?event, "skipping frame while probing");
                continue;
            }
            Err(WireError::ConnectionClosed) => {
                return Err(DeviceError::HandshakeFailed(format!(
                    "{port} closed during echo probe"
                )));
            }
            Err(err) => return Err(err.into()),
        }
    }
}
