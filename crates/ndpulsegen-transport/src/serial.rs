use serialport::{SerialPortInfo, SerialPortType};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::PortStream;
use crate::traits::{PortBackend, PortInfo, PortSettings};

/// Serial transport backed by the operating system's serial ports.
///
/// Enumeration reports USB vendor/product ids and serial numbers where the
/// platform exposes them; non-USB ports are listed without that metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBackend;

impl SerialBackend {
    /// Create the system serial backend.
    pub fn new() -> Self {
        Self
    }
}

impl PortBackend for SerialBackend {
    fn available_ports(&self) -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports()
            .map_err(|err| TransportError::Enumerate(err.to_string()))?;
        debug!(count = ports.len(), "enumerated serial ports");
        Ok(ports.into_iter().map(port_info).collect())
    }

    fn open(&self, port: &str, settings: &PortSettings) -> Result<PortStream> {
        let handle = serialport::new(port, settings.baud_rate)
            .timeout(settings.timeout)
            .open()
            .map_err(|err| TransportError::Open {
                port: port.to_string(),
                source: err.into(),
            })?;
        info!(port, baud = settings.baud_rate, "opened serial port");
        Ok(PortStream::from_serial(port, handle))
    }
}

fn port_info(port: SerialPortInfo) -> PortInfo {
    match port.port_type {
        SerialPortType::UsbPort(usb) => PortInfo {
            name: port.port_name,
            vid: Some(usb.vid),
            pid: Some(usb.pid),
            serial_number: usb.serial_number,
            product: usb.product,
        },
        _ => PortInfo::new(port.port_name),
    }
}
