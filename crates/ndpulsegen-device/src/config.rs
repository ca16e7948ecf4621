use std::time::Duration;

use ndpulsegen_transport::PortSettings;

/// FTDI vendor id of the pulse generator's USB bridge.
pub const DEFAULT_USB_VID: u16 = 0x0403;

/// FTDI product id of the pulse generator's USB bridge.
pub const DEFAULT_USB_PID: u16 = 0x6010;

/// Byte sent in the echo probe and expected back.
pub const DEFAULT_PROBE_BYTE: u8 = 0xD1;

/// Configuration for a [`PulseGenerator`](crate::PulseGenerator).
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Serial line rate in bits per second.
    pub baud_rate: u32,
    /// Timeout for each blocking read by the background reader.
    pub read_timeout: Duration,
    /// Timeout for each blocking write.
    pub write_timeout: Duration,
    /// USB vendor id a candidate port must report.
    pub usb_vid: u16,
    /// USB product id a candidate port must report.
    pub usb_pid: u16,
    /// Echo probe used during discovery.
    pub handshake: HandshakeConfig,
    /// Background reader settings.
    pub reader: ReaderConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            baud_rate: 12_000_000,
            read_timeout: Duration::from_millis(100),
            write_timeout: Duration::from_secs(1),
            usb_vid: DEFAULT_USB_VID,
            usb_pid: DEFAULT_USB_PID,
            handshake: HandshakeConfig::default(),
            reader: ReaderConfig::default(),
        }
    }
}

impl DeviceConfig {
    /// Settings for the port the background reader uses.
    pub fn port_settings(&self) -> PortSettings {
        PortSettings {
            baud_rate: self.baud_rate,
            timeout: self.read_timeout,
        }
    }

    /// Settings for a short-lived probe of one port.
    pub fn probe_settings(&self) -> PortSettings {
        PortSettings {
            baud_rate: self.baud_rate,
            timeout: self.handshake.read_timeout,
        }
    }
}

/// Configuration for the echo handshake.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Byte sent in the echo command.
    pub probe_byte: u8,
    /// Timeout for each blocking read while waiting for the reply.
    pub read_timeout: Duration,
    /// Timeout for writing the probe.
    pub write_timeout: Duration,
    /// Overall bound on waiting for the reply.
    pub timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            probe_byte: DEFAULT_PROBE_BYTE,
            read_timeout: Duration::from_millis(200),
            write_timeout: Duration::from_millis(500),
            timeout: Duration::from_secs(1),
        }
    }
}

/// Configuration for the background reader thread.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// How long `disconnect` waits for the reader to exit before detaching it.
    pub stop_timeout: Duration,
    /// Name given to the reader thread.
    pub thread_name: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_millis(1500),
            thread_name: "ndpulsegen-reader".to_string(),
        }
    }
}
