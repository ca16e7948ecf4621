use std::time::Duration;

use crate::error::Result;
use crate::stream::PortStream;

/// Description of one port visible to a [`PortBackend`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortInfo {
    /// Operating-system name of the port (`/dev/ttyUSB0`, `COM3`, ...).
    pub name: String,
    /// USB vendor id, when the port is a USB device.
    pub vid: Option<u16>,
    /// USB product id, when the port is a USB device.
    pub pid: Option<u16>,
    /// USB serial number string reported by the adapter.
    pub serial_number: Option<String>,
    /// USB product string reported by the adapter.
    pub product: Option<String>,
}

impl PortInfo {
    /// Create a port description without USB metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attach a USB vendor/product id pair.
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }

    /// Returns true if the port reports exactly this vendor/product id pair.
    pub fn matches_usb(&self, vid: u16, pid: u16) -> bool {
        self.vid == Some(vid) && self.pid == Some(pid)
    }
}

/// Settings applied when a port is opened.
#[derive(Debug, Clone)]
pub struct PortSettings {
    /// Line rate in bits per second. Ignored by in-memory ports.
    pub baud_rate: u32,
    /// Initial timeout for blocking reads and writes.
    pub timeout: Duration,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            baud_rate: 12_000_000,
            timeout: Duration::from_millis(100),
        }
    }
}

/// Source of ports: enumerates what is attached and opens streams by name.
pub trait PortBackend: Send + Sync {
    /// List every port currently visible to this backend.
    fn available_ports(&self) -> Result<Vec<PortInfo>>;

    /// Open the named port.
    fn open(&self, port: &str, settings: &PortSettings) -> Result<PortStream>;
}
