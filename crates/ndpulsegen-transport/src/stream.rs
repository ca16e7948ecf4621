use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

use crate::error::Result;
use crate::memory::MemoryPort;

/// An open port to a device. Implements Read + Write.
///
/// This is the fundamental I/O type returned by [`PortBackend::open`](crate::PortBackend::open).
/// Hardware ports wrap a `serialport` handle; simulated ports wrap one end of a
/// [`MemoryPort`] pair.
pub struct PortStream {
    name: String,
    inner: PortStreamInner,
}

enum PortStreamInner {
    Serial(Box<dyn SerialPort>),
    Memory(MemoryPort),
}

impl Read for PortStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            PortStreamInner::Serial(port) => port.read(buf),
            PortStreamInner::Memory(port) => port.read(buf),
        }
    }
}

impl Write for PortStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            PortStreamInner::Serial(port) => port.write(buf),
            PortStreamInner::Memory(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            PortStreamInner::Serial(port) => port.flush(),
            PortStreamInner::Memory(port) => port.flush(),
        }
    }
}

impl PortStream {
    /// Wrap an open serial port handle.
    pub fn from_serial(name: impl Into<String>, port: Box<dyn SerialPort>) -> Self {
        Self {
            name: name.into(),
            inner: PortStreamInner::Serial(port),
        }
    }

    /// Wrap one end of an in-memory port pair.
    pub fn from_memory(name: impl Into<String>, port: MemoryPort) -> Self {
        Self {
            name: name.into(),
            inner: PortStreamInner::Memory(port),
        }
    }

    /// Name of the port this stream was opened on.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current timeout applied to blocking reads and writes on this handle.
    pub fn timeout(&self) -> Duration {
        match &self.inner {
            PortStreamInner::Serial(port) => port.timeout(),
            PortStreamInner::Memory(port) => port.timeout(),
        }
    }

    /// Set the timeout for blocking reads and writes on this handle.
    ///
    /// Memory ports and POSIX serial ports keep a timeout per handle. On
    /// Windows a serial port's timeouts belong to the device, so every clone
    /// sees the value set last.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        match &mut self.inner {
            PortStreamInner::Serial(port) => port.set_timeout(timeout).map_err(Into::into),
            PortStreamInner::Memory(port) => {
                port.set_timeout(timeout);
                Ok(())
            }
        }
    }

    /// Discard bytes buffered by the driver in both directions.
    pub fn clear_buffers(&self) -> Result<()> {
        match &self.inner {
            PortStreamInner::Serial(port) => port.clear(ClearBuffer::All).map_err(Into::into),
            PortStreamInner::Memory(port) => {
                port.clear_input();
                Ok(())
            }
        }
    }

    /// Wake a read blocked on this port so it returns a timeout immediately.
    ///
    /// Serial drivers offer no portable cancellation; their reads end at the
    /// next timeout instead.
    pub fn cancel_read(&self) {
        match &self.inner {
            PortStreamInner::Serial(_) => {}
            PortStreamInner::Memory(port) => port.cancel_read(),
        }
    }

    /// Try to clone this stream (a second handle on the same port).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            PortStreamInner::Serial(port) => PortStreamInner::Serial(port.try_clone()?),
            PortStreamInner::Memory(port) => PortStreamInner::Memory(port.clone()),
        };
        Ok(Self {
            name: self.name.clone(),
            inner,
        })
    }
}

impl std::fmt::Debug for PortStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            PortStreamInner::Serial(_) => "serial",
            PortStreamInner::Memory(_) => "memory",
        };
        f.debug_struct("PortStream")
            .field("name", &self.name)
            .field("type", &kind)
            .finish()
    }
}
