//! In-memory duplex ports.
//!
//! A [`MemoryPort`] pair behaves like the two ends of a serial cable: bytes
//! written on one end are read on the other, reads honour a timeout, and
//! dropping every handle of one end closes the link. [`MemoryBackend`] exposes
//! such ports through the same [`PortBackend`] interface as real hardware.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::PortStream;
use crate::traits::{PortBackend, PortInfo, PortSettings};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

struct Pipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

#[derive(Default)]
struct PipeState {
    buf: VecDeque<u8>,
    closed: bool,
    cancel_pending: bool,
}

impl Pipe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PipeState::default()),
            ready: Condvar::new(),
        })
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.ready.notify_all();
    }
}

/// Closes both directions once the last handle of an end is dropped.
struct EndGuard {
    inbound: Arc<Pipe>,
    outbound: Arc<Pipe>,
}

impl Drop for EndGuard {
    fn drop(&mut self) {
        self.outbound.close();
        self.inbound.close();
    }
}

/// One end of an in-memory duplex link.
///
/// Clones are additional handles on the same end; each keeps its own timeout.
#[derive(Clone)]
pub struct MemoryPort {
    inbound: Arc<Pipe>,
    outbound: Arc<Pipe>,
    _guard: Arc<EndGuard>,
    timeout: Duration,
}

impl MemoryPort {
    /// Create a connected pair: `(host end, device end)`.
    pub fn pair() -> (Self, Self) {
        let to_host = Pipe::new();
        let to_device = Pipe::new();
        (
            Self::end(Arc::clone(&to_host), Arc::clone(&to_device)),
            Self::end(to_device, to_host),
        )
    }

    fn end(inbound: Arc<Pipe>, outbound: Arc<Pipe>) -> Self {
        let guard = Arc::new(EndGuard {
            inbound: Arc::clone(&inbound),
            outbound: Arc::clone(&outbound),
        });
        Self {
            inbound,
            outbound,
            _guard: guard,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Timeout applied to blocking reads.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Set the timeout applied to blocking reads.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Discard bytes waiting to be read on this end.
    pub fn clear_input(&self) {
        self.inbound.state.lock().buf.clear();
    }

    /// Make the next read on this end that would block return `TimedOut`
    /// immediately, waking it if it is already blocked.
    pub fn cancel_read(&self) {
        let mut state = self.inbound.state.lock();
        state.cancel_pending = true;
        self.inbound.ready.notify_all();
    }

    /// Number of bytes waiting to be read on this end.
    pub fn pending(&self) -> usize {
        self.inbound.state.lock().buf.len()
    }
}

impl Read for MemoryPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let deadline = Instant::now() + self.timeout;
        let mut state = self.inbound.state.lock();
        loop {
            if !state.buf.is_empty() {
                let n = buf.len().min(state.buf.len());
                for (slot, byte) in buf.iter_mut().zip(state.buf.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if state.closed {
                return Ok(0);
            }
            if state.cancel_pending {
                state.cancel_pending = false;
                return Err(std::io::Error::new(ErrorKind::TimedOut, "read cancelled"));
            }
            if Instant::now() >= deadline {
                return Err(std::io::Error::from(ErrorKind::TimedOut));
            }
            self.inbound.ready.wait_until(&mut state, deadline);
        }
    }
}

impl Write for MemoryPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.outbound.state.lock();
        if state.closed {
            return Err(std::io::Error::from(ErrorKind::BrokenPipe));
        }
        state.buf.extend(buf.iter().copied());
        self.outbound.ready.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

type Opener = Box<dyn Fn() -> std::io::Result<MemoryPort> + Send + Sync>;

struct MemoryEntry {
    info: PortInfo,
    opener: Opener,
}

/// A [`PortBackend`] whose ports are produced by caller-supplied openers.
///
/// Each opener returns the host end of a fresh [`MemoryPort`] pair, typically
/// after handing the device end to a simulator thread.
#[derive(Default)]
pub struct MemoryBackend {
    ports: Mutex<Vec<MemoryEntry>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port. A port with the same name is replaced.
    pub fn add_port<F>(&self, info: PortInfo, opener: F)
    where
        F: Fn() -> std::io::Result<MemoryPort> + Send + Sync + 'static,
    {
        let mut ports = self.ports.lock();
        ports.retain(|entry| entry.info.name != info.name);
        debug!(port = %info.name, "registered memory port");
        ports.push(MemoryEntry {
            info,
            opener: Box::new(opener),
        });
    }

    /// Remove a port. Returns true if it was registered.
    pub fn remove_port(&self, name: &str) -> bool {
        let mut ports = self.ports.lock();
        let before = ports.len();
        ports.retain(|entry| entry.info.name != name);
        ports.len() != before
    }
}

impl PortBackend for MemoryBackend {
    fn available_ports(&self) -> Result<Vec<PortInfo>> {
        Ok(self
            .ports
            .lock()
            .iter()
            .map(|entry| entry.info.clone())
            .collect())
    }

    fn open(&self, port: &str, settings: &PortSettings) -> Result<PortStream> {
        let ports = self.ports.lock();
        let entry = ports
            .iter()
            .find(|entry| entry.info.name == port)
            .ok_or_else(|| TransportError::UnknownPort(port.to_string()))?;

        let mut memory = (entry.opener)().map_err(|source| TransportError::Open {
            port: port.to_string(),
            source,
        })?;
        memory.set_timeout(settings.timeout);
        debug!(port, "opened memory port");
        Ok(PortStream::from_memory(port, memory))
    }
}
