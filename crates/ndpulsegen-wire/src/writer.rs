use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::command::Command;
use crate::error::{Result, WireError};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Destination for complete command frames.
///
/// Implemented by anything that can deliver bytes to a device, so that
/// producers of commands (such as a compiled program) do not depend on a
/// particular connection type.
pub trait CommandSink {
    /// Error reported when a write fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Write one or more complete frames.
    fn write_command(&self, frames: &[u8]) -> std::result::Result<(), Self::Error>;
}

/// Writes complete command frames to any `Write` stream.
pub struct CommandWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> CommandWriter<T> {
    /// Create a new command writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and send one command (blocking).
    pub fn send(&mut self, command: &Command) -> Result<()> {
        self.buf.clear();
        command.encode(&mut self.buf)?;
        write_fully(&mut self.inner, &self.buf)?;
        self.flush()
    }

    /// Send pre-encoded frames (blocking).
    pub fn write_all(&mut self, frames: &[u8]) -> Result<()> {
        write_fully(&mut self.inner, frames)?;
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn write_fully<T: Write>(inner: &mut T, frames: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < frames.len() {
        match inner.write(&frames[offset..]) {
            Ok(0) => return Err(WireError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(WireError::Io(err)),
        }
    }
    Ok(())
}
