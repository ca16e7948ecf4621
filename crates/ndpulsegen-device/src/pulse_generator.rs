use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError};
use ndpulsegen_transport::{PortBackend, PortStream, SerialBackend};
use ndpulsegen_wire::{
    encode_instructions, Action, ChannelState, Command, CommandSink, CommandWriter,
    DeviceOptions, DeviceState, Echo, Instruction, Message, MessageCategory, PowerlineState,
    PowerlineTriggerOptions,
};
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::config::DeviceConfig;
use crate::discovery::{get_connected_devices, ConnectedDevices};
use crate::error::{DeviceError, Result};
use crate::events::{DeviceEvent, Subscribers, Topic};
use crate::handshake::DeviceInfo;
use crate::reader::ReaderHandle;

/// Which device [`PulseGenerator::connect`] should open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The first device that answers the echo probe.
    Any,
    /// The validated device with this serial number.
    SerialNumber(u32),
    /// This port, opened without probing.
    Port(String),
    /// The device with this serial number, or else this port.
    Either { serial_number: u32, port: String },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any device"),
            Self::SerialNumber(serial_number) => write!(f, "serial number {serial_number}"),
            Self::Port(port) => write!(f, "port {port}"),
            Self::Either {
                serial_number,
                port,
            } => write!(f, "serial number {serial_number} or port {port}"),
        }
    }
}

struct Connection {
    port: String,
    info: Option<DeviceInfo>,
    reader: ReaderHandle,
}

/// A connection to one pulse generator.
///
/// Commands are written from any thread; each write holds the writer lock
/// for its whole frame sequence. Telemetry is read by a background thread
/// and delivered through [`subscribe`](Self::subscribe).
pub struct PulseGenerator {
    backend: Arc<dyn PortBackend>,
    config: DeviceConfig,
    subscribers: Arc<Subscribers>,
    /// Serializes `connect` and `disconnect`; never held by accessors.
    lifecycle: Mutex<()>,
    connection: Mutex<Option<Connection>>,
    writer: Mutex<Option<CommandWriter<PortStream>>>,
}

impl Default for PulseGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseGenerator {
    /// A disconnected pulse generator using hardware serial ports.
    pub fn new() -> Self {
        Self {
            backend: Arc::new(SerialBackend::new()),
            config: DeviceConfig::default(),
            subscribers: Arc::new(Subscribers::default()),
            lifecycle: Mutex::new(()),
            connection: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    /// Use `backend` to enumerate and open ports.
    pub fn with_backend<B: PortBackend + 'static>(mut self, backend: Arc<B>) -> Self {
        self.backend = backend;
        self
    }

    /// Replace the default configuration.
    pub fn with_config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Probe every candidate port. See [`get_connected_devices`].
    pub fn get_connected_devices(&self) -> Result<ConnectedDevices> {
        get_connected_devices(self.backend.as_ref(), &self.config)
    }

    /// Open a port and start reading telemetry.
    ///
    /// If a port is already open its buffers are cleared and nothing else
    /// changes.
    pub fn connect(&self, target: Target) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        if let Some(port) = self.port_name() {
            if let Some(writer) = self.writer.lock().as_ref() {
                writer.get_ref().clear_buffers()?;
            }
            debug!(port = %port, "already connected; buffers cleared");
            return Ok(());
        }

        let (port, info) = self.resolve(&target)?;
        let stream = self.backend.open(&port, &self.config.port_settings())?;
        stream.clear_buffers()?;
        let (read_stream, write_stream) = split_stream(stream, &self.config)?;
        let reader = ReaderHandle::spawn(read_stream, Arc::clone(&self.subscribers), &self.config.reader)?;

        *self.writer.lock() = Some(CommandWriter::new(write_stream));
        info!(
            port = %port,
            serial_number = ?info.as_ref().map(|info| info.serial_number),
            "connected"
        );
        *self.connection.lock() = Some(Connection {
            port: port.clone(),
            info,
            reader,
        });

        self.subscribers.publish(DeviceEvent::Connected { port });
        Ok(())
    }

    fn resolve(&self, target: &Target) -> Result<(String, Option<DeviceInfo>)> {
        let (serial_number, fallback) = match target {
            Target::Port(port) => return Ok((port.clone(), None)),
            Target::Any => (None, None),
            Target::SerialNumber(serial_number) => (Some(*serial_number), None),
            Target::Either {
                serial_number,
                port,
            } => (Some(*serial_number), Some(port)),
        };

        let devices = self.get_connected_devices()?;
        let found = match serial_number {
            Some(serial_number) => devices.find_serial(serial_number).cloned(),
            None => devices.validated.into_iter().next(),
        };
        match (found, fallback) {
            (Some(info), _) => Ok((info.port.clone(), Some(info))),
            (None, Some(port)) => Ok((port.clone(), None)),
            (None, None) => Err(DeviceError::NoDeviceFound(target.to_string())),
        }
    }

    /// Stop the reader and close the port.
    ///
    /// Publishes [`DeviceEvent::Disconnected`] if a port was open; does
    /// nothing otherwise.
    pub fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock();
        let Some(open) = self.connection.lock().take() else {
            return;
        };
        self.writer.lock().take();

        open.reader.stop(self.config.reader.stop_timeout);
        info!(port = %open.port, "disconnected");
        self.subscribers.publish(DeviceEvent::Disconnected);
    }

    /// Returns true if a port is open.
    pub fn is_connected(&self) -> bool {
        self.connection.lock().is_some()
    }

    /// Identity of the open device, if it was validated when connecting.
    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.connection
            .lock()
            .as_ref()
            .and_then(|open| open.info.clone())
    }

    /// Name of the open port.
    pub fn port_name(&self) -> Option<String> {
        self.connection.lock().as_ref().map(|open| open.port.clone())
    }

    /// Receive every future event on `topic`.
    pub fn subscribe(&self, topic: impl Into<Topic>) -> Receiver<DeviceEvent> {
        self.subscribers.subscribe(topic.into())
    }

    /// Write pre-encoded frames as one uninterrupted sequence.
    pub fn write_command(&self, frames: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock();
        let writer = writer.as_mut().ok_or(DeviceError::NotConnected)?;
        writer.write_all(frames)?;
        trace!(bytes = frames.len(), "wrote command frames");
        Ok(())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.write_command(&command.to_bytes()?)
    }

    pub fn write_echo(&self, byte: u8) -> Result<()> {
        self.send(Command::Echo(byte))
    }

    pub fn write_device_options(&self, options: DeviceOptions) -> Result<()> {
        self.send(Command::DeviceOptions(options))
    }

    pub fn write_powerline_trigger_options(&self, options: PowerlineTriggerOptions) -> Result<()> {
        self.send(Command::PowerlineTriggerOptions(options))
    }

    pub fn write_action(&self, action: Action) -> Result<()> {
        self.send(Command::Action(action))
    }

    pub fn write_general_debug(&self, word: u64) -> Result<()> {
        self.send(Command::GeneralDebug(word))
    }

    pub fn write_static_state(&self, state: ChannelState) -> Result<()> {
        self.send(Command::StaticState(state))
    }

    /// Write every instruction in one locked sequence.
    pub fn write_instructions(&self, instructions: &[Instruction]) -> Result<()> {
        self.write_command(&encode_instructions(instructions)?)
    }

    /// Request and wait for a status snapshot.
    pub fn get_state(&self, timeout: Duration) -> Result<DeviceState> {
        let replies = self.subscribe(MessageCategory::DeviceState);
        self.write_action(Action {
            request_state: true,
            ..Action::default()
        })?;
        wait_for(&replies, timeout, |message| match message {
            Message::DeviceState(state) => Some(state),
            _ => None,
        })
    }

    /// Request and wait for the mains synchronisation status.
    pub fn get_powerline_state(&self, timeout: Duration) -> Result<PowerlineState> {
        let replies = self.subscribe(MessageCategory::PowerlineState);
        self.write_action(Action {
            request_powerline_state: true,
            ..Action::default()
        })?;
        wait_for(&replies, timeout, |message| match message {
            Message::PowerlineState(state) => Some(state),
            _ => None,
        })
    }

    /// Send an echo and wait for the reply carrying `byte`.
    pub fn echo(&self, byte: u8, timeout: Duration) -> Result<Echo> {
        let replies = self.subscribe(MessageCategory::Echo);
        self.write_echo(byte)?;
        wait_for(&replies, timeout, |message| match message {
            Message::Echo(echo) if echo.echoed_byte == byte => Some(echo),
            _ => None,
        })
    }
}

impl CommandSink for PulseGenerator {
    type Error = DeviceError;

    fn write_command(&self, frames: &[u8]) -> Result<()> {
        PulseGenerator::write_command(self, frames)
    }
}

impl Drop for PulseGenerator {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Split an open port into reader and writer handles with their own timeouts.
///
/// The read timeout is applied last: where a port's timeouts are shared
/// between handles, the reader's bound is the one that stays in effect.
fn split_stream(mut stream: PortStream, config: &DeviceConfig) -> Result<(PortStream, PortStream)> {
    let mut write_stream = stream.try_clone()?;
    write_stream.set_timeout(config.write_timeout)?;
    stream.set_timeout(config.read_timeout)?;
    Ok((stream, write_stream))
}

fn wait_for<T>(
    replies: &Receiver<DeviceEvent>,
    timeout: Duration,
    mut select: impl FnMut(Message) -> Option<T>,
) -> Result<T> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match replies.recv_timeout(remaining) {
            Ok(DeviceEvent::Message { message, .. }) => {
                if let Some(reply) = select(message) {
                    return Ok(reply);
                }
            }
            Ok(_) => continue,
            Err(RecvTimeoutError::Timeout) => return Err(DeviceError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => return Err(DeviceError::NotConnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use ndpulsegen_transport::{MemoryBackend, MemoryPort};

    use super::*;
    use crate::simulator::{DeviceIdentity, Simulator};

    fn simulated() -> PulseGenerator {
        let backend = Arc::new(MemoryBackend::new());
        Simulator::new(DeviceIdentity::default()).register(&backend, "sim0");
        PulseGenerator::new().with_backend(backend)
    }

    #[test]
    fn split_stream_leaves_reader_on_read_timeout() {
        let (host, _device) = MemoryPort::pair();
        let config = DeviceConfig {
            read_timeout: Duration::from_millis(40),
            write_timeout: Duration::from_millis(900),
            ..DeviceConfig::default()
        };
        let (reader, writer) = split_stream(PortStream::from_memory("sim0", host), &config).unwrap();
        assert_eq!(reader.timeout(), Duration::from_millis(40));
        assert_eq!(writer.timeout(), Duration::from_millis(900));
    }

    #[test]
    fn accessors_do_not_wait_for_the_reader_to_stop() {
        let generator = simulated();
        generator.connect(Target::Port("sim0".to_string())).unwrap();

        // The reader cannot publish `Finished` while the list is held, so
        // disconnect stays inside the reader stop until it is released.
        let stalled = generator.subscribers.stall();
        thread::scope(|scope| {
            let closing = scope.spawn(|| generator.disconnect());

            let deadline = Instant::now() + Duration::from_secs(1);
            while generator.is_connected() {
                assert!(Instant::now() < deadline, "connection was never released");
                thread::sleep(Duration::from_millis(5));
            }
            let started = Instant::now();
            assert_eq!(generator.port_name(), None);
            assert_eq!(generator.device_info(), None);
            assert!(started.elapsed() < Duration::from_millis(100));
            assert!(!closing.is_finished());

            drop(stalled);
            closing.join().unwrap();
        });
        assert!(!generator.is_connected());
    }

    #[test]
    fn writes_fail_when_not_connected() {
        let generator = PulseGenerator::new();
        assert!(!generator.is_connected());
        assert!(matches!(
            generator.write_echo(1),
            Err(DeviceError::NotConnected)
        ));
        assert!(matches!(
            generator.get_state(Duration::from_millis(10)),
            Err(DeviceError::NotConnected)
        ));
        assert_eq!(generator.port_name(), None);
    }

    #[test]
    fn disconnect_without_connection_is_silent() {
        let generator = PulseGenerator::new();
        let events = generator.subscribe(Topic::All);
        generator.disconnect();
        generator.disconnect();
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn target_describes_itself() {
        assert_eq!(Target::SerialNumber(7).to_string(), "serial number 7");
        assert_eq!(
            Target::Either {
                serial_number: 7,
                port: "COM3".to_string()
            }
            .to_string(),
            "serial number 7 or port COM3"
        );
    }
}
